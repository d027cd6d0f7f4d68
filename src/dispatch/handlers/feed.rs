//! Serves RSS and Atom feeds through the response cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::error::AppError;
use crate::application::feeds::FeedService;
use crate::cache::{CacheTagSet, ResponseCache, tag_names};
use crate::dispatch::handlers::serve_through_cache;
use crate::dispatch::request::SiteRequest;
use crate::dispatch::{HandlerPriority, RequestHandler};

const RSS_PATH: &str = "/feeds/rss";
const ATOM_PATH: &str = "/feeds/atom";

pub struct FeedRequestHandler {
    feeds: Arc<FeedService>,
    cache: Arc<ResponseCache>,
    valid_time: Duration,
    recheck_time: Duration,
}

impl FeedRequestHandler {
    pub fn new(
        feeds: Arc<FeedService>,
        cache: Arc<ResponseCache>,
        valid_time: Duration,
        recheck_time: Duration,
    ) -> Self {
        Self {
            feeds,
            cache,
            valid_time,
            recheck_time,
        }
    }
}

#[async_trait]
impl RequestHandler for FeedRequestHandler {
    fn name(&self) -> &'static str {
        "feed"
    }

    fn priority(&self) -> HandlerPriority {
        HandlerPriority::Feed
    }

    async fn service(&self, request: &SiteRequest) -> Option<Response> {
        let (content_type, is_rss) = match request.path.as_str() {
            RSS_PATH => ("application/rss+xml; charset=utf-8", true),
            ATOM_PATH => ("application/atom+xml; charset=utf-8", false),
            _ => return None,
        };
        if !matches!(request.method, Method::GET | Method::HEAD) {
            return Some(StatusCode::METHOD_NOT_ALLOWED.into_response());
        }

        let mut tags = CacheTagSet::new();
        tags.add_value(tag_names::URL, request.path.clone());
        tags.add_value(tag_names::SITE, request.site.clone());

        let feeds = Arc::clone(&self.feeds);
        let site = request.site.clone();
        let response = serve_through_cache(
            &self.cache,
            request,
            tags,
            self.valid_time,
            self.recheck_time,
            content_type,
            None,
            || async move {
                let feed = if is_rss {
                    feeds.rss(&site).await
                } else {
                    feeds.atom(&site).await
                };
                feed.map(crate::dispatch::handlers::Rendered::body)
                    .map_err(|err| AppError::unexpected(err.to_string()))
            },
        )
        .await;
        Some(response)
    }
}
