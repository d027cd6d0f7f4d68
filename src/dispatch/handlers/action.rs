//! Dispatches requests into registered actions.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::cache::ResponseCache;
use crate::dispatch::action::{ActionRegistry, action_cache_tags};
use crate::dispatch::handlers::serve_through_cache;
use crate::dispatch::request::SiteRequest;
use crate::dispatch::{HandlerPriority, RequestHandler};
use crate::domain::resource::Version;

pub struct ActionRequestHandler {
    registry: Arc<ActionRegistry>,
    cache: Arc<ResponseCache>,
}

impl ActionRequestHandler {
    pub fn new(registry: Arc<ActionRegistry>, cache: Arc<ResponseCache>) -> Self {
        Self { registry, cache }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }
}

#[async_trait]
impl RequestHandler for ActionRequestHandler {
    fn name(&self) -> &'static str {
        "action"
    }

    fn priority(&self) -> HandlerPriority {
        HandlerPriority::Action
    }

    async fn service(&self, request: &SiteRequest) -> Option<Response> {
        let mount = self.registry.resolve(&request.site, &request.path)?;

        if !matches!(request.method, Method::GET | Method::HEAD | Method::POST) {
            return Some(StatusCode::METHOD_NOT_ALLOWED.into_response());
        }

        // Only idempotent LIVE requests go through the cache.
        let cacheable = matches!(request.method, Method::GET | Method::HEAD)
            && request.requested_version() == Version::Live
            && !request.no_cache();

        if !cacheable {
            let output = match mount.action.serve(request).await {
                Ok(output) => output,
                Err(err) => return Some(err.into_response()),
            };
            return Some(
                (
                    [(header::CONTENT_TYPE, output.content_type)],
                    output.body,
                )
                    .into_response(),
            );
        }

        let tags = action_cache_tags(&mount, request);
        let action = Arc::clone(&mount.action);
        let action_request = request.clone();
        let response = serve_through_cache(
            &self.cache,
            request,
            tags,
            mount.valid_time,
            mount.recheck_time,
            "text/html; charset=utf-8",
            None,
            || async {
                let output = action.serve(&action_request).await?;
                Ok(crate::dispatch::handlers::Rendered {
                    body: output.body,
                    content_type: Some(output.content_type),
                })
            },
        )
        .await;
        Some(response)
    }
}
