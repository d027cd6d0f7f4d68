//! Serves rendered pages from the content repository.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::error::AppError;
use crate::application::render;
use crate::application::repos::ContentRepository;
use crate::cache::{CacheTagSet, ResponseCache, tag_names};
use crate::dispatch::handlers::serve_through_cache;
use crate::dispatch::request::SiteRequest;
use crate::dispatch::{HandlerPriority, RequestHandler};
use crate::domain::resource::{Resource, ResourceKind, Version};
use crate::domain::security::Role;

const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

pub struct PageRequestHandler {
    repository: Arc<dyn ContentRepository>,
    cache: Arc<ResponseCache>,
    valid_time: Duration,
    recheck_time: Duration,
}

impl PageRequestHandler {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        cache: Arc<ResponseCache>,
        valid_time: Duration,
        recheck_time: Duration,
    ) -> Self {
        Self {
            repository,
            cache,
            valid_time,
            recheck_time,
        }
    }

    fn cache_tags(&self, request: &SiteRequest, page: &Resource) -> CacheTagSet {
        let mut tags = CacheTagSet::new();
        tags.add_value(tag_names::URL, request.path.clone());
        tags.add_value(tag_names::SITE, request.site.clone());
        tags.add_value(tag_names::LANGUAGE, request.language());
        tags.add_value(tag_names::USER, request.principal.user().login());
        if let Some(template) = page.template() {
            tags.add_value(tag_names::RENDERER, template);
        }
        tags
    }
}

#[async_trait]
impl RequestHandler for PageRequestHandler {
    fn name(&self) -> &'static str {
        "page"
    }

    fn priority(&self) -> HandlerPriority {
        HandlerPriority::Page
    }

    async fn service(&self, request: &SiteRequest) -> Option<Response> {
        let version = request.requested_version();
        let page = match self
            .repository
            .get_by_path(&request.site, &request.path, version)
            .await
        {
            Ok(Some(page)) if page.kind() == ResourceKind::Page => page,
            Ok(_) => return None,
            Err(err) => return Some(AppError::from(err).into_response()),
        };

        if !matches!(request.method, Method::GET | Method::HEAD) {
            return Some(StatusCode::METHOD_NOT_ALLOWED.into_response());
        }

        match version {
            Version::Work => {
                // Drafts are for editors only and never cached.
                if !request.principal.has_role(Role::Editor) {
                    let err = if request.principal.is_anonymous() {
                        AppError::Unauthorized
                    } else {
                        AppError::forbidden("work versions require the editor role")
                    };
                    return Some(err.into_response());
                }
                let html = render::render_page(&page);
                return Some(
                    ([("content-type", CONTENT_TYPE_HTML)], html).into_response(),
                );
            }
            Version::Live => {
                if !page.published().is_published_now() {
                    return Some(StatusCode::NOT_FOUND.into_response());
                }
            }
        }

        let tags = self.cache_tags(request, &page);
        let modified = page.modified().date();
        let response = serve_through_cache(
            &self.cache,
            request,
            tags,
            self.valid_time,
            self.recheck_time,
            CONTENT_TYPE_HTML,
            Some(modified),
            || async {
                Ok(crate::dispatch::handlers::Rendered::body(
                    render::render_page(&page),
                ))
            },
        )
        .await;
        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::HeaderMap;
    use uuid::Uuid;

    use crate::application::repos::PublishWindow;
    use crate::cache::CacheConfig;
    use crate::domain::page::PageBody;
    use crate::domain::resource::ResourceUri;
    use crate::domain::security::Principal;
    use crate::domain::user::User;
    use crate::infra::repository::FsContentRepository;

    use super::*;

    async fn handler_with_page(path: &str, publish: bool) -> PageRequestHandler {
        let repository = Arc::new(FsContentRepository::in_memory());
        let user = User::new("amelie");
        let mut body = PageBody::new();
        body.set_title("Served page");
        let page = crate::domain::resource::Resource::new_page(
            ResourceUri::new("main", path, Uuid::new_v4(), Version::Work),
            Some(user.clone()),
            body,
        );
        let created = repository.create(page).await.expect("create");
        if publish {
            repository
                .publish(
                    "main",
                    created.id(),
                    PublishWindow::default(),
                    &user,
                    &created.etag(),
                )
                .await
                .expect("publish");
        }
        PageRequestHandler::new(
            repository,
            Arc::new(ResponseCache::new(&CacheConfig::default())),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
    }

    fn get(path: &str) -> SiteRequest {
        SiteRequest::new(
            "main",
            Method::GET,
            path,
            HashMap::new(),
            HeaderMap::new(),
            Principal::anonymous(),
        )
    }

    #[tokio::test]
    async fn published_pages_are_served_and_cached() {
        let handler = handler_with_page("/a", true).await;
        let response = handler.service(&get("/a")).await.expect("handled");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(handler.cache.len(), 1);
    }

    #[tokio::test]
    async fn unknown_paths_fall_through() {
        let handler = handler_with_page("/a", true).await;
        assert!(handler.service(&get("/missing")).await.is_none());
    }

    #[tokio::test]
    async fn unpublished_live_requests_yield_not_found() {
        let handler = handler_with_page("/a", false).await;
        let mut request = get("/a");
        request.params.insert("version".into(), "work".into());
        // Anonymous caller asking for the draft is turned away.
        let response = handler.service(&request).await.expect("handled");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn editors_see_uncached_drafts() {
        let handler = handler_with_page("/a", false).await;
        let mut request = get("/a");
        request.params.insert("version".into(), "work".into());
        request.principal = Principal::new(User::new("jdoe"), &[Role::Editor]);

        let response = handler.service(&request).await.expect("handled");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(handler.cache.is_empty());
    }

    #[tokio::test]
    async fn post_to_a_page_is_method_not_allowed() {
        let handler = handler_with_page("/a", true).await;
        let mut request = get("/a");
        request.method = Method::POST;
        let response = handler.service(&request).await.expect("handled");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
