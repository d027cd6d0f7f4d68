//! The legacy-style request dispatcher.
//!
//! Site traffic that is not claimed by the REST API walks an ordered chain
//! of content-type-specific handlers. Each handler decides whether it owns
//! the request; the first one to answer ends the walk.

pub mod action;
pub mod conditional;
pub mod handlers;
pub mod request;

pub use action::{Action, ActionMount, ActionOutput, ActionRegistry, FnAction};
pub use request::SiteRequest;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use tracing::debug;

/// Fixed walk order of the handler chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandlerPriority {
    Action,
    Page,
    File,
    Image,
    Feed,
    Static,
}

#[async_trait]
pub trait RequestHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> HandlerPriority;

    /// `Some(response)` when this handler owns the request.
    async fn service(&self, request: &SiteRequest) -> Option<Response>;
}

pub struct SiteDispatcher {
    handlers: Vec<Box<dyn RequestHandler>>,
}

impl SiteDispatcher {
    pub fn new(mut handlers: Vec<Box<dyn RequestHandler>>) -> Self {
        handlers.sort_by_key(|handler| handler.priority());
        Self { handlers }
    }

    /// Walk the chain; the first handler claiming the request wins.
    pub async fn dispatch(&self, request: &SiteRequest) -> Response {
        for handler in &self.handlers {
            if let Some(response) = handler.service(request).await {
                debug!(
                    handler = handler.name(),
                    path = %request.path,
                    status = response.status().as_u16(),
                    "request handled"
                );
                counter!("pressroom_dispatch_handled_total", "handler" => handler.name())
                    .increment(1);
                return response;
            }
        }
        counter!("pressroom_dispatch_unhandled_total").increment(1);
        StatusCode::NOT_FOUND.into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::{HeaderMap, Method};

    use crate::domain::security::Principal;

    use super::*;

    struct ClaimingHandler {
        name: &'static str,
        priority: HandlerPriority,
        claim: bool,
    }

    #[async_trait]
    impl RequestHandler for ClaimingHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> HandlerPriority {
            self.priority
        }

        async fn service(&self, _request: &SiteRequest) -> Option<Response> {
            self.claim.then(|| self.name.into_response())
        }
    }

    fn request() -> SiteRequest {
        SiteRequest::new(
            "main",
            Method::GET,
            "/x",
            HashMap::new(),
            HeaderMap::new(),
            Principal::anonymous(),
        )
    }

    #[tokio::test]
    async fn first_claiming_handler_in_priority_order_wins() {
        // Registered out of order on purpose.
        let dispatcher = SiteDispatcher::new(vec![
            Box::new(ClaimingHandler {
                name: "static",
                priority: HandlerPriority::Static,
                claim: true,
            }),
            Box::new(ClaimingHandler {
                name: "page",
                priority: HandlerPriority::Page,
                claim: true,
            }),
            Box::new(ClaimingHandler {
                name: "action",
                priority: HandlerPriority::Action,
                claim: false,
            }),
        ]);

        let response = dispatcher.dispatch(&request()).await;
        let body = axum::body::to_bytes(response.into_body(), 1024);
        let body = body.await.expect("body");
        assert_eq!(&body[..], b"page");
    }

    #[tokio::test]
    async fn unclaimed_requests_are_not_found() {
        let dispatcher = SiteDispatcher::new(vec![Box::new(ClaimingHandler {
            name: "action",
            priority: HandlerPriority::Action,
            claim: false,
        })]);
        let response = dispatcher.dispatch(&request()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
