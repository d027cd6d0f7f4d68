//! Serves stored image resources.
//!
//! Image requests may name a scaling style; styles are declared in the
//! configuration and an unknown one is a client error. Pressroom serves the
//! original bytes for every style, leaving actual scaling to a fronting
//! image proxy.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::error::AppError;
use crate::application::files::FileService;
use crate::dispatch::request::SiteRequest;
use crate::dispatch::{HandlerPriority, RequestHandler};
use crate::domain::resource::ResourceKind;

use super::file::{resolve_binary, serve_binary};

pub struct ImageRequestHandler {
    files: Arc<FileService>,
    styles: Vec<String>,
}

impl ImageRequestHandler {
    pub fn new(files: Arc<FileService>, styles: Vec<String>) -> Self {
        Self { files, styles }
    }
}

#[async_trait]
impl RequestHandler for ImageRequestHandler {
    fn name(&self) -> &'static str {
        "image"
    }

    fn priority(&self) -> HandlerPriority {
        HandlerPriority::Image
    }

    async fn service(&self, request: &SiteRequest) -> Option<Response> {
        let resource = match resolve_binary(&self.files, request, ResourceKind::Image).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return None,
            Err(err) => return Some(err.into_response()),
        };
        if !matches!(request.method, Method::GET | Method::HEAD) {
            return Some(StatusCode::METHOD_NOT_ALLOWED.into_response());
        }
        if let Some(style) = request.param("style")
            && !self.styles.iter().any(|known| known == style)
        {
            return Some(
                AppError::validation(format!("unknown image style `{style}`")).into_response(),
            );
        }
        Some(serve_binary(&self.files, request, &resource).await)
    }
}
