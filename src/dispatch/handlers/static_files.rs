//! Serves static assets from a configured directory, as the last handler in
//! the chain.

use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::dispatch::request::SiteRequest;
use crate::dispatch::{HandlerPriority, RequestHandler};

pub struct StaticRequestHandler {
    root: Option<PathBuf>,
}

impl StaticRequestHandler {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

#[async_trait]
impl RequestHandler for StaticRequestHandler {
    fn name(&self) -> &'static str {
        "static"
    }

    fn priority(&self) -> HandlerPriority {
        HandlerPriority::Static
    }

    async fn service(&self, request: &SiteRequest) -> Option<Response> {
        let root = self.root.as_ref()?;
        if !matches!(request.method, Method::GET | Method::HEAD) {
            return None;
        }
        // Reject traversal before touching the filesystem.
        if request
            .path
            .split('/')
            .any(|segment| segment == ".." || segment.starts_with('.') && segment.len() > 1)
        {
            return Some(StatusCode::BAD_REQUEST.into_response());
        }

        let file = root.join(request.path.trim_start_matches('/'));
        let bytes = match tokio::fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) if err.kind() == std::io::ErrorKind::IsADirectory => return None,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "failed to read static file");
                return Some(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }
        };

        let mimetype = mime_guess::from_path(&file).first_or_octet_stream();
        let body = if request.is_head() {
            Body::empty()
        } else {
            Body::from(bytes.clone())
        };
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mimetype.as_ref())
            .header(header::CONTENT_LENGTH, bytes.len())
            .body(body)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
        Some(response)
    }
}
