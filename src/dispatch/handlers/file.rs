//! Serves stored file resources.
//!
//! Binary content is served straight from the content store with
//! conditional-request handling; the response cache is for rendered markup,
//! not blobs.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::error::AppError;
use crate::application::files::FileService;
use crate::application::repos::ContentRepository;
use crate::cache::CachedBody;
use crate::dispatch::conditional;
use crate::dispatch::request::SiteRequest;
use crate::dispatch::{HandlerPriority, RequestHandler};
use crate::domain::resource::{Resource, ResourceKind, Version};
use crate::domain::security::Role;

pub struct FileRequestHandler {
    files: Arc<FileService>,
}

impl FileRequestHandler {
    pub fn new(files: Arc<FileService>) -> Self {
        Self { files }
    }
}

/// Resolve a binary resource of the wanted kind for a site request; shared
/// with the image handler.
pub(super) async fn resolve_binary(
    files: &FileService,
    request: &SiteRequest,
    kind: ResourceKind,
) -> Result<Option<Resource>, AppError> {
    let version = request.requested_version();
    let Some(resource) = files
        .repository()
        .get_by_path(&request.site, &request.path, version)
        .await?
    else {
        return Ok(None);
    };
    if resource.kind() != kind {
        return Ok(None);
    }
    match version {
        Version::Work => {
            if !request.principal.has_role(Role::Editor) {
                return Err(if request.principal.is_anonymous() {
                    AppError::Unauthorized
                } else {
                    AppError::forbidden("work versions require the editor role")
                });
            }
        }
        Version::Live => {
            if !resource.published().is_published_now() {
                return Ok(None);
            }
        }
    }
    Ok(Some(resource))
}

pub(super) async fn serve_binary(
    files: &FileService,
    request: &SiteRequest,
    resource: &Resource,
) -> Response {
    let content = match files.content(resource).await {
        Ok(bytes) => bytes,
        Err(err) => return err.into_response(),
    };
    let mimetype = resource
        .binary_content()
        .map(|c| c.mimetype.clone())
        .unwrap_or_else(|| String::from("application/octet-stream"));
    conditional::respond(
        &request.headers,
        request.is_head(),
        &mimetype,
        CachedBody {
            headers: Vec::new(),
            body: content,
            modified: resource.modified().date(),
        },
    )
}

#[async_trait]
impl RequestHandler for FileRequestHandler {
    fn name(&self) -> &'static str {
        "file"
    }

    fn priority(&self) -> HandlerPriority {
        HandlerPriority::File
    }

    async fn service(&self, request: &SiteRequest) -> Option<Response> {
        let resource = match resolve_binary(&self.files, request, ResourceKind::File).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return None,
            Err(err) => return Some(err.into_response()),
        };
        if !matches!(request.method, Method::GET | Method::HEAD) {
            return Some(StatusCode::METHOD_NOT_ALLOWED.into_response());
        }
        Some(serve_binary(&self.files, request, &resource).await)
    }
}
