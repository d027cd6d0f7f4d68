//! The content-type-specific request handlers walked by the dispatcher.

mod action;
mod feed;
mod file;
mod image;
mod page;
mod static_files;

pub use action::ActionRequestHandler;
pub use feed::FeedRequestHandler;
pub use file::FileRequestHandler;
pub use image::ImageRequestHandler;
pub use page::PageRequestHandler;
pub use static_files::StaticRequestHandler;

use std::sync::Arc;
use std::time::Duration;

use axum::response::{IntoResponse, Response};
use time::OffsetDateTime;
use tracing::warn;

use crate::application::error::AppError;
use crate::cache::{CacheHandle, CacheTagSet, CachedBody, ResponseCache, StartOutcome};
use crate::dispatch::conditional;
use crate::dispatch::request::SiteRequest;

/// Output of a render closure: the body plus an optional content type that
/// overrides the handler default (actions decide theirs at render time).
pub(crate) struct Rendered {
    pub body: String,
    pub content_type: Option<String>,
}

impl Rendered {
    pub fn body(body: String) -> Self {
        Self {
            body,
            content_type: None,
        }
    }
}

/// Render a response through the cache.
///
/// On a hit the cached bytes are served (with conditional handling); on a
/// miss `render` runs and its output is committed. A render failure
/// invalidates the in-flight response so the error is never cached, and a
/// cache-layer fault degrades to direct rendering rather than failing the
/// request.
pub(crate) async fn serve_through_cache<F, Fut>(
    cache: &Arc<ResponseCache>,
    request: &SiteRequest,
    tags: CacheTagSet,
    valid_time: Duration,
    recheck_time: Duration,
    default_content_type: &str,
    modified: Option<OffsetDateTime>,
    render: F,
) -> Response
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Rendered, AppError>>,
{
    if request.no_cache() {
        return match render().await {
            Ok(rendered) => {
                let content_type = rendered
                    .content_type
                    .unwrap_or_else(|| default_content_type.to_string());
                conditional::respond(
                    &request.headers,
                    request.is_head(),
                    &content_type,
                    CachedBody {
                        headers: Vec::new(),
                        body: rendered.body.into(),
                        modified: modified.unwrap_or_else(OffsetDateTime::now_utc),
                    },
                )
            }
            Err(err) => err.into_response(),
        };
    }

    let mut handle = CacheHandle::new(tags, valid_time, recheck_time);
    if let Some(modified) = modified {
        handle.set_modification_date(modified);
    }

    match cache.start_response(handle) {
        StartOutcome::Hit(body) => {
            conditional::respond(&request.headers, request.is_head(), default_content_type, body)
        }
        StartOutcome::Miss(mut writer) => match render().await {
            Ok(rendered) => {
                let content_type = rendered
                    .content_type
                    .unwrap_or_else(|| default_content_type.to_string());
                writer.set_header("Content-Type", content_type.as_str());
                writer.write_str(&rendered.body);
                let body = writer.finish();
                conditional::respond(&request.headers, request.is_head(), &content_type, body)
            }
            Err(err) => {
                warn!(path = %request.path, error = %err, "render failed, response dropped from cache");
                writer.invalidate();
                err.into_response()
            }
        },
    }
}
