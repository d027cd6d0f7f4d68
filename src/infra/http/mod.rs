//! HTTP surface: REST API routers plus the site dispatcher fallback.

pub mod auth;
mod convert;
mod files_api;
mod pages_api;
mod previews_api;
mod search_api;
mod site;
mod state;

pub use auth::UserDirectory;
pub use state::HttpState;

use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tracing::error;

use crate::application::error::ErrorReport;

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/pages",
            get(pages_api::list_pages).post(pages_api::create_page),
        )
        .route(
            "/api/pages/{id}",
            get(pages_api::get_page)
                .put(pages_api::update_page)
                .delete(pages_api::delete_page),
        )
        .route(
            "/api/pages/{id}/lock",
            post(pages_api::lock_page).delete(pages_api::unlock_page),
        )
        .route(
            "/api/pages/{id}/publish",
            post(pages_api::publish_page).delete(pages_api::unpublish_page),
        )
        .route("/api/files", post(files_api::create_file))
        .route("/api/files/{id}", get(files_api::get_file).delete(files_api::delete_file))
        .route("/api/files/{id}/content", get(files_api::get_file_content))
        .route(
            "/api/files/{id}/publish",
            post(files_api::publish_file).delete(files_api::unpublish_file),
        )
        .route("/api/search", get(search_api::search))
        .route("/api/previews/{id}", get(previews_api::get_preview))
        .fallback(site::serve_site)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .layer(middleware::from_fn(log_error_reports))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Surface attached [`ErrorReport`]s in the log without leaking them to the
/// client.
async fn log_error_reports(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    if let Some(report) = response.extensions().get::<ErrorReport>() {
        error!(
            %method,
            path = %path,
            status = report.status.as_u16(),
            source = report.source,
            chain = ?report.messages,
            "request failed"
        );
    }
    response
}
