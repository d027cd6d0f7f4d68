//! REST endpoints for file and image resources.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::domain::resource::Version;
use crate::domain::security::Principal;

use super::convert::resource_document;
use super::pages_api::VersionQuery;
use super::state::HttpState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub path: String,
    pub filename: String,
}

fn if_match(headers: &HeaderMap) -> String {
    headers
        .get(header::IF_MATCH)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// `POST /api/files?path=..&filename=..` — store an upload as a new file or
/// image resource.
pub async fn create_file(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Response, AppError> {
    if body.is_empty() {
        return Err(AppError::validation("upload body cannot be empty"));
    }
    let created = state
        .files
        .create(&state.site, &principal, &query.path, &query.filename, body)
        .await?;
    let document = resource_document(&created);
    let mut response = (StatusCode::CREATED, Json(document)).into_response();
    if let Ok(etag) = created.etag().parse() {
        response.headers_mut().insert(header::ETAG, etag);
    }
    Ok(response)
}

/// `GET /api/files/{id}` — the resource document.
pub async fn get_file(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    Query(query): Query<VersionQuery>,
) -> Result<Response, AppError> {
    let version = match query.version.as_deref() {
        Some("live") => Version::Live,
        _ => Version::Work,
    };
    let resource = state.files.get(&state.site, id, version).await?;
    Ok(Json(resource_document(&resource)).into_response())
}

/// `GET /api/files/{id}/content` — the stored bytes.
pub async fn get_file_content(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    Query(query): Query<VersionQuery>,
) -> Result<Response, AppError> {
    let version = match query.version.as_deref() {
        Some("live") => Version::Live,
        _ => Version::Work,
    };
    let resource = state.files.get(&state.site, id, version).await?;
    let bytes = state.files.content(&resource).await?;
    let mimetype = resource
        .binary_content()
        .map(|content| content.mimetype.clone())
        .unwrap_or_else(|| String::from("application/octet-stream"));
    Ok(([(header::CONTENT_TYPE, mimetype)], bytes).into_response())
}

/// `POST /api/files/{id}/publish` — promote the upload to LIVE; requires
/// `If-Match`. Shares the resource lifecycle with the pages service.
pub async fn publish_file(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let live = state
        .pages
        .publish(
            &state.site,
            &principal,
            id,
            &if_match(&headers),
            Default::default(),
        )
        .await?;
    Ok(Json(resource_document(&live)).into_response())
}

/// `DELETE /api/files/{id}/publish` — requires `If-Match`.
pub async fn unpublish_file(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let work = state
        .pages
        .unpublish(&state.site, &principal, id, &if_match(&headers))
        .await?;
    Ok(Json(resource_document(&work)).into_response())
}

/// `DELETE /api/files/{id}` — requires `If-Match`.
pub async fn delete_file(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    state
        .files
        .delete(&state.site, &principal, id, &if_match(&headers))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
