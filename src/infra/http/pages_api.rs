//! REST endpoints for page resources.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use pressroom_api_types::{PageWriteRequest, PublishRequest};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::search::SearchParams;
use crate::domain::resource::{Resource, ResourceKind, Version};
use crate::domain::security::Principal;

use super::convert::{resource_document, search_result_document};
use super::state::HttpState;

fn if_match(headers: &HeaderMap) -> String {
    headers
        .get(header::IF_MATCH)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn document_response(status: StatusCode, resource: &Resource) -> Response {
    let document = resource_document(resource);
    let mut response = (status, Json(document)).into_response();
    if let Ok(etag) = resource.etag().parse() {
        response.headers_mut().insert(header::ETAG, etag);
    }
    response
}

fn parse_version(query: &VersionQuery) -> Result<Option<Version>, AppError> {
    match query.version.as_deref() {
        None => Ok(None),
        Some(raw) => Version::try_from(raw)
            .map(Some)
            .map_err(|_| AppError::validation(format!("unknown version `{raw}`"))),
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct VersionQuery {
    pub version: Option<String>,
}

/// `GET /api/pages` — structured listing over the page index.
pub async fn list_pages(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Query(mut params): Query<SearchParams>,
) -> Result<Response, AppError> {
    params.kind = Some(String::from("page"));
    let caller = (!principal.is_anonymous()).then(|| principal.user().clone());
    let result = state
        .search
        .search(&state.site, &params, caller.as_ref())
        .await?;
    Ok(Json(search_result_document(&result)).into_response())
}

/// `GET /api/pages/{id}` — one version slot of a page.
pub async fn get_page(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    Query(query): Query<VersionQuery>,
) -> Result<Response, AppError> {
    let page = match parse_version(&query)? {
        Some(version) => state.pages.get(&state.site, id, version).await?,
        None => state.pages.get_any(&state.site, id).await?,
    };
    if page.kind() != ResourceKind::Page {
        return Err(AppError::NotFound);
    }
    Ok(document_response(StatusCode::OK, &page))
}

/// `POST /api/pages` — create a draft.
pub async fn create_page(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<PageWriteRequest>,
) -> Result<Response, AppError> {
    let created = state.pages.create(&state.site, &principal, request).await?;
    Ok(document_response(StatusCode::CREATED, &created))
}

/// `PUT /api/pages/{id}` — replace the draft; requires `If-Match`.
pub async fn update_page(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<PageWriteRequest>,
) -> Result<Response, AppError> {
    let updated = state
        .pages
        .update(&state.site, &principal, id, &if_match(&headers), request)
        .await?;
    Ok(document_response(StatusCode::OK, &updated))
}

/// `DELETE /api/pages/{id}` — drop every version; requires `If-Match`.
pub async fn delete_page(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    state
        .pages
        .delete(&state.site, &principal, id, &if_match(&headers))
        .await?;
    state.previews.evict(&state.site, id);
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/pages/{id}/lock`.
pub async fn lock_page(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let locked = state.pages.lock(&state.site, &principal, id).await?;
    Ok(document_response(StatusCode::OK, &locked))
}

/// `DELETE /api/pages/{id}/lock`.
pub async fn unlock_page(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let unlocked = state.pages.unlock(&state.site, &principal, id).await?;
    Ok(document_response(StatusCode::OK, &unlocked))
}

/// `POST /api/pages/{id}/publish` — promote WORK to LIVE; requires
/// `If-Match`.
pub async fn publish_page(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    request: Option<Json<PublishRequest>>,
) -> Result<Response, AppError> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let live = state
        .pages
        .publish(&state.site, &principal, id, &if_match(&headers), request)
        .await?;
    Ok(document_response(StatusCode::OK, &live))
}

/// `DELETE /api/pages/{id}/publish` — take the LIVE version down; requires
/// `If-Match`.
pub async fn unpublish_page(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let work = state
        .pages
        .unpublish(&state.site, &principal, id, &if_match(&headers))
        .await?;
    Ok(document_response(StatusCode::OK, &work))
}
