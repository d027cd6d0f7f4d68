//! The structured search endpoint.

use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::response::{IntoResponse, Response};

use crate::application::error::AppError;
use crate::application::search::SearchParams;
use crate::domain::security::Principal;

use super::convert::search_result_document;
use super::state::HttpState;

/// `GET /api/search` — execute a structured query over the site index.
pub async fn search(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<SearchParams>,
) -> Result<Response, AppError> {
    let caller = (!principal.is_anonymous()).then(|| principal.user().clone());
    let result = state
        .search
        .search(&state.site, &params, caller.as_ref())
        .await?;
    Ok(Json(search_result_document(&result)).into_response())
}
