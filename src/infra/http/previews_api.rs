//! Resource preview endpoints.

use axum::extract::{Extension, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::previews::PreviewError;
use crate::domain::resource::Version;
use crate::domain::security::{Principal, Role};

use super::pages_api::VersionQuery;
use super::state::HttpState;

/// `GET /api/previews/{id}` — rendered preview of a resource version,
/// generated on demand. Draft previews are for editors.
pub async fn get_preview(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Query(query): Query<VersionQuery>,
) -> Result<Response, AppError> {
    let version = match query.version.as_deref() {
        Some("work") => {
            if !principal.has_role(Role::Editor) {
                return Err(if principal.is_anonymous() {
                    AppError::Unauthorized
                } else {
                    AppError::forbidden("draft previews require the editor role")
                });
            }
            Version::Work
        }
        _ => Version::Live,
    };

    let preview = state
        .previews
        .get_or_generate(&state.site, id, version)
        .await
        .map_err(|err| match err {
            PreviewError::UnsupportedKind => {
                AppError::validation("previews exist for page resources only")
            }
            PreviewError::Repo(repo) => AppError::from(repo),
        })?
        .ok_or(AppError::NotFound)?;

    Ok((
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        preview.html,
    )
        .into_response())
}
