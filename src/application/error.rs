use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pressroom_api_types::{ErrorBody, ErrorMessage};
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

/// Diagnostic chain attached to error responses for logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("insufficient rights: {0}")]
    Forbidden(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::NotFound { .. })
            | AppError::Repo(RepoError::NotFound)
            | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Domain(DomainError::Validation { .. })
            | AppError::Repo(RepoError::InvalidInput { .. })
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::Repo(RepoError::LockedByOther { .. }) => {
                StatusCode::FORBIDDEN
            }
            AppError::Domain(DomainError::Conflict { .. })
            | AppError::Repo(RepoError::PathTaken { .. }) => StatusCode::CONFLICT,
            AppError::Repo(RepoError::StaleEtag)
            | AppError::Repo(RepoError::NoWorkVersion)
            | AppError::Repo(RepoError::DanglingReferences { .. }) => {
                StatusCode::PRECONDITION_FAILED
            }
            AppError::Repo(RepoError::Persistence(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(InfraError::Repository { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Domain(DomainError::Invariant { .. }) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::CONFLICT => "conflict",
            StatusCode::PRECONDITION_FAILED => "precondition_failed",
            StatusCode::SERVICE_UNAVAILABLE => "unavailable",
            _ => "internal",
        }
    }

    fn presentation_message(&self) -> String {
        match self {
            AppError::Repo(RepoError::DanglingReferences { ids }) => {
                format!("unresolved resource references: {}", ids.join(", "))
            }
            AppError::Repo(RepoError::PathTaken { path }) => {
                format!("a resource already exists at `{path}`")
            }
            AppError::Repo(RepoError::StaleEtag) => {
                String::from("entity tag does not match the current resource")
            }
            AppError::Repo(RepoError::NoWorkVersion) => {
                String::from("no work version exists for this resource")
            }
            AppError::Repo(RepoError::LockedByOther { owner }) => {
                format!("resource is locked by {owner}")
            }
            AppError::Validation(message) => message.clone(),
            AppError::Forbidden(message) => message.clone(),
            AppError::Unauthorized => String::from("authentication required"),
            AppError::NotFound | AppError::Repo(RepoError::NotFound) => {
                String::from("resource not found")
            }
            AppError::Domain(DomainError::Validation { message }) => message.clone(),
            AppError::Repo(RepoError::InvalidInput { message }) => message.clone(),
            AppError::Repo(RepoError::Persistence(_)) => {
                String::from("repository temporarily unavailable")
            }
            _ => String::from("unexpected error occurred"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorMessage {
                code: self.code().to_string(),
                message: self.presentation_message(),
            },
        };
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_map_to_the_status_contract() {
        assert_eq!(
            AppError::from(RepoError::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(RepoError::PathTaken { path: "/a".into() }).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(RepoError::StaleEtag).status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            AppError::from(RepoError::DanglingReferences { ids: vec![] }).status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            AppError::from(RepoError::LockedByOther {
                owner: crate::domain::user::User::new("jdoe")
            })
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(RepoError::Persistence(String::from("io"))).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }
}
