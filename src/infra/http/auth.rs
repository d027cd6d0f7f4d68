//! Bearer-token authentication against the configured user directory.
//!
//! Every request gets a [`Principal`] extension: the matched account's user
//! with the closure of its roles, or the anonymous guest. A presented but
//! unknown token is rejected outright rather than downgraded to guest.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::application::error::AppError;
use crate::config::AccountSettings;
use crate::domain::security::{Principal, Role};
use crate::domain::user::{DEFAULT_REALM, User};

use super::state::HttpState;

pub struct UserDirectory {
    accounts: Vec<Account>,
}

struct Account {
    user: User,
    token: String,
    roles: Vec<Role>,
}

impl UserDirectory {
    pub fn from_settings(accounts: &[AccountSettings]) -> Self {
        let accounts = accounts
            .iter()
            .filter(|account| !account.token.is_empty())
            .map(|account| {
                let realm = account.realm.as_deref().unwrap_or(DEFAULT_REALM);
                let user = match &account.name {
                    Some(name) => User::named(&account.login, realm, name),
                    None => User::with_realm(&account.login, realm),
                };
                Account {
                    user,
                    token: account.token.clone(),
                    roles: account
                        .roles
                        .iter()
                        .filter_map(|role| Role::try_from(role.as_str()).ok())
                        .collect(),
                }
            })
            .collect();
        Self { accounts }
    }

    /// Resolve a bearer token to its principal; comparison is constant-time
    /// per account.
    pub fn authenticate(&self, token: &str) -> Option<Principal> {
        let presented = token.as_bytes();
        self.accounts
            .iter()
            .find(|account| {
                account.token.len() == presented.len()
                    && account.token.as_bytes().ct_eq(presented).into()
            })
            .map(|account| Principal::new(account.user.clone(), &account.roles))
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Middleware resolving `Authorization: Bearer` into a request principal.
pub async fn authenticate(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let principal = match bearer_token(&request) {
        Some(token) => match state.directory.authenticate(token) {
            Some(principal) => principal,
            None => {
                debug!("rejected unknown bearer token");
                return AppError::Unauthorized.into_response();
            }
        },
        None => Principal::anonymous(),
    };
    request.extensions_mut().insert(principal);
    next.run(request).await
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> UserDirectory {
        UserDirectory::from_settings(&[
            AccountSettings {
                login: "jdoe".into(),
                realm: None,
                name: Some("John Doe".into()),
                token: "editor-token".into(),
                roles: vec!["editor".into()],
            },
            AccountSettings {
                login: "amelie".into(),
                realm: Some("test".into()),
                name: None,
                token: "publisher-token".into(),
                roles: vec!["publisher".into(), "bogus".into()],
            },
        ])
    }

    #[test]
    fn tokens_resolve_to_principals_with_role_closures() {
        let directory = directory();
        let principal = directory.authenticate("publisher-token").expect("principal");
        assert_eq!(principal.user().login(), "amelie");
        assert!(principal.has_role(Role::Publisher));
        assert!(principal.has_role(Role::Editor));
        assert!(!principal.has_role(Role::SiteAdmin));
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        assert!(directory().authenticate("wrong").is_none());
        assert!(directory().authenticate("").is_none());
    }
}
