//! The site-facing request model handed through the handler chain.

use std::collections::HashMap;

use axum::http::{HeaderMap, Method, header};

use crate::domain::resource::{Version, normalize_path};
use crate::domain::security::Principal;

/// Query parameter that disables the response cache for one request.
pub const NOCACHE_PARAM: &str = "nocache";

#[derive(Debug, Clone)]
pub struct SiteRequest {
    pub site: String,
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub headers: HeaderMap,
    pub principal: Principal,
}

impl SiteRequest {
    pub fn new(
        site: impl Into<String>,
        method: Method,
        path: impl Into<String>,
        params: HashMap<String, String>,
        headers: HeaderMap,
        principal: Principal,
    ) -> Self {
        Self {
            site: site.into(),
            method,
            path: normalize_path(path.into()),
            params,
            headers,
            principal,
        }
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Explicit cache bypass requested by the client.
    pub fn no_cache(&self) -> bool {
        self.params.contains_key(NOCACHE_PARAM)
    }

    /// The version slot this request addresses; defaults to LIVE.
    pub fn requested_version(&self) -> Version {
        match self.param("version") {
            Some("work") => Version::Work,
            _ => Version::Live,
        }
    }

    /// Primary language subtag from `Accept-Language`, defaulting to `en`.
    pub fn language(&self) -> String {
        self.headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|tag| {
                tag.trim()
                    .split(&['-', ';'][..])
                    .next()
                    .unwrap_or("en")
                    .to_ascii_lowercase()
            })
            .filter(|tag| !tag.is_empty() && *tag != "*")
            .unwrap_or_else(|| String::from("en"))
    }
}
