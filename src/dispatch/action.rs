//! Actions: site-defined request endpoints mounted into the URL space.
//!
//! The registry maps mountpoints to actions. Matching picks the mount with
//! the longest path prefix on a segment boundary, and resolved URLs are
//! memoized in a concurrent map so repeat lookups skip the scan entirely.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::application::error::AppError;
use crate::domain::resource::normalize_path;

use super::request::SiteRequest;

/// What an action produced; the dispatcher owns headers, caching and
/// conditional handling.
#[derive(Debug, Clone)]
pub struct ActionOutput {
    pub content_type: String,
    pub body: String,
}

impl ActionOutput {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            content_type: String::from("text/html; charset=utf-8"),
            body: body.into(),
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            content_type: String::from("application/json"),
            body: body.into(),
        }
    }
}

/// A pluggable request endpoint.
#[async_trait]
pub trait Action: Send + Sync {
    /// Stable identifier used for registration bookkeeping.
    fn name(&self) -> &str;

    /// Handle a request below this action's mountpoint.
    async fn serve(&self, request: &SiteRequest) -> Result<ActionOutput, AppError>;
}

/// An action bound to a site and mountpoint, with the cache lifetimes its
/// output should get.
pub struct ActionMount {
    pub site: String,
    pub path: String,
    pub action: Arc<dyn Action>,
    pub valid_time: Duration,
    pub recheck_time: Duration,
}

impl ActionMount {
    fn matches(&self, site: &str, path: &str) -> bool {
        if self.site != site {
            return false;
        }
        if self.path == "/" {
            return true;
        }
        match path.strip_prefix(&self.path) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }
}

#[derive(Default)]
pub struct ActionRegistry {
    mounts: RwLock<Vec<Arc<ActionMount>>>,
    /// Normalized `site:path` → resolved mount.
    url_cache: DashMap<String, Arc<ActionMount>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount an action. Remounting the same action name on the same site
    /// replaces the previous mount.
    pub fn register(
        &self,
        site: impl Into<String>,
        path: impl Into<String>,
        action: Arc<dyn Action>,
        valid_time: Duration,
        recheck_time: Duration,
    ) {
        let site = site.into();
        let path = normalize_path(path.into());
        let mount = Arc::new(ActionMount {
            site: site.clone(),
            path: path.clone(),
            action,
            valid_time,
            recheck_time,
        });
        {
            let mut mounts = self.mounts.write().unwrap_or_else(|p| p.into_inner());
            mounts.retain(|existing| {
                !(existing.site == site && existing.action.name() == mount.action.name())
            });
            mounts.push(mount.clone());
        }
        // Stale resolutions must not outlive a remount.
        self.url_cache.clear();
        debug!(site = %site, path = %path, action = mount.action.name(), "action registered");
    }

    /// Unregister by action name; returns whether anything was removed.
    pub fn unregister(&self, site: &str, name: &str) -> bool {
        let removed = {
            let mut mounts = self.mounts.write().unwrap_or_else(|p| p.into_inner());
            let before = mounts.len();
            mounts.retain(|mount| !(mount.site == site && mount.action.name() == name));
            before != mounts.len()
        };
        if removed {
            self.url_cache
                .retain(|_, mount| !(mount.site == site && mount.action.name() == name));
            debug!(site = %site, action = name, "action unregistered");
        }
        removed
    }

    /// Resolve the mount owning `path`, longest mountpoint first.
    pub fn resolve(&self, site: &str, path: &str) -> Option<Arc<ActionMount>> {
        let path = normalize_path(path.to_string());
        let cache_key = format!("{site}:{path}");
        if let Some(hit) = self.url_cache.get(&cache_key) {
            trace!(key = %cache_key, "action url cache hit");
            return Some(hit.value().clone());
        }

        let mounts = self.mounts.read().unwrap_or_else(|p| p.into_inner());
        let best = mounts
            .iter()
            .filter(|mount| mount.matches(site, &path))
            .max_by_key(|mount| mount.path.len())
            .cloned()?;
        drop(mounts);

        self.url_cache.insert(cache_key, best.clone());
        Some(best)
    }

    pub fn is_empty(&self) -> bool {
        self.mounts
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .is_empty()
    }
}

/// Tags characterizing an action response, including the request parameters
/// the action output depends on.
pub fn action_cache_tags(
    mount: &ActionMount,
    request: &SiteRequest,
) -> crate::cache::CacheTagSet {
    use crate::cache::{CacheTagSet, tag_names};

    let mut tags = CacheTagSet::new();
    tags.add_value(tag_names::URL, request.path.clone());
    tags.add_value(tag_names::SITE, mount.site.clone());
    tags.add_value(tag_names::ACTION, mount.action.name());
    tags.add_value(tag_names::LANGUAGE, request.language());
    tags.add_value(tag_names::USER, request.principal.user().login());
    let mut params: Vec<(&String, &String)> = request
        .params
        .iter()
        .filter(|(name, _)| name.as_str() != super::request::NOCACHE_PARAM)
        .collect();
    params.sort();
    for (name, value) in params {
        tags.add_value(tag_names::PARAMETER, format!("{name}={value}"));
    }
    tags
}

/// Convenience for tests and built-in actions: an action backed by a
/// function.
pub struct FnAction<F> {
    name: String,
    serve: F,
}

impl<F> FnAction<F>
where
    F: Fn(&SiteRequest) -> Result<ActionOutput, AppError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, serve: F) -> Self {
        Self {
            name: name.into(),
            serve,
        }
    }
}

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(&SiteRequest) -> Result<ActionOutput, AppError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn serve(&self, request: &SiteRequest) -> Result<ActionOutput, AppError> {
        (self.serve)(request)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::{HeaderMap, Method};

    use crate::domain::security::Principal;

    use super::*;

    fn noop(name: &str) -> Arc<dyn Action> {
        Arc::new(FnAction::new(name, |_request| Ok(ActionOutput::html("ok"))))
    }

    fn registry_with(mounts: &[(&str, &str)]) -> ActionRegistry {
        let registry = ActionRegistry::new();
        for (path, name) in mounts {
            registry.register(
                "main",
                *path,
                noop(name),
                Duration::from_secs(60),
                Duration::from_secs(10),
            );
        }
        registry
    }

    #[test]
    fn longest_mountpoint_wins() {
        let registry = registry_with(&[("/shop", "shop"), ("/shop/checkout", "checkout")]);

        let mount = registry.resolve("main", "/shop/checkout/step1").expect("match");
        assert_eq!(mount.action.name(), "checkout");

        let mount = registry.resolve("main", "/shop/cart").expect("match");
        assert_eq!(mount.action.name(), "shop");
    }

    #[test]
    fn matching_respects_segment_boundaries() {
        let registry = registry_with(&[("/shop", "shop")]);
        assert!(registry.resolve("main", "/shopping").is_none());
        assert!(registry.resolve("main", "/shop").is_some());
        assert!(registry.resolve("main", "/shop/").is_some());
    }

    #[test]
    fn resolution_is_memoized_and_purged_on_unregister() {
        let registry = registry_with(&[("/shop", "shop")]);
        assert!(registry.resolve("main", "/shop/cart").is_some());
        assert!(registry.url_cache.contains_key("main:/shop/cart"));

        assert!(registry.unregister("main", "shop"));
        assert!(!registry.url_cache.contains_key("main:/shop/cart"));
        assert!(registry.resolve("main", "/shop/cart").is_none());
    }

    #[test]
    fn sites_are_isolated() {
        let registry = registry_with(&[("/shop", "shop")]);
        assert!(registry.resolve("other", "/shop").is_none());
    }

    #[test]
    fn parameter_tags_are_sorted_and_skip_nocache() {
        let registry = registry_with(&[("/shop", "shop")]);
        let mount = registry.resolve("main", "/shop").expect("mount");

        let mut params = HashMap::new();
        params.insert("b".to_string(), "2".to_string());
        params.insert("a".to_string(), "1".to_string());
        params.insert("nocache".to_string(), String::new());
        let request = SiteRequest::new(
            "main",
            Method::GET,
            "/shop",
            params,
            HeaderMap::new(),
            Principal::anonymous(),
        );

        let tags = action_cache_tags(&mount, &request);
        let rendered: Vec<String> = tags.iter().map(ToString::to_string).collect();
        assert!(rendered.contains(&"parameter=a=1".to_string()));
        assert!(rendered.contains(&"parameter=b=2".to_string()));
        assert!(!rendered.iter().any(|tag| tag.contains("nocache")));
    }
}
