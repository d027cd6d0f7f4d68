//! Translation of REST query parameters into structured search queries.

use std::sync::Arc;

use serde::Deserialize;

use crate::application::error::AppError;
use crate::application::repos::ContentRepository;
use crate::domain::resource::{ResourceKind, Version};
use crate::domain::user::User;
use crate::search::{Order, SearchQuery, SearchResult};

/// Query-string shape of `/api/search` and the listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    /// Free text.
    pub q: Option<String>,
    pub path: Option<String>,
    pub prefix: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub kind: Option<String>,
    pub template: Option<String>,
    /// Comma-separated subject list; all must match.
    pub subject: Option<String>,
    pub version: Option<String>,
    /// `creator:<login>`, `modifier:<login>`, `publisher:<login>` or
    /// `locked:<login|me>`.
    pub filter: Option<String>,
    /// `created|modified|published`, optionally suffixed `-asc`/`-desc`.
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub struct SearchService {
    repository: Arc<dyn ContentRepository>,
}

impl SearchService {
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self { repository }
    }

    pub async fn search(
        &self,
        site: &str,
        params: &SearchParams,
        caller: Option<&User>,
    ) -> Result<SearchResult, AppError> {
        let query = build_query(site, params, caller)?;
        Ok(self.repository.find(&query).await?)
    }
}

/// Build a [`SearchQuery`] from validated request parameters.
pub fn build_query(
    site: &str,
    params: &SearchParams,
    caller: Option<&User>,
) -> Result<SearchQuery, AppError> {
    let mut query = SearchQuery::new(site);

    if let Some(text) = params.q.as_deref().filter(|q| !q.trim().is_empty()) {
        query = query.with_text(text.trim());
    }
    if let Some(path) = params.path.as_deref() {
        if path.trim().is_empty() {
            return Err(AppError::validation("path cannot be empty"));
        }
        query = query.with_path(path);
    }
    if let Some(prefix) = params.prefix.as_deref() {
        if prefix.trim().is_empty() {
            return Err(AppError::validation("prefix cannot be empty"));
        }
        query = query.with_path_prefix(prefix);
    }
    if let Some(resource_type) = &params.resource_type {
        query = query.with_type(resource_type.clone());
    }
    if let Some(kind) = params.kind.as_deref() {
        let kind = ResourceKind::try_from(kind)
            .map_err(|_| AppError::validation(format!("unknown resource kind `{kind}`")))?;
        query = query.with_kind(kind);
    }
    if let Some(template) = &params.template {
        query = query.with_template(template.clone());
    }
    if let Some(subjects) = params.subject.as_deref() {
        for subject in subjects.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            query = query.with_subject(subject);
        }
    }
    if let Some(version) = params.version.as_deref() {
        let version = Version::try_from(version)
            .map_err(|_| AppError::validation(format!("unknown version `{version}`")))?;
        query = query.with_version(version);
    } else {
        query = query.with_preferred_version(Version::Live);
    }
    if let Some(filter) = params.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        query = apply_filter(query, filter.trim(), caller)?;
    }
    if let Some(sort) = params.sort.as_deref() {
        query = apply_sort(query, sort)?;
    }
    if let Some(limit) = params.limit {
        query = query.with_limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.with_offset(offset);
    }
    Ok(query)
}

/// The filter grammar of the pages listing: one `prefix:value` term mapped
/// onto its user predicate.
fn apply_filter(
    query: SearchQuery,
    filter: &str,
    caller: Option<&User>,
) -> Result<SearchQuery, AppError> {
    if let Some(login) = filter.strip_prefix("creator:") {
        return Ok(query.with_creator(User::new(login.trim())));
    }
    if let Some(login) = filter.strip_prefix("modifier:") {
        return Ok(query.with_modifier(User::new(login.trim())));
    }
    if let Some(login) = filter.strip_prefix("publisher:") {
        return Ok(query.with_publisher(User::new(login.trim())));
    }
    if let Some(owner) = filter.strip_prefix("locked:") {
        let owner = owner.trim();
        let user = if owner == "me" {
            caller
                .cloned()
                .ok_or_else(|| AppError::validation("`locked:me` requires authentication"))?
        } else {
            User::new(owner)
        };
        return Ok(query.with_lock_owner(user));
    }
    // No recognized prefix: treat the filter as free text.
    Ok(query.with_text(filter))
}

fn apply_sort(query: SearchQuery, sort: &str) -> Result<SearchQuery, AppError> {
    let (field, order) = match sort.rsplit_once('-') {
        Some((field, "asc")) => (field, Order::Ascending),
        Some((field, "desc")) => (field, Order::Descending),
        _ => (sort, Order::Ascending),
    };
    match field {
        "created" => Ok(query.sort_by_creation_date(order)),
        "modified" => Ok(query.sort_by_modification_date(order)),
        "published" => Ok(query.sort_by_publishing_date(order)),
        other => Err(AppError::validation(format!("unknown sort field `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_path_and_version_query() {
        let params = SearchParams {
            path: Some("/a/b".into()),
            version: Some("work".into()),
            limit: Some(10),
            offset: Some(0),
            ..SearchParams::default()
        };
        let query = build_query("main", &params, None).expect("query");
        assert_eq!(query.path(), Some("/a/b"));
        assert_eq!(query.version(), Some(Version::Work));
        assert_eq!(query.limit(), Some(10));
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn filters_map_to_their_own_predicates() {
        let base = || SearchParams::default();

        let mut params = base();
        params.filter = Some("creator:jdoe".into());
        let query = build_query("main", &params, None).expect("query");
        assert_eq!(query.creator().map(|u| u.login()), Some("jdoe"));
        assert!(query.publisher().is_none());

        let mut params = base();
        params.filter = Some("publisher:amelie".into());
        let query = build_query("main", &params, None).expect("query");
        assert_eq!(query.publisher().map(|u| u.login()), Some("amelie"));
        assert!(query.creator().is_none());

        let mut params = base();
        params.filter = Some("locked:me".into());
        let caller = User::new("jdoe");
        let query = build_query("main", &params, Some(&caller)).expect("query");
        assert_eq!(query.lock_owner().map(|u| u.login()), Some("jdoe"));
    }

    #[test]
    fn locked_me_without_a_caller_is_invalid() {
        let mut params = SearchParams::default();
        params.filter = Some("locked:me".into());
        assert!(build_query("main", &params, None).is_err());
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        let mut params = SearchParams::default();
        params.sort = Some("size-desc".into());
        assert!(build_query("main", &params, None).is_err());
    }

    #[test]
    fn default_version_prefers_live() {
        let params = SearchParams::default();
        let query = build_query("main", &params, None).expect("query");
        assert_eq!(query.version(), None);
        assert_eq!(query.preferred_version(), Some(Version::Live));
    }
}
