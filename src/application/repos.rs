//! Repository traits describing content persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::resource::{Resource, Version};
use crate::domain::user::User;
use crate::search::{SearchQuery, SearchResult};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("a resource already exists at `{path}`")]
    PathTaken { path: String },
    #[error("no work version exists for this resource")]
    NoWorkVersion,
    #[error("resource is locked by {owner}")]
    LockedByOther { owner: User },
    #[error("entity tag precondition failed")]
    StaleEtag,
    #[error("unresolved resource references: {ids:?}")]
    DanglingReferences { ids: Vec<String> },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// The publication window requested alongside a publish operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishWindow {
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

/// A versioned content repository for one or more sites.
///
/// Mutations enforce the resource state machine: lock ownership, `If-Match`
/// entity tags against the stored version, and the publish preconditions.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Fetch a specific version slot of a resource.
    async fn get(
        &self,
        site: &str,
        id: Uuid,
        version: Version,
    ) -> Result<Option<Resource>, RepoError>;

    /// Fetch a version slot by site and path.
    async fn get_by_path(
        &self,
        site: &str,
        path: &str,
        version: Version,
    ) -> Result<Option<Resource>, RepoError>;

    /// Execute a structured query.
    async fn find(&self, query: &SearchQuery) -> Result<SearchResult, RepoError>;

    /// Create a resource. The WORK slot is created on first write; a
    /// different resource already mounted at the same path is rejected.
    async fn create(&self, resource: Resource) -> Result<Resource, RepoError>;

    /// Replace the WORK version's content and metadata.
    ///
    /// Requires the current entity tag and, for locked resources, lock
    /// ownership.
    async fn update(
        &self,
        resource: Resource,
        user: &User,
        if_match: &str,
    ) -> Result<Resource, RepoError>;

    /// Delete every version of a resource.
    async fn delete(
        &self,
        site: &str,
        id: Uuid,
        user: &User,
        if_match: &str,
    ) -> Result<(), RepoError>;

    /// Acquire the editing lock on the WORK version.
    async fn lock(&self, site: &str, id: Uuid, user: &User) -> Result<Resource, RepoError>;

    /// Release the editing lock. `force` allows releasing a foreign lock.
    async fn unlock(
        &self,
        site: &str,
        id: Uuid,
        user: &User,
        force: bool,
    ) -> Result<Resource, RepoError>;

    /// Promote the WORK version to LIVE.
    ///
    /// Fails when no WORK version exists, when the entity tag is stale, or
    /// when a pagelet `resourceid` property references a resource without a
    /// LIVE version.
    async fn publish(
        &self,
        site: &str,
        id: Uuid,
        window: PublishWindow,
        user: &User,
        if_match: &str,
    ) -> Result<Resource, RepoError>;

    /// Delete the LIVE version. When no WORK copy exists, the LIVE content
    /// is cloned back into a fresh WORK version with its publishing fields
    /// cleared.
    async fn unpublish(
        &self,
        site: &str,
        id: Uuid,
        user: &User,
        if_match: &str,
    ) -> Result<Resource, RepoError>;

    /// Every stored version slot, for the archive export command.
    async fn export(&self) -> Result<Vec<Resource>, RepoError>;

    /// Force-insert a version slot, bypassing the state machine; only the
    /// archive import command uses this.
    async fn import(&self, resource: Resource) -> Result<(), RepoError>;
}

/// `If-Match` comparison; `*` matches any current entity tag.
pub fn etag_matches(if_match: &str, current: &str) -> bool {
    let if_match = if_match.trim();
    if_match == "*" || if_match == current
}

#[cfg(test)]
mod tests {
    use super::etag_matches;

    #[test]
    fn wildcard_matches_everything() {
        assert!(etag_matches("*", "W/\"123\""));
        assert!(etag_matches("W/\"123\"", "W/\"123\""));
        assert!(!etag_matches("W/\"456\"", "W/\"123\""));
    }
}
