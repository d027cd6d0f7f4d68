//! Shared request and response types for the Pressroom content management
//! API.
//!
//! These types define the JSON wire format of `/api/...`; the server maps
//! its domain model onto them and the CLI consumes them unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// ----------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
}

// ----------------------------------------------------------------------
// Resource documents
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionView {
    Work,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKindView {
    Page,
    File,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub realm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedView {
    pub user: UserRef,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageletView {
    pub module: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub elements: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerView {
    pub id: String,
    #[serde(default)]
    pub pagelets: Vec<PageletView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryContentView {
    pub filename: String,
    pub mimetype: String,
    pub digest: String,
    pub size: u64,
}

/// The JSON rendition of one resource version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDocument {
    pub id: Uuid,
    pub site: String,
    pub path: String,
    pub version: VersionView,
    pub kind: ResourceKindView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    pub created: ContextView,
    pub modified: ContextView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<PublishedView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub composers: Vec<ComposerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<BinaryContentView>,
    pub etag: String,
}

// ----------------------------------------------------------------------
// Requests
// ----------------------------------------------------------------------

/// Body of `POST /api/pages` and `PUT /api/pages/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageWriteRequest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub composers: Vec<ComposerView>,
}

/// Body of `POST /api/pages/{id}/publish`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
}

// ----------------------------------------------------------------------
// Search
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultDocument {
    pub hit_count: usize,
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    pub hits: Vec<ResourceDocument>,
}
