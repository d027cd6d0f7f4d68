//! Versioned resources and their state machine.
//!
//! A resource is addressed by `(site, path, identifier)` and lives in at most
//! two version slots: WORK (the draft being edited) and LIVE (the published
//! copy). Each slot carries its own content, contexts and lock state. The
//! repository enforces the transitions; this module owns the per-version
//! invariants: lock ownership and the ETag derived from the modification
//! date.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::util::dates::unix_millis;
use crate::util::xml::{self, XmlNode};

use super::context::{CreationContext, ModificationContext, PublishingContext};
use super::error::DomainError;
use super::page::PageBody;
use super::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    Work,
    Live,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Version::Work => "work",
            Version::Live => "live",
        }
    }
}

impl TryFrom<&str> for Version {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "work" => Ok(Version::Work),
            "live" => Ok(Version::Live),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Page,
    File,
    Image,
}

impl ResourceKind {
    /// Root element name of the XML document.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Page => "page",
            ResourceKind::File => "file",
            ResourceKind::Image => "image",
        }
    }
}

impl TryFrom<&str> for ResourceKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "page" => Ok(ResourceKind::Page),
            "file" => Ok(ResourceKind::File),
            "image" => Ok(ResourceKind::Image),
            _ => Err(()),
        }
    }
}

/// Where a resource version lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUri {
    pub site: String,
    pub path: String,
    pub id: Uuid,
    pub version: Version,
}

impl ResourceUri {
    pub fn new(site: impl Into<String>, path: impl Into<String>, id: Uuid, version: Version) -> Self {
        Self {
            site: site.into(),
            path: normalize_path(path.into()),
            id,
            version,
        }
    }
}

impl std::fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}#{}", self.site, self.path, self.version)
    }
}

/// Trim trailing slashes and guarantee a leading one.
pub fn normalize_path(path: String) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::from("/");
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Stored binary content of file and image resources.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryContent {
    pub filename: String,
    pub mimetype: String,
    pub digest: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceBody {
    Page(PageBody),
    Binary(BinaryContent),
}

#[derive(Debug, Clone)]
pub struct Resource {
    uri: ResourceUri,
    kind: ResourceKind,
    resource_type: Option<String>,
    template: Option<String>,
    subjects: Vec<String>,
    created: CreationContext,
    modified: ModificationContext,
    published: PublishingContext,
    lock_owner: Option<User>,
    body: ResourceBody,
}

impl Resource {
    pub fn new_page(uri: ResourceUri, creator: Option<User>, body: PageBody) -> Self {
        Self::new(uri, ResourceKind::Page, creator, ResourceBody::Page(body))
    }

    pub fn new_binary(
        uri: ResourceUri,
        kind: ResourceKind,
        creator: Option<User>,
        content: BinaryContent,
    ) -> Self {
        Self::new(uri, kind, creator, ResourceBody::Binary(content))
    }

    fn new(uri: ResourceUri, kind: ResourceKind, creator: Option<User>, body: ResourceBody) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            uri,
            kind,
            resource_type: None,
            template: None,
            subjects: Vec::new(),
            created: CreationContext::new(creator.clone(), now),
            modified: ModificationContext::new(creator, now),
            published: PublishingContext::new(),
            lock_owner: None,
            body,
        }
    }

    pub fn uri(&self) -> &ResourceUri {
        &self.uri
    }

    pub fn id(&self) -> Uuid {
        self.uri.id
    }

    pub fn version(&self) -> Version {
        self.uri.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.uri.version = version;
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    pub fn set_resource_type(&mut self, resource_type: impl Into<String>) {
        self.resource_type = Some(resource_type.into());
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn set_template(&mut self, template: impl Into<String>) {
        self.template = Some(template.into());
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn add_subject(&mut self, subject: impl Into<String>) {
        let subject = subject.into();
        if !self.subjects.contains(&subject) {
            self.subjects.push(subject);
        }
    }

    pub fn created(&self) -> &CreationContext {
        &self.created
    }

    pub fn created_mut(&mut self) -> &mut CreationContext {
        &mut self.created
    }

    pub fn modified(&self) -> &ModificationContext {
        &self.modified
    }

    /// Record a modification, bumping the ETag.
    pub fn touch(&mut self, modifier: Option<User>, date: OffsetDateTime) {
        self.modified.set_modified(modifier, date);
    }

    pub fn published(&self) -> &PublishingContext {
        &self.published
    }

    pub fn published_mut(&mut self) -> &mut PublishingContext {
        &mut self.published
    }

    pub fn body(&self) -> &ResourceBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ResourceBody {
        &mut self.body
    }

    pub fn page_body(&self) -> Option<&PageBody> {
        match &self.body {
            ResourceBody::Page(body) => Some(body),
            ResourceBody::Binary(_) => None,
        }
    }

    pub fn binary_content(&self) -> Option<&BinaryContent> {
        match &self.body {
            ResourceBody::Page(_) => None,
            ResourceBody::Binary(content) => Some(content),
        }
    }

    // ------------------------------------------------------------------
    // Locking
    // ------------------------------------------------------------------

    pub fn is_locked(&self) -> bool {
        self.lock_owner.is_some()
    }

    pub fn lock_owner(&self) -> Option<&User> {
        self.lock_owner.as_ref()
    }

    /// Acquire the editing lock.
    ///
    /// Idempotent for the current owner; any other user is turned away until
    /// the lock is released.
    pub fn set_locked(&mut self, user: &User) -> Result<(), DomainError> {
        if let Some(owner) = &self.lock_owner
            && owner != user
        {
            return Err(DomainError::conflict(format!(
                "resource {} is already locked by {owner}",
                self.uri
            )));
        }
        self.lock_owner = Some(user.clone());
        Ok(())
    }

    /// Release the editing lock, returning the previous owner.
    pub fn set_unlocked(&mut self) -> Option<User> {
        self.lock_owner.take()
    }

    // ------------------------------------------------------------------
    // Optimistic concurrency
    // ------------------------------------------------------------------

    /// Weak entity tag derived from the modification date.
    pub fn etag(&self) -> String {
        format!("W/\"{}\"", unix_millis(self.modified.date()))
    }

    // ------------------------------------------------------------------
    // XML document
    // ------------------------------------------------------------------

    pub fn to_xml(&self) -> String {
        let mut out = format!(
            "<{} id=\"{}\" path=\"{}\" version=\"{}\">",
            self.kind.as_str(),
            self.uri.id,
            xml::escape(&self.uri.path),
            self.uri.version
        );
        if let Some(resource_type) = &self.resource_type {
            out.push_str(&format!("<type>{}</type>", xml::escape(resource_type)));
        }
        if let Some(template) = &self.template {
            out.push_str(&format!("<template>{}</template>", xml::escape(template)));
        }
        for subject in &self.subjects {
            out.push_str(&format!("<subject>{}</subject>", xml::escape(subject)));
        }
        out.push_str(&self.created.to_xml());
        out.push_str(&self.modified.to_xml());
        out.push_str(&self.published.to_xml());
        if let Some(owner) = &self.lock_owner {
            out.push_str("<locked>");
            out.push_str(&owner.to_xml());
            out.push_str("</locked>");
        }
        match &self.body {
            ResourceBody::Page(body) => out.push_str(&body.to_xml()),
            ResourceBody::Binary(content) => {
                out.push_str(&format!(
                    "<content filename=\"{}\" mimetype=\"{}\" digest=\"{}\" size=\"{}\"/>",
                    xml::escape(&content.filename),
                    xml::escape(&content.mimetype),
                    xml::escape(&content.digest),
                    content.size
                ));
            }
        }
        out.push_str(&format!("</{}>", self.kind.as_str()));
        out
    }

    pub fn from_xml(site: &str, document: &str) -> Result<Self, DomainError> {
        let root = XmlNode::parse(document)
            .map_err(|err| DomainError::validation(format!("resource document: {err}")))?;
        let kind = ResourceKind::try_from(root.name.as_str()).map_err(|_| {
            DomainError::validation(format!("unknown resource element `{}`", root.name))
        })?;
        let id = root
            .attribute("id")
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| DomainError::validation("resource document has no valid id"))?;
        let path = root
            .attribute("path")
            .ok_or_else(|| DomainError::validation("resource document has no path"))?;
        let version = root
            .attribute("version")
            .and_then(|v| Version::try_from(v).ok())
            .ok_or_else(|| DomainError::validation("resource document has no valid version"))?;

        let body = match kind {
            ResourceKind::Page => {
                let body = root
                    .child("body")
                    .map(PageBody::from_xml)
                    .transpose()?
                    .unwrap_or_default();
                ResourceBody::Page(body)
            }
            ResourceKind::File | ResourceKind::Image => {
                let content = root
                    .child("content")
                    .ok_or_else(|| DomainError::validation("binary resource without content"))?;
                ResourceBody::Binary(BinaryContent {
                    filename: content.attribute("filename").unwrap_or_default().to_string(),
                    mimetype: content
                        .attribute("mimetype")
                        .unwrap_or("application/octet-stream")
                        .to_string(),
                    digest: content.attribute("digest").unwrap_or_default().to_string(),
                    size: content
                        .attribute("size")
                        .and_then(|size| size.parse().ok())
                        .unwrap_or(0),
                })
            }
        };

        let mut resource = Resource {
            uri: ResourceUri::new(site, path, id, version),
            kind,
            resource_type: root.child_text("type").map(str::to_string),
            template: root.child_text("template").map(str::to_string),
            subjects: root
                .children_named("subject")
                .map(|subject| subject.text.trim().to_string())
                .collect(),
            created: root
                .child("created")
                .map(CreationContext::from_xml)
                .transpose()?
                .ok_or_else(|| DomainError::validation("resource without a created block"))?,
            modified: root
                .child("modified")
                .map(ModificationContext::from_xml)
                .transpose()?
                .ok_or_else(|| DomainError::validation("resource without a modified block"))?,
            published: root
                .child("published")
                .map(PublishingContext::from_xml)
                .transpose()?
                .unwrap_or_default(),
            lock_owner: None,
            body,
        };
        if let Some(locked) = root.child("locked") {
            let owner = locked
                .child("user")
                .map(User::from_xml)
                .transpose()?
                .ok_or_else(|| DomainError::validation("locked block without a user"))?;
            resource.lock_owner = Some(owner);
        }
        Ok(resource)
    }
}
