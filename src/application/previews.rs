//! Resource previews.
//!
//! A preview is a rendered snapshot of a resource that editors can inspect
//! without hitting the public site. Regeneration after a publish runs as an
//! unsupervised background task: failures are logged and never retried or
//! surfaced to the publisher.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::render;
use crate::application::repos::ContentRepository;
use crate::domain::resource::{Resource, ResourceBody, Version};

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("previews are only generated for page resources")]
    UnsupportedKind,
    #[error(transparent)]
    Repo(#[from] crate::application::repos::RepoError),
}

#[derive(Debug, Clone)]
pub struct Preview {
    pub html: String,
    pub generated: OffsetDateTime,
}

pub struct PreviewService {
    repository: Arc<dyn ContentRepository>,
    store: DashMap<(String, Uuid, Version), Preview>,
}

impl PreviewService {
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self {
            repository,
            store: DashMap::new(),
        }
    }

    pub fn get(&self, site: &str, id: Uuid, version: Version) -> Option<Preview> {
        self.store
            .get(&(site.to_string(), id, version))
            .map(|entry| entry.value().clone())
    }

    /// Stored preview, or a freshly generated one when the resource exists
    /// but has not been previewed yet. `Ok(None)` means the resource itself
    /// is gone.
    pub async fn get_or_generate(
        &self,
        site: &str,
        id: Uuid,
        version: Version,
    ) -> Result<Option<Preview>, PreviewError> {
        if let Some(preview) = self.get(site, id, version) {
            return Ok(Some(preview));
        }
        let Some(resource) = self.repository.get(site, id, version).await? else {
            return Ok(None);
        };
        self.generate(&resource).map(Some)
    }

    /// Generate and store a preview synchronously.
    pub fn generate(&self, resource: &Resource) -> Result<Preview, PreviewError> {
        let ResourceBody::Page(_) = resource.body() else {
            return Err(PreviewError::UnsupportedKind);
        };
        let preview = Preview {
            html: render::render_page(resource),
            generated: OffsetDateTime::now_utc(),
        };
        let uri = resource.uri();
        self.store.insert(
            (uri.site.clone(), uri.id, uri.version),
            preview.clone(),
        );
        debug!(%uri, "preview generated");
        Ok(preview)
    }

    /// Fire-and-forget regeneration after a publish. The spawned task is
    /// not supervised; a failure leaves the previous preview in place.
    pub fn regenerate(self: &Arc<Self>, resource: Resource) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = service.generate(&resource) {
                warn!(
                    uri = %resource.uri(),
                    error = %err,
                    "preview regeneration failed"
                );
            }
        });
    }

    /// Drop stored previews of a resource, e.g. after deletion.
    pub fn evict(&self, site: &str, id: Uuid) {
        self.store
            .retain(|(s, stored_id, _), _| !(s == site && *stored_id == id));
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::page::PageBody;
    use crate::domain::resource::ResourceUri;
    use crate::infra::repository::FsContentRepository;

    use super::*;

    fn service() -> PreviewService {
        PreviewService::new(Arc::new(FsContentRepository::in_memory()))
    }

    fn page(path: &str) -> Resource {
        let mut body = PageBody::new();
        body.set_title("Preview me");
        Resource::new_page(
            ResourceUri::new("main", path, Uuid::new_v4(), Version::Live),
            None,
            body,
        )
    }

    #[test]
    fn generate_stores_a_preview_per_version() {
        let service = service();
        let page = page("/a");
        service.generate(&page).expect("generate");

        assert!(service.get("main", page.id(), Version::Live).is_some());
        assert!(service.get("main", page.id(), Version::Work).is_none());
    }

    #[test]
    fn binary_resources_are_not_previewed() {
        let service = service();
        let resource = Resource::new_binary(
            ResourceUri::new("main", "/f", Uuid::new_v4(), Version::Work),
            crate::domain::resource::ResourceKind::File,
            None,
            crate::domain::resource::BinaryContent {
                filename: "f.bin".into(),
                mimetype: "application/octet-stream".into(),
                digest: String::new(),
                size: 0,
            },
        );
        assert!(matches!(
            service.generate(&resource),
            Err(PreviewError::UnsupportedKind)
        ));
    }

    #[tokio::test]
    async fn get_or_generate_renders_on_demand() {
        let repository = Arc::new(FsContentRepository::in_memory());
        let service = PreviewService::new(repository.clone());

        let created = repository
            .create(page("/on-demand"))
            .await
            .expect("create");

        let preview = service
            .get_or_generate("main", created.id(), Version::Work)
            .await
            .expect("lookup")
            .expect("preview");
        assert!(preview.html.contains("Preview me"));

        let missing = service
            .get_or_generate("main", Uuid::new_v4(), Version::Work)
            .await
            .expect("lookup");
        assert!(missing.is_none());
    }

    #[test]
    fn evict_removes_all_versions() {
        let service = service();
        let page = page("/a");
        service.generate(&page).expect("generate");
        service.evict("main", page.id());
        assert!(service.get("main", page.id(), Version::Live).is_none());
    }
}
