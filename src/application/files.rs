//! File and image resource orchestration.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::ContentRepository;
use crate::cache::{CacheTag, ResponseCache, tag_names};
use crate::domain::resource::{
    BinaryContent, Resource, ResourceKind, ResourceUri, Version,
};
use crate::domain::security::{Principal, Role};
use crate::infra::content_store::ContentStore;

pub struct FileService {
    repository: Arc<dyn ContentRepository>,
    content: Arc<ContentStore>,
    cache: Arc<ResponseCache>,
}

impl FileService {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        content: Arc<ContentStore>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            repository,
            content,
            cache,
        }
    }

    /// Store an upload as a new file or image resource at `path`.
    pub async fn create(
        &self,
        site: &str,
        principal: &Principal,
        path: &str,
        filename: &str,
        bytes: Bytes,
    ) -> Result<Resource, AppError> {
        if !principal.has_role(Role::Editor) {
            return if principal.is_anonymous() {
                Err(AppError::Unauthorized)
            } else {
                Err(AppError::forbidden("uploads require the editor role"))
            };
        }
        if filename.trim().is_empty() {
            return Err(AppError::validation("filename cannot be empty"));
        }

        let mimetype = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string();
        let kind = if mimetype.starts_with("image/") {
            ResourceKind::Image
        } else {
            ResourceKind::File
        };
        let size = bytes.len() as u64;
        let digest = self.content.store(bytes).await?;

        let uri = ResourceUri::new(site, path, Uuid::new_v4(), Version::Work);
        let resource = Resource::new_binary(
            uri,
            kind,
            Some(principal.user().clone()),
            BinaryContent {
                filename: filename.to_string(),
                mimetype,
                digest,
                size,
            },
        );
        let created = self.repository.create(resource).await?;
        debug!(uri = %created.uri(), size, "binary resource stored");
        Ok(created)
    }

    pub fn repository(&self) -> &Arc<dyn ContentRepository> {
        &self.repository
    }

    pub async fn get(
        &self,
        site: &str,
        id: Uuid,
        version: Version,
    ) -> Result<Resource, AppError> {
        self.repository
            .get(site, id, version)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// The stored bytes of a binary resource version.
    pub async fn content(&self, resource: &Resource) -> Result<Bytes, AppError> {
        let content = resource.binary_content().ok_or_else(|| {
            AppError::validation("resource does not carry binary content")
        })?;
        self.content
            .get(&content.digest)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn delete(
        &self,
        site: &str,
        principal: &Principal,
        id: Uuid,
        if_match: &str,
    ) -> Result<(), AppError> {
        if !principal.has_role(Role::Editor) {
            return if principal.is_anonymous() {
                Err(AppError::Unauthorized)
            } else {
                Err(AppError::forbidden("deletions require the editor role"))
            };
        }
        let current = self.get_any(site, id).await?;
        self.repository
            .delete(site, id, principal.user(), if_match)
            .await?;
        self.cache.invalidate(
            &[CacheTag::new(tag_names::URL, current.uri().path.clone())],
            true,
        );
        Ok(())
    }

    async fn get_any(&self, site: &str, id: Uuid) -> Result<Resource, AppError> {
        if let Some(work) = self.repository.get(site, id, Version::Work).await? {
            return Ok(work);
        }
        self.repository
            .get(site, id, Version::Live)
            .await?
            .ok_or(AppError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::CacheConfig;
    use crate::domain::user::User;
    use crate::infra::repository::FsContentRepository;

    use super::*;

    fn service() -> FileService {
        FileService::new(
            Arc::new(FsContentRepository::in_memory()),
            Arc::new(ContentStore::in_memory()),
            Arc::new(ResponseCache::new(&CacheConfig::default())),
        )
    }

    fn editor() -> Principal {
        Principal::new(User::new("jdoe"), &[Role::Editor])
    }

    #[tokio::test]
    async fn uploads_are_classified_by_mimetype() {
        let service = service();
        let principal = editor();

        let image = service
            .create(
                "main",
                &principal,
                "/media/logo",
                "logo.png",
                Bytes::from_static(b"not really a png"),
            )
            .await
            .expect("create image");
        assert_eq!(image.kind(), ResourceKind::Image);

        let file = service
            .create(
                "main",
                &principal,
                "/media/report",
                "report.pdf",
                Bytes::from_static(b"not really a pdf"),
            )
            .await
            .expect("create file");
        assert_eq!(file.kind(), ResourceKind::File);
        assert_eq!(
            file.binary_content().map(|c| c.mimetype.as_str()),
            Some("application/pdf")
        );
    }

    #[tokio::test]
    async fn content_round_trips_through_the_store() {
        let service = service();
        let created = service
            .create(
                "main",
                &editor(),
                "/media/data",
                "data.bin",
                Bytes::from_static(b"payload"),
            )
            .await
            .expect("create");
        let bytes = service.content(&created).await.expect("content");
        assert_eq!(&bytes[..], b"payload");
    }

    #[tokio::test]
    async fn anonymous_uploads_are_rejected() {
        let service = service();
        let err = service
            .create(
                "main",
                &Principal::anonymous(),
                "/media/x",
                "x.bin",
                Bytes::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}
