//! Page lifecycle orchestration behind the REST surface.
//!
//! Translates authenticated REST calls into repository operations, enforces
//! role requirements, and keeps the response cache and previews in step with
//! every successful mutation.

use std::sync::Arc;

use pressroom_api_types::{PageWriteRequest, PublishRequest};
use tracing::debug;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::previews::PreviewService;
use crate::application::repos::{ContentRepository, PublishWindow, RepoError};
use crate::cache::{CacheTag, ResponseCache, tag_names};
use crate::domain::page::{PageBody, Pagelet};
use crate::domain::resource::{Resource, ResourceUri, Version};
use crate::domain::security::{Principal, Role};
use crate::search::{SearchQuery, SearchResult};

pub struct PageService {
    repository: Arc<dyn ContentRepository>,
    cache: Arc<ResponseCache>,
    previews: Arc<PreviewService>,
}

impl PageService {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        cache: Arc<ResponseCache>,
        previews: Arc<PreviewService>,
    ) -> Self {
        Self {
            repository,
            cache,
            previews,
        }
    }

    pub async fn find(&self, query: &SearchQuery) -> Result<SearchResult, AppError> {
        Ok(self.repository.find(query).await?)
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

    /// Either version, preferring WORK: what an editor sees by default.
    pub async fn get_any(&self, site: &str, id: Uuid) -> Result<Resource, AppError> {
        if let Some(work) = self.repository.get(site, id, Version::Work).await? {
            return Ok(work);
        }
        self.repository
            .get(site, id, Version::Live)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn create(
        &self,
        site: &str,
        principal: &Principal,
        request: PageWriteRequest,
    ) -> Result<Resource, AppError> {
        require_role(principal, Role::Editor)?;
        let uri = ResourceUri::new(site, request.path.clone(), Uuid::new_v4(), Version::Work);
        let mut page = Resource::new_page(
            uri,
            Some(principal.user().clone()),
            body_from_request(&request),
        );
        apply_metadata(&mut page, &request);
        let created = self.repository.create(page).await?;
        self.invalidate_rendered(&created);
        Ok(created)
    }

    pub async fn update(
        &self,
        site: &str,
        principal: &Principal,
        id: Uuid,
        if_match: &str,
        request: PageWriteRequest,
    ) -> Result<Resource, AppError> {
        require_role(principal, Role::Editor)?;
        let current = self.get_any(site, id).await?;
        let uri = ResourceUri::new(site, request.path.clone(), id, Version::Work);
        let mut page = Resource::new_page(
            uri,
            current.created().creator().cloned(),
            body_from_request(&request),
        );
        page.created_mut()
            .set_created(current.created().creator().cloned(), current.created().date());
        apply_metadata(&mut page, &request);
        let updated = self
            .repository
            .update(page, principal.user(), if_match)
            .await?;
        self.invalidate_rendered(&updated);
        Ok(updated)
    }

    pub async fn delete(
        &self,
        site: &str,
        principal: &Principal,
        id: Uuid,
        if_match: &str,
    ) -> Result<(), AppError> {
        require_role(principal, Role::Editor)?;
        let current = self.get_any(site, id).await?;
        self.repository
            .delete(site, id, principal.user(), if_match)
            .await?;
        self.invalidate_rendered(&current);
        Ok(())
    }

    pub async fn lock(
        &self,
        site: &str,
        principal: &Principal,
        id: Uuid,
    ) -> Result<Resource, AppError> {
        require_role(principal, Role::Editor)?;
        match self.repository.lock(site, id, principal.user()).await {
            Ok(resource) => Ok(resource),
            // Site admins may take over a foreign lock.
            Err(RepoError::LockedByOther { .. }) if principal.has_role(Role::SiteAdmin) => {
                self.repository
                    .unlock(site, id, principal.user(), true)
                    .await?;
                Ok(self.repository.lock(site, id, principal.user()).await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn unlock(
        &self,
        site: &str,
        principal: &Principal,
        id: Uuid,
    ) -> Result<Resource, AppError> {
        require_role(principal, Role::Editor)?;
        let force = principal.has_role(Role::SiteAdmin);
        Ok(self
            .repository
            .unlock(site, id, principal.user(), force)
            .await?)
    }

    pub async fn publish(
        &self,
        site: &str,
        principal: &Principal,
        id: Uuid,
        if_match: &str,
        request: PublishRequest,
    ) -> Result<Resource, AppError> {
        require_role(principal, Role::Publisher)?;
        let window = PublishWindow {
            from: request.from,
            to: request.to,
        };
        let live = self
            .repository
            .publish(site, id, window, principal.user(), if_match)
            .await?;
        self.invalidate_rendered(&live);
        self.previews.regenerate(live.clone());
        Ok(live)
    }

    pub async fn unpublish(
        &self,
        site: &str,
        principal: &Principal,
        id: Uuid,
        if_match: &str,
    ) -> Result<Resource, AppError> {
        require_role(principal, Role::Publisher)?;
        let work = self
            .repository
            .unpublish(site, id, principal.user(), if_match)
            .await?;
        self.invalidate_rendered(&work);
        Ok(work)
    }

    /// Drop every cached response that embeds this resource's output. The
    /// partial match on the url tag also catches composite responses
    /// (feeds, listings) tagged with several urls, and the feed paths are
    /// always refreshed since any publication change reorders them.
    fn invalidate_rendered(&self, resource: &Resource) {
        let removed = self.cache.invalidate(
            &[
                CacheTag::new(tag_names::URL, resource.uri().path.clone()),
                CacheTag::new(tag_names::URL, "/feeds/rss"),
                CacheTag::new(tag_names::URL, "/feeds/atom"),
            ],
            true,
        );
        if removed > 0 {
            debug!(
                path = %resource.uri().path,
                removed,
                "invalidated cached responses after mutation"
            );
        }
    }
}

fn require_role(principal: &Principal, role: Role) -> Result<(), AppError> {
    if principal.has_role(role) {
        return Ok(());
    }
    if principal.is_anonymous() {
        return Err(AppError::Unauthorized);
    }
    Err(AppError::forbidden(format!(
        "operation requires the {} role",
        role.as_str()
    )))
}

fn body_from_request(request: &PageWriteRequest) -> PageBody {
    let mut body = PageBody::new();
    if let Some(title) = &request.title {
        body.set_title(title.clone());
    }
    for composer_view in &request.composers {
        let composer = body.composer_mut(&composer_view.id);
        for pagelet_view in &composer_view.pagelets {
            let mut pagelet = Pagelet::new(&pagelet_view.module, &pagelet_view.id);
            for (name, value) in &pagelet_view.properties {
                pagelet.set_property(name, value);
            }
            for (name, value) in &pagelet_view.elements {
                pagelet.set_element(name, value);
            }
            composer.add(pagelet);
        }
    }
    body
}

fn apply_metadata(page: &mut Resource, request: &PageWriteRequest) {
    if let Some(resource_type) = &request.resource_type {
        page.set_resource_type(resource_type.clone());
    }
    if let Some(template) = &request.template {
        page.set_template(template.clone());
    }
    for subject in &request.subjects {
        page.add_subject(subject.clone());
    }
}
