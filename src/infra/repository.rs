//! File-backed content repository.
//!
//! Resources live in memory for lookup and search; every version slot is
//! mirrored as an XML document under the data directory
//! (`<data>/<site>/<id>/<version>.xml`) and reloaded on startup. The
//! repository is the single enforcement point for the resource state
//! machine: entity-tag preconditions, lock ownership, publish validation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::repos::{
    ContentRepository, PublishWindow, RepoError, etag_matches,
};
use crate::domain::page::PROPERTY_RESOURCE_ID;
use crate::domain::resource::{Resource, ResourceBody, Version, normalize_path};
use crate::domain::user::User;
use crate::search::{Order, PageletPredicate, SearchHit, SearchQuery, SearchResult};

type SlotKey = (String, Uuid, Version);

#[derive(Default)]
struct RepoState {
    resources: HashMap<SlotKey, Resource>,
    /// `(site, path)` → resource id; paths are unique per site across both
    /// version slots.
    paths: HashMap<(String, String), Uuid>,
}

pub struct FsContentRepository {
    data_dir: Option<PathBuf>,
    state: RwLock<RepoState>,
}

impl FsContentRepository {
    /// A purely in-memory repository, used by tests and ephemeral setups.
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            state: RwLock::new(RepoState::default()),
        }
    }

    /// Open a repository rooted at `data_dir`, loading every stored
    /// resource document.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, RepoError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(RepoError::from_persistence)?;

        let mut state = RepoState::default();
        let mut loaded = 0usize;
        let mut sites = read_dir_names(&data_dir).await?;
        sites.sort();
        for site in sites {
            let site_dir = data_dir.join(&site);
            for id_name in read_dir_names(&site_dir).await? {
                let Ok(id) = Uuid::parse_str(&id_name) else {
                    warn!(site = %site, entry = %id_name, "skipping non-resource directory");
                    continue;
                };
                for version in [Version::Work, Version::Live] {
                    let file = site_dir.join(&id_name).join(version_file(version));
                    let document = match tokio::fs::read_to_string(&file).await {
                        Ok(document) => document,
                        Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                        Err(err) => return Err(RepoError::from_persistence(err)),
                    };
                    match Resource::from_xml(&site, &document) {
                        Ok(resource) => {
                            state
                                .paths
                                .insert((site.clone(), resource.uri().path.clone()), id);
                            state.resources.insert((site.clone(), id, version), resource);
                            loaded += 1;
                        }
                        Err(err) => {
                            warn!(
                                site = %site,
                                %id,
                                version = version.as_str(),
                                error = %err,
                                "skipping unreadable resource document"
                            );
                        }
                    }
                }
            }
        }
        info!(resources = loaded, dir = %data_dir.display(), "content repository loaded");
        Ok(Self {
            data_dir: Some(data_dir),
            state: RwLock::new(state),
        })
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, RepoState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, RepoState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn resource_file(&self, site: &str, id: Uuid, version: Version) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(site).join(id.to_string()).join(version_file(version)))
    }

    /// Mirror a version slot to disk; failures are surfaced to the caller.
    async fn persist(&self, resource: &Resource) -> Result<(), RepoError> {
        let uri = resource.uri();
        let Some(file) = self.resource_file(&uri.site, uri.id, uri.version) else {
            return Ok(());
        };
        let parent = file.parent().expect("resource file has a parent");
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(RepoError::from_persistence)?;
        let tmp = file.with_extension("xml.tmp");
        tokio::fs::write(&tmp, resource.to_xml())
            .await
            .map_err(RepoError::from_persistence)?;
        tokio::fs::rename(&tmp, &file)
            .await
            .map_err(RepoError::from_persistence)?;
        debug!(file = %file.display(), "resource document written");
        Ok(())
    }

    async fn remove_file(&self, site: &str, id: Uuid, version: Version) {
        if let Some(file) = self.resource_file(site, id, version)
            && let Err(err) = tokio::fs::remove_file(&file).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!(file = %file.display(), error = %err, "failed to remove resource document");
        }
    }

    /// The slot mutations validate against: WORK when present, LIVE
    /// otherwise.
    fn current_slot(state: &RepoState, site: &str, id: Uuid) -> Option<(Version, Resource)> {
        for version in [Version::Work, Version::Live] {
            if let Some(resource) = state.resources.get(&(site.to_string(), id, version)) {
                return Some((version, resource.clone()));
            }
        }
        None
    }
}

fn version_file(version: Version) -> &'static str {
    match version {
        Version::Work => "work.xml",
        Version::Live => "live.xml",
    }
}

async fn read_dir_names(dir: &Path) -> Result<Vec<String>, RepoError> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(err) => return Err(RepoError::from_persistence(err)),
    };
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(RepoError::from_persistence)?
    {
        let file_type = entry.file_type().await.map_err(RepoError::from_persistence)?;
        if file_type.is_dir()
            && let Some(name) = entry.file_name().to_str()
        {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn ensure_unlocked_or_owned(resource: &Resource, user: &User) -> Result<(), RepoError> {
    match resource.lock_owner() {
        Some(owner) if owner != user => Err(RepoError::LockedByOther {
            owner: owner.clone(),
        }),
        _ => Ok(()),
    }
}

fn ensure_etag(resource: &Resource, if_match: &str) -> Result<(), RepoError> {
    if if_match.trim().is_empty() {
        return Err(RepoError::StaleEtag);
    }
    if !etag_matches(if_match, &resource.etag()) {
        return Err(RepoError::StaleEtag);
    }
    Ok(())
}

#[async_trait]
impl ContentRepository for FsContentRepository {
    async fn get(
        &self,
        site: &str,
        id: Uuid,
        version: Version,
    ) -> Result<Option<Resource>, RepoError> {
        let state = self.read_state();
        Ok(state.resources.get(&(site.to_string(), id, version)).cloned())
    }

    async fn get_by_path(
        &self,
        site: &str,
        path: &str,
        version: Version,
    ) -> Result<Option<Resource>, RepoError> {
        let path = normalize_path(path.to_string());
        let state = self.read_state();
        let Some(id) = state.paths.get(&(site.to_string(), path)) else {
            return Ok(None);
        };
        Ok(state.resources.get(&(site.to_string(), *id, version)).cloned())
    }

    async fn find(&self, query: &SearchQuery) -> Result<SearchResult, RepoError> {
        let state = self.read_state();
        Ok(execute_query(&state, query))
    }

    async fn create(&self, resource: Resource) -> Result<Resource, RepoError> {
        let created = {
            let mut state = self.write_state();
            let uri = resource.uri().clone();
            let path_key = (uri.site.clone(), uri.path.clone());
            if let Some(existing) = state.paths.get(&path_key)
                && *existing != uri.id
            {
                return Err(RepoError::PathTaken { path: uri.path });
            }
            if Self::current_slot(&state, &uri.site, uri.id).is_some() {
                return Err(RepoError::InvalidInput {
                    message: format!("resource {} already exists", uri.id),
                });
            }
            let mut resource = resource;
            resource.set_version(Version::Work);
            state.paths.insert(path_key, uri.id);
            state
                .resources
                .insert((uri.site.clone(), uri.id, Version::Work), resource.clone());
            resource
        };
        self.persist(&created).await?;
        Ok(created)
    }

    async fn update(
        &self,
        resource: Resource,
        user: &User,
        if_match: &str,
    ) -> Result<Resource, RepoError> {
        let updated = {
            let mut state = self.write_state();
            let uri = resource.uri().clone();
            let key = (uri.site.clone(), uri.id, Version::Work);
            // A published resource without a draft gets its WORK slot
            // recreated by the next update; the entity tag is then checked
            // against the LIVE version.
            let (lock_owner, old_path) = {
                let Some((_, existing)) = Self::current_slot(&state, &uri.site, uri.id) else {
                    return Err(RepoError::NotFound);
                };
                ensure_etag(&existing, if_match)?;
                ensure_unlocked_or_owned(&existing, user)?;
                (existing.lock_owner().cloned(), existing.uri().path.clone())
            };

            if old_path != uri.path {
                let new_key = (uri.site.clone(), uri.path.clone());
                if let Some(other) = state.paths.get(&new_key)
                    && *other != uri.id
                {
                    return Err(RepoError::PathTaken { path: uri.path });
                }
                state.paths.remove(&(uri.site.clone(), old_path));
                state.paths.insert(new_key, uri.id);
            }

            let mut updated = resource;
            updated.set_version(Version::Work);
            // The lock travels with the slot, not with the uploaded document.
            updated.set_unlocked();
            if let Some(owner) = lock_owner {
                updated
                    .set_locked(&owner)
                    .expect("lock transfer onto an unlocked resource");
            }
            updated.touch(Some(user.clone()), OffsetDateTime::now_utc());
            state.resources.insert(key, updated.clone());
            updated
        };
        self.persist(&updated).await?;
        Ok(updated)
    }

    async fn delete(
        &self,
        site: &str,
        id: Uuid,
        user: &User,
        if_match: &str,
    ) -> Result<(), RepoError> {
        {
            let mut state = self.write_state();
            let Some((_, current)) = Self::current_slot(&state, site, id) else {
                return Err(RepoError::NotFound);
            };
            ensure_etag(&current, if_match)?;
            ensure_unlocked_or_owned(&current, user)?;

            state.paths.remove(&(site.to_string(), current.uri().path.clone()));
            state.resources.remove(&(site.to_string(), id, Version::Work));
            state.resources.remove(&(site.to_string(), id, Version::Live));
        }
        self.remove_file(site, id, Version::Work).await;
        self.remove_file(site, id, Version::Live).await;
        Ok(())
    }

    async fn lock(&self, site: &str, id: Uuid, user: &User) -> Result<Resource, RepoError> {
        let locked = {
            let mut state = self.write_state();
            let key = (site.to_string(), id, Version::Work);
            let Some(resource) = state.resources.get_mut(&key) else {
                return Err(RepoError::NotFound);
            };
            resource
                .set_locked(user)
                .map_err(|_| RepoError::LockedByOther {
                    owner: resource.lock_owner().cloned().expect("conflict implies owner"),
                })?;
            resource.clone()
        };
        self.persist(&locked).await?;
        Ok(locked)
    }

    async fn unlock(
        &self,
        site: &str,
        id: Uuid,
        user: &User,
        force: bool,
    ) -> Result<Resource, RepoError> {
        let unlocked = {
            let mut state = self.write_state();
            let key = (site.to_string(), id, Version::Work);
            let Some(resource) = state.resources.get_mut(&key) else {
                return Err(RepoError::NotFound);
            };
            if !force {
                ensure_unlocked_or_owned(resource, user)?;
            }
            let previous = resource.set_unlocked();
            if let Some(previous) = previous {
                debug!(%id, owner = %previous, "lock released");
            }
            resource.clone()
        };
        self.persist(&unlocked).await?;
        Ok(unlocked)
    }

    async fn publish(
        &self,
        site: &str,
        id: Uuid,
        window: PublishWindow,
        user: &User,
        if_match: &str,
    ) -> Result<Resource, RepoError> {
        let published = {
            let mut state = self.write_state();
            let work_key = (site.to_string(), id, Version::Work);
            let Some(work) = state.resources.get(&work_key) else {
                return Err(RepoError::NoWorkVersion);
            };
            ensure_etag(work, if_match)?;
            ensure_unlocked_or_owned(work, user)?;

            // Every pagelet `resourceid` property must point at a resource
            // with a LIVE version before the draft may go live itself.
            let dangling = dangling_references(&state, site, work);
            if !dangling.is_empty() {
                return Err(RepoError::DanglingReferences { ids: dangling });
            }

            let mut live = state.resources.remove(&work_key).expect("work slot present");
            live.set_version(Version::Live);
            live.set_unlocked();
            live.published_mut()
                .set_published(
                    user.clone(),
                    Some(window.from.unwrap_or_else(OffsetDateTime::now_utc)),
                    window.to,
                )
                .map_err(|err| RepoError::invalid_input(err.to_string()))?;
            live.touch(Some(user.clone()), OffsetDateTime::now_utc());
            state
                .resources
                .insert((site.to_string(), id, Version::Live), live.clone());
            live
        };
        self.remove_file(site, id, Version::Work).await;
        self.persist(&published).await?;
        Ok(published)
    }

    async fn unpublish(
        &self,
        site: &str,
        id: Uuid,
        user: &User,
        if_match: &str,
    ) -> Result<Resource, RepoError> {
        let work = {
            let mut state = self.write_state();
            let live_key = (site.to_string(), id, Version::Live);
            let Some(live) = state.resources.get(&live_key) else {
                return Err(RepoError::NotFound);
            };
            ensure_etag(live, if_match)?;

            let live = state.resources.remove(&live_key).expect("live slot present");
            let work_key = (site.to_string(), id, Version::Work);
            if let Some(existing_work) = state.resources.get(&work_key) {
                existing_work.clone()
            } else {
                // No draft around anymore: the unpublished content becomes
                // the new draft, stripped of its publication.
                let mut work = live;
                work.set_version(Version::Work);
                work.published_mut().clear();
                work.touch(Some(user.clone()), OffsetDateTime::now_utc());
                state.resources.insert(work_key, work.clone());
                work
            }
        };
        self.remove_file(site, id, Version::Live).await;
        self.persist(&work).await?;
        Ok(work)
    }

    async fn export(&self) -> Result<Vec<Resource>, RepoError> {
        let state = self.read_state();
        let mut resources: Vec<Resource> = state.resources.values().cloned().collect();
        resources.sort_by(|a, b| {
            (a.uri().site.as_str(), a.uri().path.as_str(), a.version().as_str()).cmp(&(
                b.uri().site.as_str(),
                b.uri().path.as_str(),
                b.version().as_str(),
            ))
        });
        Ok(resources)
    }

    async fn import(&self, resource: Resource) -> Result<(), RepoError> {
        {
            let mut state = self.write_state();
            let uri = resource.uri().clone();
            state.paths.insert((uri.site.clone(), uri.path.clone()), uri.id);
            state
                .resources
                .insert((uri.site, uri.id, resource.version()), resource.clone());
        }
        self.persist(&resource).await
    }
}

/// Collect pagelet `resourceid` references that do not resolve to a LIVE
/// resource.
fn dangling_references(state: &RepoState, site: &str, resource: &Resource) -> Vec<String> {
    let ResourceBody::Page(body) = resource.body() else {
        return Vec::new();
    };
    let mut dangling = Vec::new();
    for pagelet in body.pagelets() {
        let Some(reference) = pagelet.property(PROPERTY_RESOURCE_ID) else {
            continue;
        };
        let resolved = Uuid::parse_str(reference).ok().is_some_and(|target| {
            state
                .resources
                .contains_key(&(site.to_string(), target, Version::Live))
        });
        if !resolved && !dangling.contains(&reference.to_string()) {
            dangling.push(reference.to_string());
        }
    }
    dangling
}

// ----------------------------------------------------------------------
// Query execution
// ----------------------------------------------------------------------

fn execute_query(state: &RepoState, query: &SearchQuery) -> SearchResult {
    let mut matches: Vec<&Resource> = state
        .resources
        .iter()
        .filter(|((site, _, version), _)| {
            site == query.site()
                && query.version().is_none_or(|wanted| *version == wanted)
        })
        .map(|(_, resource)| resource)
        .filter(|resource| matches_query(resource, query))
        .collect();

    // Without a version predicate a resource may appear once per slot; a
    // preferred version collapses that to one hit per resource.
    if query.version().is_none()
        && let Some(preferred) = query.preferred_version()
    {
        let mut by_id: HashMap<Uuid, &Resource> = HashMap::new();
        for resource in matches {
            by_id
                .entry(resource.id())
                .and_modify(|current| {
                    if resource.version() == preferred {
                        *current = resource;
                    }
                })
                .or_insert(resource);
        }
        matches = by_id.into_values().collect();
    }

    sort_matches(&mut matches, query);

    let hit_count = matches.len();
    let offset = query.offset();
    let windowed: Vec<&Resource> = matches
        .into_iter()
        .skip(offset)
        .take(query.limit().unwrap_or(usize::MAX))
        .collect();

    SearchResult {
        hit_count,
        offset,
        limit: query.limit(),
        hits: windowed
            .into_iter()
            .enumerate()
            .map(|(index, resource)| SearchHit {
                resource: resource.clone(),
                rank: offset + index,
            })
            .collect(),
    }
}

fn matches_query(resource: &Resource, query: &SearchQuery) -> bool {
    if !query.ids().is_empty() && !query.ids().contains(&resource.id()) {
        return false;
    }
    if let Some(path) = query.path()
        && resource.uri().path != path
    {
        return false;
    }
    if let Some(prefix) = query.path_prefix()
        && !resource.uri().path.starts_with(prefix)
    {
        return false;
    }
    if !query.kinds().is_empty() && !query.kinds().contains(&resource.kind()) {
        return false;
    }
    if !query.types().is_empty() {
        match resource.resource_type() {
            Some(t) if query.types().iter().any(|wanted| wanted == t) => {}
            _ => return false,
        }
    }
    if let Some(t) = resource.resource_type()
        && query.without_types().iter().any(|blocked| blocked == t)
    {
        return false;
    }
    if let Some(template) = query.template()
        && resource.template() != Some(template)
    {
        return false;
    }
    for subject in query.subjects() {
        if !resource.subjects().iter().any(|s| s == subject) {
            return false;
        }
    }
    if let Some(filename) = query.filename() {
        match resource.binary_content() {
            Some(content) if content.filename == filename => {}
            _ => return false,
        }
    }
    if let Some(mimetype) = query.mimetype() {
        match resource.binary_content() {
            Some(content) if content.mimetype == mimetype => {}
            _ => return false,
        }
    }
    if let Some(creator) = query.creator()
        && resource.created().creator() != Some(creator)
    {
        return false;
    }
    if let Some(modifier) = query.modifier()
        && resource.modified().modifier() != Some(modifier)
    {
        return false;
    }
    if let Some(publisher) = query.publisher()
        && resource.published().publisher() != Some(publisher)
    {
        return false;
    }
    if let Some(owner) = query.lock_owner()
        && resource.lock_owner() != Some(owner)
    {
        return false;
    }
    if !date_in_range(Some(resource.created().date()), query.created_range()) {
        return false;
    }
    if !date_in_range(Some(resource.modified().date()), query.modified_range()) {
        return false;
    }
    let published_range = query.published_range();
    if (published_range.0.is_some() || published_range.1.is_some())
        && !date_in_range(resource.published().publish_from(), published_range)
    {
        return false;
    }
    for (name, value) in query.properties() {
        let found = resource.page_body().is_some_and(|body| {
            body.pagelets()
                .any(|pagelet| pagelet.property(name) == Some(value.as_str()))
        });
        if !found {
            return false;
        }
    }
    for predicate in query.pagelets() {
        if !matches_pagelet_predicate(resource, predicate) {
            return false;
        }
    }
    if let Some(text) = query.text()
        && !matches_text(resource, text)
    {
        return false;
    }
    true
}

fn date_in_range(
    date: Option<OffsetDateTime>,
    (from, to): (Option<OffsetDateTime>, Option<OffsetDateTime>),
) -> bool {
    if from.is_none() && to.is_none() {
        return true;
    }
    let Some(date) = date else {
        return false;
    };
    from.is_none_or(|from| date >= from) && to.is_none_or(|to| date <= to)
}

fn matches_pagelet_predicate(resource: &Resource, predicate: &PageletPredicate) -> bool {
    let Some(body) = resource.page_body() else {
        return false;
    };
    body.composers().iter().any(|composer| {
        if predicate
            .composer
            .as_ref()
            .is_some_and(|wanted| composer.name() != wanted)
        {
            return false;
        }
        composer.pagelets().iter().enumerate().any(|(position, pagelet)| {
            pagelet.module() == predicate.module
                && pagelet.id() == predicate.id
                && predicate.position.is_none_or(|wanted| position == wanted)
                && predicate
                    .properties
                    .iter()
                    .all(|(name, value)| pagelet.property(name) == Some(value.as_str()))
                && predicate
                    .elements
                    .iter()
                    .all(|(name, value)| pagelet.element(name) == Some(value.as_str()))
        })
    })
}

fn matches_text(resource: &Resource, text: &str) -> bool {
    let needle = text.to_lowercase();
    if resource.uri().path.to_lowercase().contains(&needle) {
        return true;
    }
    if resource
        .subjects()
        .iter()
        .any(|subject| subject.to_lowercase().contains(&needle))
    {
        return true;
    }
    match resource.body() {
        ResourceBody::Page(body) => {
            if body
                .title()
                .is_some_and(|title| title.to_lowercase().contains(&needle))
            {
                return true;
            }
            body.pagelets().any(|pagelet| {
                pagelet
                    .elements()
                    .any(|(_, value)| value.to_lowercase().contains(&needle))
            })
        }
        ResourceBody::Binary(content) => content.filename.to_lowercase().contains(&needle),
    }
}

fn sort_matches(matches: &mut [&Resource], query: &SearchQuery) {
    use std::cmp::Ordering;

    let orders = [
        (query.creation_date_order(), DateAccessor::Created),
        (query.modification_date_order(), DateAccessor::Modified),
        (query.publishing_date_order(), DateAccessor::Published),
    ];

    matches.sort_by(|a, b| {
        for (order, accessor) in &orders {
            if *order == Order::None {
                continue;
            }
            let left = accessor.get(a);
            let right = accessor.get(b);
            let relation = match order {
                Order::Ascending => left.cmp(&right),
                Order::Descending => right.cmp(&left),
                Order::None => Ordering::Equal,
            };
            if relation != Ordering::Equal {
                return relation;
            }
        }
        a.uri().path.cmp(&b.uri().path)
    });
}

enum DateAccessor {
    Created,
    Modified,
    Published,
}

impl DateAccessor {
    fn get(&self, resource: &Resource) -> Option<OffsetDateTime> {
        match self {
            DateAccessor::Created => Some(resource.created().date()),
            DateAccessor::Modified => Some(resource.modified().date()),
            DateAccessor::Published => resource.published().publish_from(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::page::{PageBody, Pagelet};
    use crate::domain::resource::ResourceUri;
    use crate::search::SearchQuery;

    use super::*;

    fn page_at(path: &str, creator: &User) -> Resource {
        let uri = ResourceUri::new("main", path, Uuid::new_v4(), Version::Work);
        let mut body = PageBody::new();
        body.set_title(path.trim_start_matches('/'));
        let mut pagelet = Pagelet::new("text", "paragraph");
        pagelet.set_element("body", format!("content of {path}"));
        body.stage_mut().add(pagelet);
        let mut page = Resource::new_page(uri, Some(creator.clone()), body);
        page.set_template("default");
        page
    }

    fn editor() -> User {
        User::new("jdoe")
    }

    #[tokio::test]
    async fn create_then_find_by_path_and_version() {
        let repo = FsContentRepository::in_memory();
        let user = editor();
        repo.create(page_at("/a/b", &user)).await.expect("create");

        let query = SearchQuery::new("main")
            .with_path("/a/b")
            .with_version(Version::Work)
            .with_limit(10)
            .with_offset(0);
        let result = repo.find(&query).await.expect("find");
        assert_eq!(result.hit_count, 1);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].resource.uri().path, "/a/b");
    }

    #[tokio::test]
    async fn create_rejects_a_taken_path() {
        let repo = FsContentRepository::in_memory();
        let user = editor();
        repo.create(page_at("/a/b", &user)).await.expect("create");
        let err = repo.create(page_at("/a/b", &user)).await.unwrap_err();
        assert!(matches!(err, RepoError::PathTaken { .. }));
    }

    #[tokio::test]
    async fn update_requires_a_fresh_etag() {
        let repo = FsContentRepository::in_memory();
        let user = editor();
        let created = repo.create(page_at("/a", &user)).await.expect("create");

        let err = repo
            .update(created.clone(), &user, "W/\"12345\"")
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::StaleEtag));

        let etag = created.etag();
        repo.update(created, &user, &etag).await.expect("update");
    }

    #[tokio::test]
    async fn update_is_rejected_while_locked_by_another_user() {
        let repo = FsContentRepository::in_memory();
        let user = editor();
        let created = repo.create(page_at("/a", &user)).await.expect("create");
        repo.lock("main", created.id(), &User::new("other"))
            .await
            .expect("lock");

        let locked = repo
            .get("main", created.id(), Version::Work)
            .await
            .expect("get")
            .expect("resource");
        let err = repo
            .update(locked.clone(), &user, &locked.etag())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::LockedByOther { .. }));
    }

    #[tokio::test]
    async fn lock_is_idempotent_but_exclusive() {
        let repo = FsContentRepository::in_memory();
        let user = editor();
        let created = repo.create(page_at("/a", &user)).await.expect("create");

        repo.lock("main", created.id(), &user).await.expect("lock");
        repo.lock("main", created.id(), &user)
            .await
            .expect("same user re-lock");
        let err = repo
            .lock("main", created.id(), &User::new("other"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::LockedByOther { .. }));

        // A foreign lock can only be broken with force.
        let err = repo
            .unlock("main", created.id(), &User::new("other"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::LockedByOther { .. }));
        repo.unlock("main", created.id(), &User::new("other"), true)
            .await
            .expect("forced unlock");
    }

    #[tokio::test]
    async fn publish_moves_work_to_live_and_clears_the_lock() {
        let repo = FsContentRepository::in_memory();
        let user = editor();
        let created = repo.create(page_at("/a", &user)).await.expect("create");
        repo.lock("main", created.id(), &user).await.expect("lock");

        let work = repo
            .get("main", created.id(), Version::Work)
            .await
            .expect("get")
            .expect("work");
        let live = repo
            .publish("main", created.id(), PublishWindow::default(), &user, &work.etag())
            .await
            .expect("publish");

        assert_eq!(live.version(), Version::Live);
        assert!(!live.is_locked());
        assert!(live.published().is_published_now());
        assert!(
            repo.get("main", created.id(), Version::Work)
                .await
                .expect("get")
                .is_none()
        );
    }

    #[tokio::test]
    async fn publish_rejects_dangling_resource_references() {
        let repo = FsContentRepository::in_memory();
        let user = editor();

        let mut page = page_at("/a", &user);
        if let ResourceBody::Page(body) = page.body_mut() {
            let mut link = Pagelet::new("content", "teaser");
            link.set_property(PROPERTY_RESOURCE_ID, Uuid::new_v4().to_string());
            body.stage_mut().add(link);
        }
        let created = repo.create(page).await.expect("create");

        let err = repo
            .publish(
                "main",
                created.id(),
                PublishWindow::default(),
                &user,
                &created.etag(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::DanglingReferences { .. }));
    }

    #[tokio::test]
    async fn publish_accepts_references_to_live_resources() {
        let repo = FsContentRepository::in_memory();
        let user = editor();

        let target = repo.create(page_at("/target", &user)).await.expect("create");
        repo.publish(
            "main",
            target.id(),
            PublishWindow::default(),
            &user,
            &target.etag(),
        )
        .await
        .expect("publish target");

        let mut page = page_at("/a", &user);
        if let ResourceBody::Page(body) = page.body_mut() {
            let mut link = Pagelet::new("content", "teaser");
            link.set_property(PROPERTY_RESOURCE_ID, target.id().to_string());
            body.stage_mut().add(link);
        }
        let created = repo.create(page).await.expect("create");
        repo.publish(
            "main",
            created.id(),
            PublishWindow::default(),
            &user,
            &created.etag(),
        )
        .await
        .expect("publish");
    }

    #[tokio::test]
    async fn updating_a_published_page_recreates_the_draft() {
        let repo = FsContentRepository::in_memory();
        let user = editor();
        let created = repo.create(page_at("/a", &user)).await.expect("create");
        let live = repo
            .publish(
                "main",
                created.id(),
                PublishWindow::default(),
                &user,
                &created.etag(),
            )
            .await
            .expect("publish");
        assert!(
            repo.get("main", created.id(), Version::Work)
                .await
                .expect("get")
                .is_none()
        );

        // The incoming document carries the existing identifier; the etag
        // check runs against the LIVE version.
        let mut draft = live.clone();
        draft.set_version(Version::Work);
        let updated = repo
            .update(draft, &user, &live.etag())
            .await
            .expect("update");
        assert_eq!(updated.version(), Version::Work);
        assert!(
            repo.get("main", created.id(), Version::Live)
                .await
                .expect("get")
                .is_some()
        );
    }

    #[tokio::test]
    async fn unpublish_recreates_a_work_copy_without_publication() {
        let repo = FsContentRepository::in_memory();
        let user = editor();
        let created = repo.create(page_at("/a", &user)).await.expect("create");
        let live = repo
            .publish(
                "main",
                created.id(),
                PublishWindow::default(),
                &user,
                &created.etag(),
            )
            .await
            .expect("publish");

        let work = repo
            .unpublish("main", created.id(), &user, &live.etag())
            .await
            .expect("unpublish");

        assert_eq!(work.version(), Version::Work);
        assert!(work.published().publisher().is_none());
        assert!(
            repo.get("main", created.id(), Version::Live)
                .await
                .expect("get")
                .is_none()
        );
        // Content survived the round trip through LIVE.
        assert_eq!(work.page_body(), created.page_body());
    }

    #[tokio::test]
    async fn preferred_version_collapses_duplicate_hits() {
        let repo = FsContentRepository::in_memory();
        let user = editor();
        let created = repo.create(page_at("/a", &user)).await.expect("create");
        repo.publish(
            "main",
            created.id(),
            PublishWindow::default(),
            &user,
            &created.etag(),
        )
        .await
        .expect("publish");
        // Put a fresh draft next to the published copy so both slots exist.
        let live = repo
            .get("main", created.id(), Version::Live)
            .await
            .expect("get")
            .expect("live");
        let mut draft = live.clone();
        draft.set_version(Version::Work);
        repo.import(draft).await.expect("import draft");

        // Without a version predicate both slots are hits.
        let query = SearchQuery::new("main").with_path("/a");
        let result = repo.find(&query).await.expect("find");
        assert_eq!(result.hit_count, 2);

        // A preferred version collapses them to one resource.
        let query = SearchQuery::new("main")
            .with_path("/a")
            .with_preferred_version(Version::Live);
        let result = repo.find(&query).await.expect("find");
        assert_eq!(result.hit_count, 1);
        assert_eq!(result.hits[0].resource.version(), Version::Live);
    }

    #[tokio::test]
    async fn search_matches_pagelet_predicates_and_text() {
        let repo = FsContentRepository::in_memory();
        let user = editor();

        let mut page = page_at("/tagged", &user);
        if let ResourceBody::Page(body) = page.body_mut() {
            let mut pagelet = Pagelet::new("news", "teaser");
            pagelet.set_property("category", "sports");
            pagelet.set_element("headline", "Match report");
            body.composer_mut("sidebar").add(pagelet);
        }
        repo.create(page).await.expect("create");
        repo.create(page_at("/other", &user)).await.expect("create");

        let query = SearchQuery::new("main")
            .with_pagelet("news", "teaser")
            .and_property("category", "sports")
            .in_composer("sidebar");
        let result = repo.find(&query).await.expect("find");
        assert_eq!(result.hit_count, 1);
        assert_eq!(result.hits[0].resource.uri().path, "/tagged");

        let query = SearchQuery::new("main").with_text("match report");
        let result = repo.find(&query).await.expect("find");
        assert_eq!(result.hit_count, 1);
    }

    #[tokio::test]
    async fn documents_survive_a_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let user = editor();
        let id;
        {
            let repo = FsContentRepository::open(dir.path()).await.expect("open");
            let created = repo.create(page_at("/a/b", &user)).await.expect("create");
            id = created.id();
            repo.publish(
                "main",
                id,
                PublishWindow::default(),
                &user,
                &created.etag(),
            )
            .await
            .expect("publish");
        }

        let reopened = FsContentRepository::open(dir.path()).await.expect("reopen");
        let live = reopened
            .get("main", id, Version::Live)
            .await
            .expect("get")
            .expect("live resource");
        assert_eq!(live.uri().path, "/a/b");
        assert!(live.published().publisher().is_some());
        assert!(
            reopened
                .get("main", id, Version::Work)
                .await
                .expect("get")
                .is_none()
        );
    }
}
