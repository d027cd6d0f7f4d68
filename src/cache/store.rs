//! The tag-indexed response cache store.
//!
//! Entries are rendered responses or response parts, keyed by their tag set,
//! held in an LRU map and indexed by tag for invalidation. Entries form a
//! hierarchy: a full-page entry links the part entries whose bytes it
//! embeds. Removing an entry therefore also removes its parents (their
//! output contains it) and, when requested, its children.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use time::OffsetDateTime;
use tracing::debug;

use crate::util::dates::unix_millis;

use super::config::CacheConfig;
use super::handle::CacheHandle;
use super::index::TagIndex;
use super::lock::{rw_read, rw_write};
use super::tag::{CacheTag, CacheTagSet};
use super::writer::ResponseWriter;

const SOURCE: &str = "cache::store";

/// A finished cached response, ready to serve.
#[derive(Debug, Clone)]
pub struct CachedBody {
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub modified: OffsetDateTime,
}

impl CachedBody {
    /// Weak validator derived from the content modification date.
    pub fn etag(&self) -> String {
        format!("W/\"{}\"", unix_millis(self.modified))
    }
}

/// Outcome of [`ResponseCache::start_response`].
pub enum StartOutcome {
    /// The tag set is cached: serve these bytes, do not render.
    Hit(CachedBody),
    /// Not cached: render into the writer and finish it.
    Miss(ResponseWriter),
}

#[derive(Debug)]
struct CacheEntry {
    tags: CacheTagSet,
    headers: Vec<(String, String)>,
    body: Bytes,
    stored_at: OffsetDateTime,
    modified: OffsetDateTime,
    expiration: Duration,
    parents: HashSet<String>,
    children: HashSet<String>,
}

impl CacheEntry {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        now - self.stored_at <= self.expiration
    }

    fn cached_body(&self) -> CachedBody {
        CachedBody {
            headers: self.headers.clone(),
            body: self.body.clone(),
            modified: self.modified,
        }
    }
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    index: TagIndex,
}

pub struct ResponseCache {
    enabled: bool,
    state: RwLock<CacheState>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            state: RwLock::new(CacheState {
                entries: LruCache::new(config.entry_limit_non_zero()),
                index: TagIndex::new(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Begin a cacheable response for the given handle.
    ///
    /// On a hit the previously rendered bytes come back and the caller must
    /// not render again. On a miss the returned writer buffers the rendered
    /// output; finishing it commits the entry. With the cache disabled every
    /// call is a miss whose writer commits nothing.
    pub fn start_response(self: &Arc<Self>, handle: CacheHandle) -> StartOutcome {
        if !self.enabled {
            return StartOutcome::Miss(ResponseWriter::passthrough(handle));
        }
        match self.fetch(&handle) {
            Some(body) => {
                counter!("pressroom_cache_hit_total").increment(1);
                debug!(key = %handle, outcome = "hit", "serving cached response");
                StartOutcome::Hit(body)
            }
            None => {
                counter!("pressroom_cache_miss_total").increment(1);
                debug!(key = %handle, outcome = "miss", "rendering response");
                StartOutcome::Miss(ResponseWriter::new(Arc::clone(self), handle))
            }
        }
    }

    /// Look up a response part during rendering of an enclosing response.
    pub(super) fn fetch(&self, handle: &CacheHandle) -> Option<CachedBody> {
        let now = OffsetDateTime::now_utc();
        let mut state = rw_write(&self.state, SOURCE, "fetch");

        let entry = state.entries.get(handle.key())?;
        if entry.is_fresh(now) {
            return Some(entry.cached_body());
        }

        // Stale. The entry may only be reused after a source freshness check:
        // a caller that vouches for an unchanged source refreshes the entry,
        // anything else discards it.
        let source_date = handle.modification_date();
        if source_date != OffsetDateTime::UNIX_EPOCH && source_date <= entry.modified {
            counter!("pressroom_cache_revalidate_total").increment(1);
            let entry = state
                .entries
                .get_mut(handle.key())
                .expect("entry present above");
            entry.stored_at = now;
            return Some(entry.cached_body());
        }

        counter!("pressroom_cache_expire_total").increment(1);
        remove_entry(&mut state, handle.key(), false, &mut HashSet::new());
        None
    }

    /// Commit a rendered entry. Called by the response writer.
    pub(super) fn insert(
        &self,
        handle: &CacheHandle,
        headers: Vec<(String, String)>,
        body: Bytes,
        children: Vec<String>,
    ) {
        let now = OffsetDateTime::now_utc();
        let modified = if handle.modification_date() == OffsetDateTime::UNIX_EPOCH {
            now
        } else {
            handle.modification_date()
        };
        let entry = CacheEntry {
            tags: handle.tags().clone(),
            headers,
            body,
            stored_at: now,
            modified,
            expiration: handle.expiration_time(),
            parents: HashSet::new(),
            children: children.iter().cloned().collect(),
        };

        let mut state = rw_write(&self.state, SOURCE, "insert");
        for child in &children {
            if let Some(child_entry) = state.entries.peek_mut(child) {
                child_entry.parents.insert(handle.key().to_string());
            }
        }
        state.index.add_entry(handle.key(), &entry.tags);
        if let Some((evicted_key, evicted)) = state.entries.push(handle.key().to_string(), entry) {
            if evicted_key != handle.key() {
                counter!("pressroom_cache_evict_total").increment(1);
                state.index.remove_entry(&evicted_key, &evicted.tags);
                unlink_relationships(&mut state, &evicted_key, &evicted);
            }
        }
    }

    /// Remove entries by tag.
    ///
    /// `partial = false` removes only entries whose tag set matches ALL the
    /// given tags; `partial = true` removes entries matching ANY of them.
    pub fn invalidate(&self, tags: &[CacheTag], partial: bool) -> usize {
        let mut state = rw_write(&self.state, SOURCE, "invalidate");
        let keys = if partial {
            state.index.lookup_any(tags)
        } else {
            state.index.lookup_all(tags)
        };
        let mut removed = HashSet::new();
        for key in keys {
            remove_entry(&mut state, &key, true, &mut removed);
        }
        counter!("pressroom_cache_invalidate_total").increment(removed.len() as u64);
        removed.len()
    }

    /// Remove the entry behind a handle, cascading through the hierarchy.
    pub fn invalidate_handle(&self, handle: &CacheHandle) -> bool {
        let mut state = rw_write(&self.state, SOURCE, "invalidate_handle");
        let mut removed = HashSet::new();
        remove_entry(&mut state, handle.key(), true, &mut removed);
        !removed.is_empty()
    }

    pub fn clear(&self) {
        let mut state = rw_write(&self.state, SOURCE, "clear");
        state.entries.clear();
        state.index.clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.state, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Remove one entry, its parents (their bytes embed it) and, when
/// `with_children` is set, its children.
fn remove_entry(
    state: &mut CacheState,
    key: &str,
    with_children: bool,
    removed: &mut HashSet<String>,
) {
    if removed.contains(key) {
        return;
    }
    let Some(entry) = state.entries.pop(key) else {
        return;
    };
    removed.insert(key.to_string());
    state.index.remove_entry(key, &entry.tags);

    for parent in &entry.parents {
        remove_entry(state, parent, false, removed);
    }
    if with_children {
        for child in &entry.children {
            remove_entry(state, child, true, removed);
        }
    }
    unlink_relationships(state, key, &entry);
}

/// Drop back-references to a removed entry from surviving relatives.
fn unlink_relationships(state: &mut CacheState, key: &str, entry: &CacheEntry) {
    for parent in &entry.parents {
        if let Some(parent_entry) = state.entries.peek_mut(parent) {
            parent_entry.children.remove(key);
        }
    }
    for child in &entry.children {
        if let Some(child_entry) = state.entries.peek_mut(child) {
            child_entry.parents.remove(key);
        }
    }
}
