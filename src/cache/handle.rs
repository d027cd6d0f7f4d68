//! Cache handles: what a caller presents to start a cached response.

use std::time::Duration;

use time::OffsetDateTime;

use super::tag::CacheTagSet;

/// Lifetimes shorter than this are meaningless for a response cache.
pub const MIN_LIFETIME: Duration = Duration::from_secs(1);

/// Identifies a cached object: a stable key derived from the tag set plus
/// the lifetimes and content freshness the producer vouches for.
#[derive(Debug, Clone)]
pub struct CacheHandle {
    key: String,
    tags: CacheTagSet,
    expiration_time: Duration,
    revalidation_time: Duration,
    modification_date: OffsetDateTime,
}

impl CacheHandle {
    /// Create a handle for the given tag set.
    ///
    /// `expiration_time` is how long the cached output stays fresh;
    /// `revalidation_time` is how long a stale entry may still be served
    /// after a successful source check. Both are clamped to at least one
    /// second.
    pub fn new(tags: CacheTagSet, expiration_time: Duration, revalidation_time: Duration) -> Self {
        Self {
            key: tags.entry_key(),
            tags,
            expiration_time: expiration_time.max(MIN_LIFETIME),
            revalidation_time: revalidation_time.max(MIN_LIFETIME),
            modification_date: OffsetDateTime::UNIX_EPOCH,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn tags(&self) -> &CacheTagSet {
        &self.tags
    }

    pub fn expiration_time(&self) -> Duration {
        self.expiration_time
    }

    pub fn revalidation_time(&self) -> Duration {
        self.revalidation_time
    }

    /// Content modification date; only ever moves forward.
    pub fn set_modification_date(&mut self, date: OffsetDateTime) -> OffsetDateTime {
        if date > self.modification_date {
            self.modification_date = date;
        }
        self.modification_date
    }

    pub fn modification_date(&self) -> OffsetDateTime {
        self.modification_date
    }
}

impl PartialEq for CacheHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for CacheHandle {}

impl std::hash::Hash for CacheHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl std::fmt::Display for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::cache::tag::names;

    use super::*;

    fn tags(url: &str) -> CacheTagSet {
        let mut tags = CacheTagSet::new();
        tags.add_value(names::URL, url);
        tags.add_value(names::SITE, "main");
        tags
    }

    #[test]
    fn handles_with_equal_tag_sets_are_equal() {
        let a = CacheHandle::new(tags("/a"), Duration::from_secs(60), Duration::from_secs(10));
        let b = CacheHandle::new(tags("/a"), Duration::from_secs(120), Duration::from_secs(20));
        assert_eq!(a, b);
        assert_ne!(
            a,
            CacheHandle::new(tags("/b"), Duration::from_secs(60), Duration::from_secs(10))
        );
    }

    #[test]
    fn lifetimes_are_clamped_to_a_second() {
        let handle = CacheHandle::new(tags("/a"), Duration::ZERO, Duration::from_millis(5));
        assert_eq!(handle.expiration_time(), MIN_LIFETIME);
        assert_eq!(handle.revalidation_time(), MIN_LIFETIME);
    }

    #[test]
    fn modification_date_only_moves_forward() {
        let mut handle = CacheHandle::new(
            tags("/a"),
            Duration::from_secs(60),
            Duration::from_secs(10),
        );
        let newer = datetime!(2026-01-07 10:00:00 UTC);
        let older = datetime!(2026-01-01 10:00:00 UTC);
        assert_eq!(handle.set_modification_date(newer), newer);
        assert_eq!(handle.set_modification_date(older), newer);
    }
}
