//! Tag index over cache entries.
//!
//! Maps tag name → tag value → entry keys so that invalidation can address
//! entries without scanning the whole store. The wildcard value participates
//! on both sides of a lookup: an entry tagged `language=*` is found by any
//! `language` lookup, and a lookup for `language=*` finds every entry with a
//! `language` tag.

use std::collections::{HashMap, HashSet};

use super::tag::{CacheTag, CacheTagSet, TagValue};

#[derive(Debug, Default)]
pub struct TagIndex {
    map: HashMap<String, HashMap<TagValue, HashSet<String>>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, key: &str, tags: &CacheTagSet) {
        for tag in tags {
            self.map
                .entry(tag.name().to_string())
                .or_default()
                .entry(tag.value().clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    pub fn remove_entry(&mut self, key: &str, tags: &CacheTagSet) {
        for tag in tags {
            let Some(values) = self.map.get_mut(tag.name()) else {
                continue;
            };
            if let Some(keys) = values.get_mut(tag.value()) {
                keys.remove(key);
                if keys.is_empty() {
                    values.remove(tag.value());
                }
            }
            if values.is_empty() {
                self.map.remove(tag.name());
            }
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Keys of entries carrying a tag matching `tag`.
    fn lookup_one(&self, tag: &CacheTag) -> HashSet<String> {
        let mut result = HashSet::new();
        let Some(values) = self.map.get(tag.name()) else {
            return result;
        };
        match tag.value() {
            TagValue::Any => {
                for keys in values.values() {
                    result.extend(keys.iter().cloned());
                }
            }
            value => {
                if let Some(keys) = values.get(value) {
                    result.extend(keys.iter().cloned());
                }
                if let Some(keys) = values.get(&TagValue::Any) {
                    result.extend(keys.iter().cloned());
                }
            }
        }
        result
    }

    /// Keys of entries matching ALL of the given tags (exact invalidation).
    pub fn lookup_all(&self, tags: &[CacheTag]) -> HashSet<String> {
        let mut tags = tags.iter();
        let Some(first) = tags.next() else {
            return HashSet::new();
        };
        let mut result = self.lookup_one(first);
        for tag in tags {
            if result.is_empty() {
                break;
            }
            let matches = self.lookup_one(tag);
            result.retain(|key| matches.contains(key));
        }
        result
    }

    /// Keys of entries matching ANY of the given tags (partial invalidation).
    pub fn lookup_any(&self, tags: &[CacheTag]) -> HashSet<String> {
        let mut result = HashSet::new();
        for tag in tags {
            result.extend(self.lookup_one(tag));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::tag::names;

    use super::*;

    fn tag_set(pairs: &[(&str, &str)]) -> CacheTagSet {
        let mut tags = CacheTagSet::new();
        for (name, value) in pairs {
            tags.add_value(*name, *value);
        }
        tags
    }

    fn sample_index() -> TagIndex {
        let mut index = TagIndex::new();
        index.add_entry("a", &tag_set(&[(names::URL, "/a"), (names::SITE, "main")]));
        index.add_entry("b", &tag_set(&[(names::URL, "/b"), (names::SITE, "main")]));
        index.add_entry(
            "c",
            &tag_set(&[(names::URL, "/a"), (names::SITE, "other")]),
        );
        index
    }

    #[test]
    fn lookup_all_intersects() {
        let index = sample_index();
        let keys = index.lookup_all(&[
            CacheTag::new(names::URL, "/a"),
            CacheTag::new(names::SITE, "main"),
        ]);
        assert_eq!(keys, HashSet::from([String::from("a")]));
    }

    #[test]
    fn lookup_any_unions() {
        let index = sample_index();
        let keys = index.lookup_any(&[
            CacheTag::new(names::URL, "/a"),
            CacheTag::new(names::SITE, "main"),
        ]);
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn wildcard_lookup_matches_every_value() {
        let index = sample_index();
        let keys = index.lookup_all(&[CacheTag::any(names::URL)]);
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn wildcard_entry_is_found_by_concrete_lookup() {
        let mut index = sample_index();
        let mut tags = CacheTagSet::new();
        tags.add(CacheTag::any(names::LANGUAGE));
        index.add_entry("wild", &tags);

        let keys = index.lookup_all(&[CacheTag::new(names::LANGUAGE, "en")]);
        assert_eq!(keys, HashSet::from([String::from("wild")]));
    }

    #[test]
    fn removed_entries_disappear_from_lookups() {
        let mut index = sample_index();
        index.remove_entry("a", &tag_set(&[(names::URL, "/a"), (names::SITE, "main")]));
        let keys = index.lookup_all(&[CacheTag::new(names::URL, "/a")]);
        assert_eq!(keys, HashSet::from([String::from("c")]));
    }

    #[test]
    fn empty_tag_list_matches_nothing() {
        let index = sample_index();
        assert!(index.lookup_all(&[]).is_empty());
        assert!(index.lookup_any(&[]).is_empty());
    }
}
