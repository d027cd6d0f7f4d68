//! Cache tags: the labels rendered output is indexed under.
//!
//! A response is cached under the set of tags that characterize it (url,
//! language, user, site, module, ...). Invalidation addresses entries through
//! these tags, either requiring all of them to match or any one of them.

use std::collections::BTreeSet;

/// Well-known tag names.
pub mod names {
    pub const URL: &str = "url";
    pub const LANGUAGE: &str = "language";
    pub const USER: &str = "user";
    pub const SITE: &str = "site";
    pub const MODULE: &str = "module";
    pub const ACTION: &str = "action";
    pub const PARAMETER: &str = "parameter";
    pub const COMPOSER: &str = "composer";
    pub const POSITION: &str = "position";
    pub const RENDERER: &str = "renderer";
}

/// A tag value; `Any` is the wildcard that matches every concrete value of
/// the same tag name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagValue {
    Any,
    Value(String),
}

impl TagValue {
    pub fn as_str(&self) -> &str {
        match self {
            TagValue::Any => "*",
            TagValue::Value(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheTag {
    name: String,
    value: TagValue,
}

impl CacheTag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: TagValue::Value(value.into()),
        }
    }

    /// A tag matching any value of `name`.
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: TagValue::Any,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &TagValue {
        &self.value
    }

    /// Whether this tag matches `other`, honoring the wildcard on either
    /// side.
    pub fn matches(&self, other: &CacheTag) -> bool {
        self.name == other.name
            && (self.value == TagValue::Any
                || other.value == TagValue::Any
                || self.value == other.value)
    }
}

impl std::fmt::Display for CacheTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.value.as_str())
    }
}

/// An ordered, duplicate-free set of cache tags.
///
/// The ordering makes the derived entry key stable: two responses described
/// by the same tags share one cache slot, regardless of tagging order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheTagSet {
    tags: BTreeSet<CacheTag>,
}

impl CacheTagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag; duplicate insertions are rejected.
    pub fn add(&mut self, tag: CacheTag) -> bool {
        self.tags.insert(tag)
    }

    pub fn add_value(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        self.add(CacheTag::new(name, value))
    }

    pub fn remove(&mut self, tag: &CacheTag) -> bool {
        self.tags.remove(tag)
    }

    pub fn contains(&self, tag: &CacheTag) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheTag> {
        self.tags.iter()
    }

    /// Stable cache key derived from the sorted tag set.
    pub fn entry_key(&self) -> String {
        let mut key = String::new();
        for tag in &self.tags {
            if !key.is_empty() {
                key.push(';');
            }
            key.push_str(&tag.to_string());
        }
        key
    }
}

impl FromIterator<CacheTag> for CacheTagSet {
    fn from_iter<T: IntoIterator<Item = CacheTag>>(iter: T) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CacheTagSet {
    type Item = &'a CacheTag;
    type IntoIter = std::collections::btree_set::Iter<'a, CacheTag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}
