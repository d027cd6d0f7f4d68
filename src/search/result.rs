//! Search result sets.

use crate::domain::resource::Resource;

/// A single hit: the matching resource plus its absolute rank in the result
/// set (offset included).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub resource: Resource,
    pub rank: usize,
}

/// The outcome of executing a [`super::SearchQuery`].
///
/// `hit_count` is the number of matches before paging; `hits` carries the
/// requested window only.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub hit_count: usize,
    pub offset: usize,
    pub limit: Option<usize>,
    pub hits: Vec<SearchHit>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.hits.iter().map(|hit| &hit.resource)
    }
}
