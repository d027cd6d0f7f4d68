//! Fluent search query construction.
//!
//! A `SearchQuery` accumulates predicates through chained `with_*` calls and
//! is handed to the content repository for execution. Construction is
//! validated through an explicit builder state: opening a date range moves
//! the builder into [`BuilderState::AwaitingRangeEnd`], and the only legal
//! next call is [`SearchQuery::and`]. Misuse is a programming error and
//! panics at the offending call rather than producing a malformed query.

use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::page::STAGE_COMPOSER;
use crate::domain::resource::{ResourceKind, Version};
use crate::domain::user::User;

/// Per-field sort relation. Multiple fields may carry an order at the same
/// time; combining them deterministically is the repository's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    Ascending,
    Descending,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Created,
    Modified,
    Published,
}

impl DateField {
    fn as_str(self) -> &'static str {
        match self {
            DateField::Created => "creation",
            DateField::Modified => "modification",
            DateField::Published => "publishing",
        }
    }
}

/// Explicit builder state replacing the original's untyped expectation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BuilderState {
    #[default]
    Idle,
    AwaitingRangeEnd(DateField),
}

/// A pagelet-shaped predicate: the resource must contain a pagelet of this
/// module/id, optionally constrained to a composer, a position, properties
/// and elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageletPredicate {
    pub module: String,
    pub id: String,
    pub properties: BTreeMap<String, String>,
    pub elements: BTreeMap<String, String>,
    pub composer: Option<String>,
    pub position: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    site: String,

    state: BuilderState,
    pagelet_open: bool,

    ids: Vec<Uuid>,
    path: Option<String>,
    path_prefix: Option<String>,
    kinds: Vec<ResourceKind>,
    types: Vec<String>,
    without_types: Vec<String>,
    template: Option<String>,
    subjects: Vec<String>,
    filename: Option<String>,
    mimetype: Option<String>,
    text: Option<String>,

    creator: Option<User>,
    modifier: Option<User>,
    publisher: Option<User>,
    lock_owner: Option<User>,

    created_from: Option<OffsetDateTime>,
    created_to: Option<OffsetDateTime>,
    modified_from: Option<OffsetDateTime>,
    modified_to: Option<OffsetDateTime>,
    published_from: Option<OffsetDateTime>,
    published_to: Option<OffsetDateTime>,

    pagelets: Vec<PageletPredicate>,
    properties: BTreeMap<String, String>,

    version: Option<Version>,
    preferred_version: Option<Version>,

    offset: usize,
    limit: i64,

    created_order: Order,
    modified_order: Order,
    published_order: Order,
}

impl SearchQuery {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            state: BuilderState::Idle,
            pagelet_open: false,
            ids: Vec::new(),
            path: None,
            path_prefix: None,
            kinds: Vec::new(),
            types: Vec::new(),
            without_types: Vec::new(),
            template: None,
            subjects: Vec::new(),
            filename: None,
            mimetype: None,
            text: None,
            creator: None,
            modifier: None,
            publisher: None,
            lock_owner: None,
            created_from: None,
            created_to: None,
            modified_from: None,
            modified_to: None,
            published_from: None,
            published_to: None,
            pagelets: Vec::new(),
            properties: BTreeMap::new(),
            version: None,
            preferred_version: None,
            offset: 0,
            limit: -1,
            created_order: Order::None,
            modified_order: Order::None,
            published_order: Order::None,
        }
    }

    // ------------------------------------------------------------------
    // Builder state bookkeeping
    // ------------------------------------------------------------------

    /// Called by every plain mutator: a pending range expectation at this
    /// point means the caller forgot the closing `and`, which is a bug.
    #[track_caller]
    fn clear_expectations(&mut self) {
        if let BuilderState::AwaitingRangeEnd(field) = self.state {
            panic!(
                "malformed query: {} date range is still waiting for its end date",
                field.as_str()
            );
        }
        self.pagelet_open = false;
    }

    #[track_caller]
    fn open_range(&mut self, field: DateField) {
        self.clear_expectations();
        self.state = BuilderState::AwaitingRangeEnd(field);
    }

    #[track_caller]
    fn current_pagelet(&mut self) -> &mut PageletPredicate {
        if !self.pagelet_open {
            panic!("malformed query: no pagelet is being configured at this point");
        }
        self.pagelets
            .last_mut()
            .expect("pagelet scope open implies a pagelet")
    }

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    pub fn with_identifier(mut self, id: Uuid) -> Self {
        self.clear_expectations();
        self.ids.push(id);
        self
    }

    /// # Panics
    ///
    /// Panics when `path` is empty.
    #[track_caller]
    pub fn with_path(mut self, path: &str) -> Self {
        self.clear_expectations();
        if path.trim().is_empty() {
            panic!("malformed query: path cannot be empty");
        }
        self.path = Some(crate::domain::resource::normalize_path(path.to_string()));
        self
    }

    #[track_caller]
    pub fn with_path_prefix(mut self, prefix: &str) -> Self {
        self.clear_expectations();
        if prefix.trim().is_empty() {
            panic!("malformed query: path prefix cannot be empty");
        }
        self.path_prefix = Some(crate::domain::resource::normalize_path(prefix.to_string()));
        self
    }

    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.clear_expectations();
        self.kinds.push(kind);
        self
    }

    pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
        self.clear_expectations();
        self.types.push(resource_type.into());
        self
    }

    pub fn without_type(mut self, resource_type: impl Into<String>) -> Self {
        self.clear_expectations();
        self.without_types.push(resource_type.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.clear_expectations();
        self.template = Some(template.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.clear_expectations();
        self.subjects.push(subject.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.clear_expectations();
        self.filename = Some(filename.into());
        self
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.clear_expectations();
        self.mimetype = Some(mimetype.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.clear_expectations();
        self.text = Some(text.into());
        self
    }

    /// Match a pagelet property on any pagelet of the resource.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.clear_expectations();
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_creator(mut self, creator: User) -> Self {
        self.clear_expectations();
        self.creator = Some(creator);
        self
    }

    pub fn with_modifier(mut self, modifier: User) -> Self {
        self.clear_expectations();
        self.modifier = Some(modifier);
        self
    }

    pub fn with_publisher(mut self, publisher: User) -> Self {
        self.clear_expectations();
        self.publisher = Some(publisher);
        self
    }

    pub fn with_lock_owner(mut self, owner: User) -> Self {
        self.clear_expectations();
        self.lock_owner = Some(owner);
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.clear_expectations();
        self.version = Some(version);
        self
    }

    /// Prefer one version per resource in the result set, falling back to
    /// whichever other version exists.
    pub fn with_preferred_version(mut self, version: Version) -> Self {
        self.clear_expectations();
        self.preferred_version = Some(version);
        self
    }

    // ------------------------------------------------------------------
    // Date predicates
    // ------------------------------------------------------------------

    pub fn with_creation_date(mut self, date: OffsetDateTime) -> Self {
        self.clear_expectations();
        self.created_from = Some(date);
        self.created_to = Some(date);
        self
    }

    /// Open a creation date range; must be closed with [`Self::and`].
    #[track_caller]
    pub fn with_creation_date_between(mut self, start: OffsetDateTime) -> Self {
        self.open_range(DateField::Created);
        self.created_from = Some(start);
        self.created_to = None;
        self
    }

    pub fn with_modification_date(mut self, date: OffsetDateTime) -> Self {
        self.clear_expectations();
        self.modified_from = Some(date);
        self.modified_to = Some(date);
        self
    }

    /// Open a modification date range; must be closed with [`Self::and`].
    #[track_caller]
    pub fn with_modification_date_between(mut self, start: OffsetDateTime) -> Self {
        self.open_range(DateField::Modified);
        self.modified_from = Some(start);
        self.modified_to = None;
        self
    }

    pub fn with_publishing_date(mut self, date: OffsetDateTime) -> Self {
        self.clear_expectations();
        self.published_from = Some(date);
        self.published_to = Some(date);
        self
    }

    /// Open a publishing date range; must be closed with [`Self::and`].
    #[track_caller]
    pub fn with_publishing_date_between(mut self, start: OffsetDateTime) -> Self {
        self.open_range(DateField::Published);
        self.published_from = Some(start);
        self.published_to = None;
        self
    }

    /// Close the pending date range.
    ///
    /// # Panics
    ///
    /// Panics when no range is pending, or when `end` is not strictly after
    /// the start date of the pending range.
    #[track_caller]
    pub fn and(mut self, end: OffsetDateTime) -> Self {
        let BuilderState::AwaitingRangeEnd(field) = self.state else {
            panic!("malformed query: no date range is waiting for an end date");
        };
        let start = match field {
            DateField::Created => self.created_from,
            DateField::Modified => self.modified_from,
            DateField::Published => self.published_from,
        }
        .expect("open range implies a start date");
        if end <= start {
            panic!("malformed query: end date must be after start date");
        }
        match field {
            DateField::Created => self.created_to = Some(end),
            DateField::Modified => self.modified_to = Some(end),
            DateField::Published => self.published_to = Some(end),
        }
        self.state = BuilderState::Idle;
        self.pagelet_open = false;
        self
    }

    // ------------------------------------------------------------------
    // Pagelet scope
    // ------------------------------------------------------------------

    /// Require a pagelet of the given module/id. Subsequent `and_property`,
    /// `and_element`, `at_position` and `in_composer` calls refine this
    /// pagelet until the next non-refining mutator.
    pub fn with_pagelet(mut self, module: impl Into<String>, id: impl Into<String>) -> Self {
        self.clear_expectations();
        self.pagelets.push(PageletPredicate {
            module: module.into(),
            id: id.into(),
            ..PageletPredicate::default()
        });
        self.pagelet_open = true;
        self
    }

    /// # Panics
    ///
    /// Panics when no pagelet is being configured.
    #[track_caller]
    pub fn and_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.current_pagelet()
            .properties
            .insert(name.into(), value.into());
        self
    }

    /// # Panics
    ///
    /// Panics when no pagelet is being configured.
    #[track_caller]
    pub fn and_element(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.current_pagelet()
            .elements
            .insert(name.into(), value.into());
        self
    }

    /// # Panics
    ///
    /// Panics when no pagelet is being configured.
    #[track_caller]
    pub fn at_position(mut self, position: usize) -> Self {
        self.current_pagelet().position = Some(position);
        self
    }

    /// # Panics
    ///
    /// Panics when no pagelet is being configured.
    #[track_caller]
    pub fn in_composer(mut self, composer: impl Into<String>) -> Self {
        self.current_pagelet().composer = Some(composer.into());
        self
    }

    /// # Panics
    ///
    /// Panics when no pagelet is being configured.
    #[track_caller]
    pub fn in_stage(self) -> Self {
        self.in_composer(STAGE_COMPOSER)
    }

    // ------------------------------------------------------------------
    // Paging and sorting
    // ------------------------------------------------------------------

    /// Negative offsets are clamped to zero.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.clear_expectations();
        self.offset = offset.max(0) as usize;
        self
    }

    /// A negative limit means unlimited.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.clear_expectations();
        self.limit = limit;
        self
    }

    pub fn sort_by_creation_date(mut self, order: Order) -> Self {
        self.clear_expectations();
        self.created_order = order;
        self
    }

    pub fn sort_by_modification_date(mut self, order: Order) -> Self {
        self.clear_expectations();
        self.modified_order = order;
        self
    }

    pub fn sort_by_publishing_date(mut self, order: Order) -> Self {
        self.clear_expectations();
        self.published_order = order;
        self
    }

    // ------------------------------------------------------------------
    // Read access for query execution
    // ------------------------------------------------------------------

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.ids
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn path_prefix(&self) -> Option<&str> {
        self.path_prefix.as_deref()
    }

    pub fn kinds(&self) -> &[ResourceKind] {
        &self.kinds
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn without_types(&self) -> &[String] {
        &self.without_types
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn mimetype(&self) -> Option<&str> {
        self.mimetype.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn creator(&self) -> Option<&User> {
        self.creator.as_ref()
    }

    pub fn modifier(&self) -> Option<&User> {
        self.modifier.as_ref()
    }

    pub fn publisher(&self) -> Option<&User> {
        self.publisher.as_ref()
    }

    pub fn lock_owner(&self) -> Option<&User> {
        self.lock_owner.as_ref()
    }

    pub fn created_range(&self) -> (Option<OffsetDateTime>, Option<OffsetDateTime>) {
        (self.created_from, self.created_to)
    }

    pub fn modified_range(&self) -> (Option<OffsetDateTime>, Option<OffsetDateTime>) {
        (self.modified_from, self.modified_to)
    }

    pub fn published_range(&self) -> (Option<OffsetDateTime>, Option<OffsetDateTime>) {
        (self.published_from, self.published_to)
    }

    pub fn pagelets(&self) -> &[PageletPredicate] {
        &self.pagelets
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn preferred_version(&self) -> Option<Version> {
        self.preferred_version
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// `None` means unlimited.
    pub fn limit(&self) -> Option<usize> {
        (self.limit >= 0).then_some(self.limit as usize)
    }

    pub fn creation_date_order(&self) -> Order {
        self.created_order
    }

    pub fn modification_date_order(&self) -> Order {
        self.modified_order
    }

    pub fn publishing_date_order(&self) -> Order {
        self.published_order
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn valid_date_range_is_accepted() {
        let query = SearchQuery::new("main")
            .with_creation_date_between(datetime!(2026-01-01 00:00:00 UTC))
            .and(datetime!(2026-02-01 00:00:00 UTC));
        assert_eq!(
            query.created_range(),
            (
                Some(datetime!(2026-01-01 00:00:00 UTC)),
                Some(datetime!(2026-02-01 00:00:00 UTC))
            )
        );
    }

    #[test]
    #[should_panic(expected = "end date must be after start date")]
    fn inverted_date_range_panics() {
        let _ = SearchQuery::new("main")
            .with_modification_date_between(datetime!(2026-02-01 00:00:00 UTC))
            .and(datetime!(2026-01-01 00:00:00 UTC));
    }

    #[test]
    #[should_panic(expected = "end date must be after start date")]
    fn empty_date_range_panics() {
        let start = datetime!(2026-01-01 00:00:00 UTC);
        let _ = SearchQuery::new("main")
            .with_publishing_date_between(start)
            .and(start);
    }

    #[test]
    #[should_panic(expected = "waiting for its end date")]
    fn mutator_while_range_is_pending_panics() {
        let _ = SearchQuery::new("main")
            .with_creation_date_between(datetime!(2026-01-01 00:00:00 UTC))
            .with_text("hello");
    }

    #[test]
    #[should_panic(expected = "no date range is waiting")]
    fn stray_and_panics() {
        let _ = SearchQuery::new("main").and(datetime!(2026-01-01 00:00:00 UTC));
    }

    #[test]
    fn pagelet_scope_collects_refinements() {
        let query = SearchQuery::new("main")
            .with_pagelet("text", "paragraph")
            .and_property("resourceid", "abc")
            .and_element("title", "Hello")
            .in_stage()
            .at_position(2);

        let predicate = &query.pagelets()[0];
        assert_eq!(predicate.module, "text");
        assert_eq!(predicate.properties.get("resourceid").map(String::as_str), Some("abc"));
        assert_eq!(predicate.composer.as_deref(), Some(STAGE_COMPOSER));
        assert_eq!(predicate.position, Some(2));
    }

    #[test]
    #[should_panic(expected = "no pagelet is being configured")]
    fn pagelet_refinement_without_scope_panics() {
        let _ = SearchQuery::new("main").and_property("resourceid", "abc");
    }

    #[test]
    #[should_panic(expected = "no pagelet is being configured")]
    fn pagelet_scope_closes_after_other_mutators() {
        let _ = SearchQuery::new("main")
            .with_pagelet("text", "paragraph")
            .with_text("hello")
            .and_element("title", "Hello");
    }

    #[test]
    fn offset_is_clamped_and_negative_limit_is_unlimited() {
        let query = SearchQuery::new("main").with_offset(-5).with_limit(-1);
        assert_eq!(query.offset(), 0);
        assert_eq!(query.limit(), None);

        let query = SearchQuery::new("main").with_limit(10);
        assert_eq!(query.limit(), Some(10));
    }

    #[test]
    fn sort_orders_are_independent() {
        let query = SearchQuery::new("main")
            .sort_by_creation_date(Order::Ascending)
            .sort_by_publishing_date(Order::Descending);
        assert_eq!(query.creation_date_order(), Order::Ascending);
        assert_eq!(query.modification_date_order(), Order::None);
        assert_eq!(query.publishing_date_order(), Order::Descending);
    }
}
