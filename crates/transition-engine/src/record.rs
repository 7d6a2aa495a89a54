//! Temporal snapshot of a single content record.
//!
//! A [`TemporalRecord`] carries everything the engine needs to know about one
//! time-controlled item: its identity, its origin table and its optional
//! visibility window. Records are built fresh from storage for each
//! computation and never mutated afterwards.
//!
//! The visibility window is half-open: `visible_from` is inclusive and
//! `visible_until` is exclusive. The two bounds are evaluated independently,
//! so a record whose `visible_until` precedes its `visible_from` is still a
//! valid input (it is simply never visible).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::transition::TransitionKind;

/// Storage table of page records.
pub const PAGES_TABLE: &str = "pages";
/// Storage table of content-element records.
pub const CONTENT_TABLE: &str = "tt_content";

// ── SourceKind ──────────────────────────────────────────────────────────────

/// The origin category of a record, keyed by its storage table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    /// A page (`pages`).
    Page,
    /// A content element placed on a page (`tt_content`).
    Content,
    /// Any other registered table.
    Custom(String),
}

impl SourceKind {
    /// The storage table this kind is read from.
    pub fn table_name(&self) -> &str {
        match self {
            SourceKind::Page => PAGES_TABLE,
            SourceKind::Content => CONTENT_TABLE,
            SourceKind::Custom(name) => name,
        }
    }

    /// Short category label used in reports (`"page"`, `"content"`, or the table name).
    pub fn category(&self) -> &str {
        match self {
            SourceKind::Page => "page",
            SourceKind::Content => "content",
            SourceKind::Custom(name) => name,
        }
    }
}

impl From<&str> for SourceKind {
    fn from(table: &str) -> Self {
        match table {
            PAGES_TABLE => SourceKind::Page,
            CONTENT_TABLE => SourceKind::Content,
            other => SourceKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for SourceKind {
    fn from(table: String) -> Self {
        SourceKind::from(table.as_str())
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.table_name().to_string()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

// ── TemporalRecord ──────────────────────────────────────────────────────────

/// Immutable snapshot of one content item's temporal attributes.
///
/// Instants serialize as Unix epoch seconds; an absent bound is `null` or
/// omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalRecord {
    /// Unique positive identifier within its table.
    #[serde(deserialize_with = "positive_id")]
    pub id: u64,
    /// Origin table.
    pub source_kind: SourceKind,
    /// Display name; carries no meaning for the engine.
    #[serde(default)]
    pub label: String,
    /// Identifier of the hierarchical parent (the page a record lives on).
    #[serde(default)]
    pub container_id: u64,
    /// Inclusive start of visibility. `None` means no lower bound.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub visible_from: Option<DateTime<Utc>>,
    /// Exclusive end of visibility. `None` means no upper bound.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub visible_until: Option<DateTime<Utc>>,
    /// Language of the record.
    #[serde(default)]
    pub locale_id: i64,
    /// Workspace / draft variant of the record.
    #[serde(default)]
    pub variant_id: i64,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

impl TemporalRecord {
    /// A visible, unbounded record with no container, locale or variant.
    pub fn new(id: u64, source_kind: SourceKind, label: impl Into<String>) -> Self {
        Self {
            id,
            source_kind,
            label: label.into(),
            container_id: 0,
            visible_from: None,
            visible_until: None,
            locale_id: 0,
            variant_id: 0,
            is_hidden: false,
            is_deleted: false,
        }
    }

    pub fn with_bounds(
        mut self,
        visible_from: Option<DateTime<Utc>>,
        visible_until: Option<DateTime<Utc>>,
    ) -> Self {
        self.visible_from = visible_from;
        self.visible_until = visible_until;
        self
    }

    pub fn with_container(mut self, container_id: u64) -> Self {
        self.container_id = container_id;
        self
    }

    pub fn with_locale(mut self, locale_id: i64, variant_id: i64) -> Self {
        self.locale_id = locale_id;
        self.variant_id = variant_id;
        self
    }

    pub fn with_flags(mut self, is_hidden: bool, is_deleted: bool) -> Self {
        self.is_hidden = is_hidden;
        self.is_deleted = is_deleted;
        self
    }

    // ── Transition calculator ───────────────────────────────────────────

    /// Whether the record is visible at `now`.
    ///
    /// Hidden or deleted records are never visible. Otherwise the record is
    /// visible iff `visible_from <= now < visible_until`, with an absent
    /// bound imposing no restriction.
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        if self.is_hidden || self.is_deleted {
            return false;
        }
        if self.visible_from.is_some_and(|from| now < from) {
            return false;
        }
        if self.visible_until.is_some_and(|until| now >= until) {
            return false;
        }
        true
    }

    /// Whether either visibility bound is set.
    pub fn has_temporal_bounds(&self) -> bool {
        self.visible_from.is_some() || self.visible_until.is_some()
    }

    /// The nearest bound strictly after `now`, if any.
    pub fn next_transition(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        [self.visible_from, self.visible_until]
            .into_iter()
            .flatten()
            .filter(|bound| *bound > now)
            .min()
    }

    /// Classify `instant` as the start or end of this record's window.
    ///
    /// Returns `None` when `instant` matches neither bound. If both bounds
    /// are equal, the instant is reported as a start.
    pub fn transition_kind(&self, instant: DateTime<Utc>) -> Option<TransitionKind> {
        if self.visible_from == Some(instant) {
            Some(TransitionKind::Start)
        } else if self.visible_until == Some(instant) {
            Some(TransitionKind::End)
        } else {
            None
        }
    }

    pub fn content_category(&self) -> &SourceKind {
        &self.source_kind
    }

    pub fn is_page(&self) -> bool {
        self.source_kind == SourceKind::Page
    }

    pub fn is_content(&self) -> bool {
        self.source_kind == SourceKind::Content
    }
}

fn positive_id<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match u64::deserialize(deserializer)? {
        0 => Err(serde::de::Error::invalid_value(
            serde::de::Unexpected::Unsigned(0),
            &"a positive record id",
        )),
        id => Ok(id),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
