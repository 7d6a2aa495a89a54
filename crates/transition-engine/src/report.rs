//! Reporting views over a record set.
//!
//! Administration tools use these to show how much time-controlled content
//! exists, to narrow a list down with a [`ContentFilter`], and to preview what
//! harmonizing a selection of records would do to their bounds. Nothing here
//! writes anything back: a [`HarmonizationPlan`] is a proposal only.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::HarmonizationConfig;
use crate::error::{EngineError, Result};
use crate::harmonize::{harmonize_with_shift, SlotShift};
use crate::record::TemporalRecord;
use crate::transition::next_transition;

// ── Statistics ──────────────────────────────────────────────────────────────

/// Counts over a record set at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentStatistics {
    pub total: usize,
    pub pages: usize,
    pub content: usize,
    /// Records of any other registered table.
    pub custom: usize,
    pub with_bounds: usize,
    pub visible: usize,
    /// Start bound still in the future.
    pub scheduled: usize,
    /// End bound reached.
    pub expired: usize,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub next_transition: Option<DateTime<Utc>>,
}

impl ContentStatistics {
    pub fn collect(records: &[TemporalRecord], now: DateTime<Utc>) -> Self {
        let mut stats = ContentStatistics {
            total: records.len(),
            next_transition: next_transition(records, now),
            ..Default::default()
        };
        for record in records {
            if record.is_page() {
                stats.pages += 1;
            } else if record.is_content() {
                stats.content += 1;
            } else {
                stats.custom += 1;
            }
            if record.has_temporal_bounds() {
                stats.with_bounds += 1;
            }
            if record.is_visible(now) {
                stats.visible += 1;
            }
            if is_scheduled(record, now) {
                stats.scheduled += 1;
            }
            if is_expired(record, now) {
                stats.expired += 1;
            }
        }
        stats
    }
}

fn is_scheduled(record: &TemporalRecord, now: DateTime<Utc>) -> bool {
    record.visible_from.is_some_and(|from| from > now)
}

fn is_expired(record: &TemporalRecord, now: DateTime<Utc>) -> bool {
    record.visible_until.is_some_and(|until| until <= now)
}

// ── Filtering ───────────────────────────────────────────────────────────────

/// Named record filters offered to administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFilter {
    #[default]
    All,
    Pages,
    Content,
    /// Currently visible.
    Active,
    Scheduled,
    Expired,
    /// Some bound would move under harmonization and stay within tolerance.
    Harmonizable,
}

impl FromStr for ContentFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ContentFilter::All),
            "pages" => Ok(ContentFilter::Pages),
            "content" => Ok(ContentFilter::Content),
            "active" => Ok(ContentFilter::Active),
            "scheduled" => Ok(ContentFilter::Scheduled),
            "expired" => Ok(ContentFilter::Expired),
            "harmonizable" => Ok(ContentFilter::Harmonizable),
            other => Err(EngineError::InvalidFilter(format!("'{other}'"))),
        }
    }
}

impl ContentFilter {
    /// Keep the records matching this filter, in input order.
    ///
    /// # Errors
    ///
    /// Only [`ContentFilter::Harmonizable`] can fail, with the errors of
    /// [`suggest`] (for example a disabled harmonization config).
    pub fn apply<'a>(
        &self,
        records: &'a [TemporalRecord],
        now: DateTime<Utc>,
        config: &HarmonizationConfig,
    ) -> Result<Vec<&'a TemporalRecord>> {
        let mut kept = Vec::new();
        for record in records {
            let keep = match self {
                ContentFilter::All => true,
                ContentFilter::Pages => record.is_page(),
                ContentFilter::Content => record.is_content(),
                ContentFilter::Active => record.is_visible(now),
                ContentFilter::Scheduled => is_scheduled(record, now),
                ContentFilter::Expired => is_expired(record, now),
                ContentFilter::Harmonizable => suggest(record, config)?.is_harmonizable(),
            };
            if keep {
                kept.push(record);
            }
        }
        Ok(kept)
    }
}

// ── Suggestions ─────────────────────────────────────────────────────────────

/// What harmonization would do to one record's bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarmonizationSuggestion {
    pub record_id: u64,
    pub visible_from: Option<SlotShift>,
    pub visible_until: Option<SlotShift>,
}

impl HarmonizationSuggestion {
    fn shifts(&self) -> impl Iterator<Item = &SlotShift> {
        self.visible_from.iter().chain(self.visible_until.iter())
    }

    /// At least one bound moves, and every moving bound stays within tolerance.
    pub fn is_harmonizable(&self) -> bool {
        self.shifts().any(SlotShift::moves)
            && self.shifts().filter(|s| s.moves()).all(|s| s.within_tolerance)
    }
}

/// Suggest slot-aligned bounds for `record`.
///
/// # Errors
///
/// Same as [`crate::harmonize::harmonize`].
pub fn suggest(
    record: &TemporalRecord,
    config: &HarmonizationConfig,
) -> Result<HarmonizationSuggestion> {
    config.validate()?;
    Ok(HarmonizationSuggestion {
        record_id: record.id,
        visible_from: record
            .visible_from
            .map(|t| harmonize_with_shift(t, config))
            .transpose()?,
        visible_until: record
            .visible_until
            .map(|t| harmonize_with_shift(t, config))
            .transpose()?,
    })
}

// ── Plans ───────────────────────────────────────────────────────────────────

/// Proposed bound changes for a selection of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarmonizationPlan {
    /// One entry per selected record that exists, in selection order.
    pub entries: Vec<HarmonizationSuggestion>,
    /// Selected ids with no matching record.
    pub skipped: Vec<u64>,
}

impl HarmonizationPlan {
    /// Entries that would change at least one bound.
    pub fn changes(&self) -> impl Iterator<Item = &HarmonizationSuggestion> {
        self.entries.iter().filter(|e| e.shifts().any(SlotShift::moves))
    }
}

/// Build a harmonization plan for the records with the given `ids`.
///
/// Duplicate ids are planned once. Ids are matched against `record.id`
/// regardless of table.
///
/// # Errors
///
/// Returns [`EngineError::EmptySelection`] for an empty `ids` list, and the
/// errors of [`suggest`] otherwise.
pub fn plan(
    records: &[TemporalRecord],
    ids: &[u64],
    config: &HarmonizationConfig,
) -> Result<HarmonizationPlan> {
    if ids.is_empty() {
        return Err(EngineError::EmptySelection);
    }
    config.validate()?;

    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    for id in ids {
        if !seen.insert(*id) {
            continue;
        }
        match records.iter().find(|r| r.id == *id) {
            Some(record) => entries.push(suggest(record, config)?),
            None => skipped.push(*id),
        }
    }

    let plan = HarmonizationPlan { entries, skipped };
    debug!(
        planned = plan.entries.len(),
        changing = plan.changes().count(),
        skipped = plan.skipped.len(),
        "built harmonization plan"
    );
    Ok(plan)
}

// ── Tests ───────────────────────────────────────────────────────────────────
