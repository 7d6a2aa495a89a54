//! Cache-lifetime capping.
//!
//! A rendered page must not stay cached past the moment any record it
//! depends on changes visibility. [`cap_lifetime`] applies that rule to an
//! explicit record set; [`effective_lifetime`] first narrows the set with the
//! configured scoping strategy and timing strategy.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{ScopingStrategy, Settings, TimingStrategy};
use crate::record::{SourceKind, TemporalRecord};
use crate::transition::seconds_until_next_transition;

impl ScopingStrategy {
    /// The records whose transitions affect the cache entry of `page_id`.
    ///
    /// `Global` keeps everything. `PerPage` keeps the page itself and every
    /// record placed on it. `PerContent` keeps the page itself and the content
    /// elements placed on it, leaving out subpages and other tables.
    pub fn select<'a>(&self, records: &'a [TemporalRecord], page_id: u64) -> Vec<&'a TemporalRecord> {
        let is_page_itself = |r: &TemporalRecord| r.is_page() && r.id == page_id;
        records
            .iter()
            .filter(|&r| match self {
                ScopingStrategy::Global => true,
                ScopingStrategy::PerPage => is_page_itself(r) || r.container_id == page_id,
                ScopingStrategy::PerContent => {
                    is_page_itself(r) || (r.is_content() && r.container_id == page_id)
                }
            })
            .collect()
    }
}

/// Cap `lifetime` (seconds) at the time left until the next transition.
///
/// Returns `lifetime` unchanged when no record has a future transition.
pub fn cap_lifetime<'a, I>(records: I, now: DateTime<Utc>, lifetime: u64) -> u64
where
    I: IntoIterator<Item = &'a TemporalRecord>,
{
    match seconds_until_next_transition(records, now) {
        Some(until_next) if until_next < lifetime => until_next,
        _ => lifetime,
    }
}

/// The cache lifetime for `page_id` under the configured strategies.
///
/// The result never exceeds `advanced.default_max_lifetime`. Under
/// `Scheduler` timing no record caps the lifetime (a periodic task
/// invalidates instead); under `Hybrid` only record kinds whose rule is
/// `Dynamic` do.
pub fn effective_lifetime(
    settings: &Settings,
    records: &[TemporalRecord],
    page_id: u64,
    now: DateTime<Utc>,
    lifetime: u64,
) -> u64 {
    let lifetime = lifetime.min(settings.advanced.default_max_lifetime);
    let scoped = settings.scoping.strategy.select(records, page_id);

    let capped = match settings.timing.strategy {
        TimingStrategy::Dynamic => cap_lifetime(scoped, now, lifetime),
        TimingStrategy::Scheduler => lifetime,
        TimingStrategy::Hybrid => {
            let rules = &settings.timing.hybrid;
            let dynamic = scoped
                .into_iter()
                .filter(|r| rules.for_kind(&r.source_kind) == TimingStrategy::Dynamic);
            cap_lifetime(dynamic, now, lifetime)
        }
    };
    debug!(
        page_id,
        lifetime,
        capped,
        timing = ?settings.timing.strategy,
        "computed cache lifetime"
    );
    capped
}

/// Whether a record kind is handled by the periodic scheduler under `settings`.
pub fn is_scheduler_managed(settings: &Settings, kind: &SourceKind) -> bool {
    match settings.timing.strategy {
        TimingStrategy::Dynamic => false,
        TimingStrategy::Scheduler => true,
        TimingStrategy::Hybrid => {
            settings.timing.hybrid.for_kind(kind) == TimingStrategy::Scheduler
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
