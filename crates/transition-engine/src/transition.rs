//! Aggregation of per-record transitions across a collection.
//!
//! The functions here reduce many [`TemporalRecord`]s to the values a cache
//! layer needs: the single nearest future change (to cap a cache entry's
//! lifetime) and the list of changes inside a time window (for a periodic
//! scheduler run or a timeline view).
//!
//! Everything is a pure function of the records and an explicit `now`. No
//! function here reads the system clock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::record::{SourceKind, TemporalRecord};

/// Which edge of a visibility window an instant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    /// The record becomes visible.
    Start,
    /// The record stops being visible.
    End,
}

/// One visibility change of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub record_id: u64,
    pub source_kind: SourceKind,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub instant: DateTime<Utc>,
    pub kind: TransitionKind,
}

// ── Aggregator ──────────────────────────────────────────────────────────────

/// The earliest future transition over all `records`.
///
/// Records without a bound after `now` are ignored. Returns `None` for an
/// empty collection or when nothing will change. Single pass, no sorting.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use transition_engine::{next_transition, SourceKind, TemporalRecord};
///
/// let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
/// let records = vec![
///     TemporalRecord::new(1, SourceKind::Page, "Expiring")
///         .with_bounds(None, Some(now + chrono::Duration::seconds(1800))),
///     TemporalRecord::new(2, SourceKind::Page, "Launching")
///         .with_bounds(Some(now + chrono::Duration::seconds(7200)), None),
/// ];
/// assert_eq!(
///     next_transition(&records, now),
///     Some(now + chrono::Duration::seconds(1800))
/// );
/// ```
pub fn next_transition<'a, I>(records: I, now: DateTime<Utc>) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a TemporalRecord>,
{
    let mut earliest: Option<DateTime<Utc>> = None;
    let mut scanned = 0usize;
    for record in records {
        scanned += 1;
        if let Some(candidate) = record.next_transition(now) {
            if earliest.is_none_or(|current| candidate < current) {
                earliest = Some(candidate);
            }
        }
    }
    debug!(scanned, next = ?earliest, "computed next transition");
    earliest
}

/// Whole seconds from `now` until the next transition, rounded up.
pub fn seconds_until_next_transition<'a, I>(records: I, now: DateTime<Utc>) -> Option<u64>
where
    I: IntoIterator<Item = &'a TemporalRecord>,
{
    next_transition(records, now).map(|next| seconds_between(now, next))
}

/// Seconds from `from` to a strictly later `to`, rounded up to at least 1.
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    let delta = to - from;
    let whole = delta.num_seconds();
    let has_fraction = delta - chrono::Duration::seconds(whole) > chrono::Duration::zero();
    let secs = if has_fraction { whole + 1 } else { whole };
    secs.max(1) as u64
}

// ── Windows ─────────────────────────────────────────────────────────────────

/// Every transition with `after < instant <= until`, ordered by instant then
/// record id (starts before ends on ties).
///
/// A scheduler run that last executed at `after` invalidates exactly these.
pub fn transitions_between<'a, I>(
    records: I,
    after: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<Transition>
where
    I: IntoIterator<Item = &'a TemporalRecord>,
{
    let mut found = Vec::new();
    for record in records {
        let bounds = [
            (record.visible_from, TransitionKind::Start),
            (record.visible_until, TransitionKind::End),
        ];
        for (bound, kind) in bounds {
            if let Some(instant) = bound.filter(|t| *t > after && *t <= until) {
                found.push(Transition {
                    record_id: record.id,
                    source_kind: record.source_kind.clone(),
                    instant,
                    kind,
                });
            }
        }
    }
    found.sort_by(|a, b| {
        a.instant
            .cmp(&b.instant)
            .then(a.record_id.cmp(&b.record_id))
            .then((a.kind as u8).cmp(&(b.kind as u8)))
    });
    debug!(count = found.len(), %after, %until, "collected transitions in window");
    found
}

/// Transitions in the next `horizon` after `now`, for a timeline view.
///
/// A horizon reaching past the representable range covers every future
/// transition.
pub fn upcoming_transitions<'a, I>(
    records: I,
    now: DateTime<Utc>,
    horizon: chrono::Duration,
) -> Vec<Transition>
where
    I: IntoIterator<Item = &'a TemporalRecord>,
{
    let until = now
        .checked_add_signed(horizon)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    transitions_between(records, now, until)
}

// ── Tests ───────────────────────────────────────────────────────────────────
