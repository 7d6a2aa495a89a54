//! Slot harmonization of transition instants.
//!
//! Harmonization snaps an instant to the nearest configured time-of-day slot
//! so that many independent transitions share a few cache-invalidation
//! moments. Day boundaries are UTC midnight and computation is at whole-second
//! precision (sub-second parts of the input are truncated).
//!
//! For every slot the candidates on the previous, current and next UTC day
//! are considered, so an instant at 23:50 snaps forward to the next day's
//! 00:00 slot. The nearest candidate wins; on a tie the earlier one does.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::{HarmonizationConfig, SECONDS_PER_DAY};
use crate::error::{EngineError, Result};

// ── harmonize ───────────────────────────────────────────────────────────────

/// The outcome of snapping one instant to its nearest slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotShift {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub original: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub harmonized: DateTime<Utc>,
    /// `harmonized - original` in seconds (negative when snapped backwards).
    pub shift_seconds: i64,
    /// Whether `|shift_seconds| <= tolerance_seconds`.
    pub within_tolerance: bool,
}

impl SlotShift {
    /// Whether harmonization moves the instant at all.
    pub fn moves(&self) -> bool {
        self.shift_seconds != 0
    }
}

/// Snap `instant` to the nearest configured slot.
///
/// # Errors
///
/// Returns [`EngineError::ConfigurationDisabled`] when the config is
/// disabled, [`EngineError::InvalidConfiguration`] when it is malformed (see
/// [`HarmonizationConfig::validate`]), and [`EngineError::OutOfRange`] when
/// the snapped instant is not representable.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use transition_engine::{harmonize, HarmonizationConfig};
///
/// let config = HarmonizationConfig::enabled(vec![0, 21_600, 43_200, 64_800], 3600);
/// let input = Utc.timestamp_opt(1_609_461_000, 0).unwrap(); // 2021-01-01T00:30:00Z
/// let snapped = harmonize(input, &config).unwrap();
/// assert_eq!(snapped.timestamp(), 1_609_459_200); // 2021-01-01T00:00:00Z
/// ```
pub fn harmonize(instant: DateTime<Utc>, config: &HarmonizationConfig) -> Result<DateTime<Utc>> {
    config.validate()?;
    nearest_slot(instant, &config.slots)
}

/// Like [`harmonize`], but also report the shift and its tolerance status.
pub fn harmonize_with_shift(
    instant: DateTime<Utc>,
    config: &HarmonizationConfig,
) -> Result<SlotShift> {
    config.validate()?;
    shift_to_slot(instant, config)
}

/// Snap without validating; callers validate once per batch.
fn shift_to_slot(instant: DateTime<Utc>, config: &HarmonizationConfig) -> Result<SlotShift> {
    let harmonized = nearest_slot(instant, &config.slots)?;
    let shift_seconds = harmonized.timestamp() - instant.timestamp();
    Ok(SlotShift {
        original: instant,
        harmonized,
        shift_seconds,
        within_tolerance: shift_seconds.abs() <= config.tolerance_seconds,
    })
}

fn nearest_slot(instant: DateTime<Utc>, slots: &[u32]) -> Result<DateTime<Utc>> {
    let secs = instant.timestamp();
    let midnight = secs.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY;

    let mut best: Option<(i64, i64)> = None; // (distance, candidate)
    for day in [-1i64, 0, 1] {
        for slot in slots {
            let candidate = midnight + day * SECONDS_PER_DAY + i64::from(*slot);
            let distance = (candidate - secs).abs();
            let better = match best {
                None => true,
                Some((best_distance, best_candidate)) => {
                    distance < best_distance
                        || (distance == best_distance && candidate < best_candidate)
                }
            };
            if better {
                best = Some((distance, candidate));
            }
        }
    }

    // Slots are non-empty after validation, so `best` is always set here.
    let (_, candidate) = best.ok_or_else(|| {
        EngineError::InvalidConfiguration("harmonization slots must not be empty".to_string())
    })?;
    DateTime::from_timestamp(candidate, 0).ok_or(EngineError::OutOfRange(candidate))
}

// ── analyze_impact ──────────────────────────────────────────────────────────

/// How much a harmonization policy would consolidate a batch of instants.
///
/// Two policies are reported side by side:
///
/// - **unconditional** (`harmonized_count`, `reduction_percent`): every
///   instant snaps to its nearest slot, however far away;
/// - **tolerance-bounded** (`tolerance_bounded_count`,
///   `tolerance_bounded_reduction_percent`): instants farther than the
///   tolerance from their slot keep their own value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarmonizationImpact {
    /// Distinct input instants.
    pub original_count: usize,
    /// Distinct instants after unconditional harmonization.
    pub harmonized_count: usize,
    pub reduction_percent: f64,
    /// Distinct inputs whose slot lies within the tolerance.
    pub within_tolerance_count: usize,
    /// Distinct inputs whose slot lies beyond the tolerance.
    pub beyond_tolerance_count: usize,
    /// Distinct instants when only in-tolerance inputs are snapped.
    pub tolerance_bounded_count: usize,
    pub tolerance_bounded_reduction_percent: f64,
}

/// Preview the consolidation achieved by harmonizing `instants`.
///
/// Duplicate inputs count once. An empty batch yields all-zero counts and
/// `0.0` percentages.
///
/// # Errors
///
/// Same as [`harmonize`]; the config is checked even for an empty batch.
pub fn analyze_impact<I>(instants: I, config: &HarmonizationConfig) -> Result<HarmonizationImpact>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    config.validate()?;

    let distinct: BTreeSet<DateTime<Utc>> = instants.into_iter().collect();

    let mut harmonized = BTreeSet::new();
    let mut bounded = BTreeSet::new();
    let mut within_tolerance_count = 0usize;
    for instant in &distinct {
        let shift = shift_to_slot(*instant, config)?;
        harmonized.insert(shift.harmonized);
        if shift.within_tolerance {
            within_tolerance_count += 1;
            bounded.insert(shift.harmonized);
        } else {
            bounded.insert(shift.original);
        }
    }

    let original_count = distinct.len();
    let impact = HarmonizationImpact {
        original_count,
        harmonized_count: harmonized.len(),
        reduction_percent: reduction(original_count, harmonized.len()),
        within_tolerance_count,
        beyond_tolerance_count: original_count - within_tolerance_count,
        tolerance_bounded_count: bounded.len(),
        tolerance_bounded_reduction_percent: reduction(original_count, bounded.len()),
    };
    debug!(
        original = impact.original_count,
        harmonized = impact.harmonized_count,
        beyond_tolerance = impact.beyond_tolerance_count,
        "analyzed harmonization impact"
    );
    Ok(impact)
}

fn reduction(original: usize, remaining: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original - remaining) as f64 / original as f64 * 100.0
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const MIDNIGHT: i64 = 1_609_459_200; // 2021-01-01T00:00:00Z

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn config() -> HarmonizationConfig {
        HarmonizationConfig::enabled(vec![0, 21_600, 43_200, 64_800], 3600)
    }

    // ── harmonize tests ─────────────────────────────────────────────────

    #[test]
    fn test_harmonize_rounds_down_to_midnight() {
        let result = harmonize(at(1_609_461_000), &config()).unwrap();
        assert_eq!(result, at(MIDNIGHT));
    }

    #[test]
    fn test_harmonize_rounds_up_to_next_slot() {
        // 05:10 → 06:00
        let result = harmonize(at(MIDNIGHT + 5 * 3600 + 600), &config()).unwrap();
        assert_eq!(result, at(MIDNIGHT + 21_600));
    }

    #[test]
    fn test_harmonize_wraps_to_next_day() {
        // 23:50 → next day's 00:00
        let result = harmonize(at(MIDNIGHT + 86_400 - 600), &config()).unwrap();
        assert_eq!(result, at(MIDNIGHT + 86_400));
    }

    #[test]
    fn test_harmonize_wraps_to_previous_day() {
        // Single 22:00 slot, input 01:00 → previous day's 22:00
        let config = HarmonizationConfig::enabled(vec![79_200], 3600);
        let result = harmonize(at(MIDNIGHT + 3600), &config).unwrap();
        assert_eq!(result, at(MIDNIGHT - 7200));
    }

    #[test]
    fn test_harmonize_tie_prefers_earlier() {
        // 03:00 is equidistant from 00:00 and 06:00
        let result = harmonize(at(MIDNIGHT + 10_800), &config()).unwrap();
        assert_eq!(result, at(MIDNIGHT));
    }

    #[test]
    fn test_harmonize_exact_slot_unchanged() {
        for slot in [0, 21_600, 43_200, 64_800] {
            let instant = at(MIDNIGHT + slot);
            assert_eq!(harmonize(instant, &config()).unwrap(), instant);
        }
    }

    #[test]
    fn test_harmonize_is_idempotent() {
        for offset in [1, 599, 10_799, 10_801, 40_000, 86_399] {
            let once = harmonize(at(MIDNIGHT + offset), &config()).unwrap();
            let twice = harmonize(once, &config()).unwrap();
            assert_eq!(once, twice, "offset {offset}");
        }
    }

    #[test]
    fn test_harmonize_before_epoch() {
        // 1969-12-31T23:40:00Z → 1970-01-01T00:00:00Z
        let result = harmonize(at(-1200), &config()).unwrap();
        assert_eq!(result, at(0));
    }

    #[test]
    fn test_harmonize_truncates_subseconds() {
        let instant = at(MIDNIGHT) + chrono::Duration::milliseconds(400);
        assert_eq!(harmonize(instant, &config()).unwrap(), at(MIDNIGHT));
    }

    #[test]
    fn test_harmonize_disabled_fails() {
        let disabled = HarmonizationConfig {
            enabled: false,
            ..config()
        };
        let err = harmonize(at(MIDNIGHT), &disabled).unwrap_err();
        assert_eq!(err, EngineError::ConfigurationDisabled);
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_harmonize_empty_slots_fails() {
        let config = HarmonizationConfig::enabled(vec![], 3600);
        assert!(matches!(
            harmonize(at(MIDNIGHT), &config),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_harmonize_with_shift_reports_tolerance() {
        let near = harmonize_with_shift(at(MIDNIGHT + 1800), &config()).unwrap();
        assert_eq!(near.shift_seconds, -1800);
        assert!(near.within_tolerance);
        assert!(near.moves());

        // 03:20 → 06:00, 2h40m away
        let far = harmonize_with_shift(at(MIDNIGHT + 12_000), &config()).unwrap();
        assert_eq!(far.harmonized, at(MIDNIGHT + 21_600));
        assert_eq!(far.shift_seconds, 9_600);
        assert!(!far.within_tolerance);

        let exact = harmonize_with_shift(at(MIDNIGHT), &config()).unwrap();
        assert!(!exact.moves());
    }

    // ── analyze_impact tests ────────────────────────────────────────────

    #[test]
    fn test_impact_collapses_near_midnight() {
        let instants = [MIDNIGHT + 600, MIDNIGHT + 1200, MIDNIGHT + 1800].map(at);
        let impact = analyze_impact(instants, &config()).unwrap();
        assert_eq!(impact.original_count, 3);
        assert_eq!(impact.harmonized_count, 1);
        assert!(impact.reduction_percent > 60.0);
        assert_eq!(impact.within_tolerance_count, 3);
        assert_eq!(impact.tolerance_bounded_count, 1);
    }

    #[test]
    fn test_impact_empty_batch() {
        let impact = analyze_impact(Vec::<DateTime<Utc>>::new(), &config()).unwrap();
        assert_eq!(impact.original_count, 0);
        assert_eq!(impact.harmonized_count, 0);
        assert_eq!(impact.reduction_percent, 0.0);
        assert_eq!(impact.tolerance_bounded_reduction_percent, 0.0);
    }

    #[test]
    fn test_impact_counts_duplicates_once() {
        let instants = [MIDNIGHT + 600, MIDNIGHT + 600, MIDNIGHT + 43_000].map(at);
        let impact = analyze_impact(instants, &config()).unwrap();
        assert_eq!(impact.original_count, 2);
        assert_eq!(impact.harmonized_count, 2);
        assert_eq!(impact.reduction_percent, 0.0);
    }

    #[test]
    fn test_impact_tolerance_bounded_view() {
        // Two near 00:00, two ~2.5h from 06:00 (beyond a 1h tolerance).
        let instants = [
            MIDNIGHT + 300,
            MIDNIGHT + 900,
            MIDNIGHT + 12_600,
            MIDNIGHT + 12_700,
        ]
        .map(at);
        let impact = analyze_impact(instants, &config()).unwrap();
        assert_eq!(impact.original_count, 4);
        assert_eq!(impact.harmonized_count, 2);
        assert_eq!(impact.reduction_percent, 50.0);
        assert_eq!(impact.within_tolerance_count, 2);
        assert_eq!(impact.beyond_tolerance_count, 2);
        assert_eq!(impact.tolerance_bounded_count, 3);
        assert_eq!(impact.tolerance_bounded_reduction_percent, 25.0);
    }

    #[test]
    fn test_impact_disabled_fails_even_when_empty() {
        let err = analyze_impact(Vec::<DateTime<Utc>>::new(), &HarmonizationConfig::default()).unwrap_err();
        assert_eq!(err, EngineError::ConfigurationDisabled);
    }
}
