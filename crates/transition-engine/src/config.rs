//! Settings and harmonization configuration.
//!
//! [`Settings`] mirrors the persisted extension settings. Every section and
//! key is optional and falls back to a documented default, so an empty JSON
//! object is a valid configuration. Strategy names are resolved into closed
//! enums at load time: an unknown name fails deserialization instead of
//! silently selecting some other strategy.
//!
//! [`HarmonizationConfig`] is the resolved, engine-facing form of the
//! `harmonization` section.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::record::SourceKind;

/// Seconds in one day; slot offsets live in `0..SECONDS_PER_DAY`.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Default harmonization slots: midnight, 06:00, noon and 18:00.
pub const DEFAULT_SLOTS: [u32; 4] = [0, 6 * 3600, 12 * 3600, 18 * 3600];
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 3600;
pub const DEFAULT_SCHEDULER_INTERVAL: u64 = 60;
/// Shortest scheduler interval accepted; smaller values are raised to this.
pub const MIN_SCHEDULER_INTERVAL: u64 = 60;
pub const DEFAULT_MAX_LIFETIME: u64 = 86_400;

// ── HarmonizationConfig ─────────────────────────────────────────────────────

/// Resolved harmonization policy.
///
/// Validity is checked when the config is used, not when it is built, so a
/// disabled config with an empty slot list is fine to carry around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarmonizationConfig {
    pub enabled: bool,
    /// Offsets from midnight (UTC) in seconds, strictly increasing.
    pub slots: Vec<u32>,
    /// Maximum snap distance considered "close"; must not be negative.
    pub tolerance_seconds: i64,
}

impl Default for HarmonizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            slots: DEFAULT_SLOTS.to_vec(),
            tolerance_seconds: DEFAULT_TOLERANCE_SECONDS,
        }
    }
}

impl HarmonizationConfig {
    /// An enabled config with the given slots and tolerance.
    pub fn enabled(slots: Vec<u32>, tolerance_seconds: i64) -> Self {
        Self {
            enabled: true,
            slots,
            tolerance_seconds,
        }
    }

    /// Check that the config can be used for harmonization.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigurationDisabled`] when `enabled` is false, and
    /// [`EngineError::InvalidConfiguration`] for an empty slot list, a slot
    /// outside the day, unordered or duplicate slots, or a negative tolerance.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Err(EngineError::ConfigurationDisabled);
        }
        if self.slots.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "harmonization slots must not be empty".to_string(),
            ));
        }
        if self.tolerance_seconds < 0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "tolerance must not be negative, got {}",
                self.tolerance_seconds
            )));
        }
        if let Some(slot) = self.slots.iter().find(|s| i64::from(**s) >= SECONDS_PER_DAY) {
            return Err(EngineError::InvalidConfiguration(format!(
                "slot offset {slot} is outside the day"
            )));
        }
        if self.slots.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(EngineError::InvalidConfiguration(
                "harmonization slots must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a comma-separated `HH:MM` list (e.g. `"00:00, 06:00"`) into slot offsets.
///
/// Whitespace around entries is ignored and empty entries are skipped. The
/// result is returned in input order; ordering is checked by
/// [`HarmonizationConfig::validate`].
///
/// # Errors
///
/// Returns [`EngineError::InvalidConfiguration`] for an entry that is not a
/// valid 24-hour `HH:MM` time.
pub fn parse_slots(s: &str) -> Result<Vec<u32>> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_slot)
        .collect()
}

fn parse_slot(entry: &str) -> Result<u32> {
    let invalid = || EngineError::InvalidConfiguration(format!("invalid slot '{entry}'"));
    let (hours, minutes) = entry.split_once(':').ok_or_else(invalid)?;
    let hours: u32 = hours.trim().parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.trim().parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 3600 + minutes * 60)
}

/// Render a slot offset as `HH:MM`.
pub fn format_slot(offset: u32) -> String {
    format!("{:02}:{:02}", offset / 3600, (offset % 3600) / 60)
}

// ── Strategies ──────────────────────────────────────────────────────────────

/// Which records are considered when computing a page's cache lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopingStrategy {
    /// Every record affects every page.
    #[default]
    Global,
    /// The page and all records placed on it.
    PerPage,
    /// The page and the content elements placed on it.
    PerContent,
}

/// How transitions reach the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimingStrategy {
    /// Cap each cache entry's lifetime at the next transition.
    #[default]
    Dynamic,
    /// Leave lifetimes alone; a periodic task invalidates at transitions.
    Scheduler,
    /// Pick per record kind using [`TimingRules`].
    Hybrid,
}

/// Per-kind timing choice used by [`TimingStrategy::Hybrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingRules {
    pub pages: TimingStrategy,
    pub content: TimingStrategy,
}

impl Default for TimingRules {
    fn default() -> Self {
        Self {
            pages: TimingStrategy::Dynamic,
            content: TimingStrategy::Scheduler,
        }
    }
}

impl TimingRules {
    /// The rule for `kind`; custom tables follow the content rule.
    pub fn for_kind(&self, kind: &SourceKind) -> TimingStrategy {
        match kind {
            SourceKind::Page => self.pages,
            SourceKind::Content | SourceKind::Custom(_) => self.content,
        }
    }
}

// ── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopingSettings {
    pub strategy: ScopingStrategy,
    #[serde(deserialize_with = "flexible_bool")]
    pub use_refindex: bool,
}

impl Default for ScopingSettings {
    fn default() -> Self {
        Self {
            strategy: ScopingStrategy::Global,
            use_refindex: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub strategy: TimingStrategy,
    #[serde(deserialize_with = "scheduler_interval")]
    pub scheduler_interval: u64,
    pub hybrid: TimingRules,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            strategy: TimingStrategy::Dynamic,
            scheduler_interval: DEFAULT_SCHEDULER_INTERVAL,
            hybrid: TimingRules::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonizationSettings {
    #[serde(deserialize_with = "flexible_bool")]
    pub enabled: bool,
    /// Comma-separated `HH:MM` list.
    pub slots: String,
    #[serde(deserialize_with = "flexible_i64")]
    pub tolerance: i64,
    /// Round bounds to slots when records are saved.
    #[serde(deserialize_with = "flexible_bool")]
    pub auto_round: bool,
}

impl Default for HarmonizationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            slots: DEFAULT_SLOTS
                .iter()
                .map(|s| format_slot(*s))
                .collect::<Vec<_>>()
                .join(","),
            tolerance: DEFAULT_TOLERANCE_SECONDS,
            auto_round: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Upper bound for any cache lifetime, in seconds.
    #[serde(deserialize_with = "flexible_u64")]
    pub default_max_lifetime: u64,
    #[serde(deserialize_with = "flexible_bool")]
    pub debug_logging: bool,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            default_max_lifetime: DEFAULT_MAX_LIFETIME,
            debug_logging: false,
        }
    }
}

/// The full settings tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scoping: ScopingSettings,
    pub timing: TimingSettings,
    pub harmonization: HarmonizationSettings,
    pub advanced: AdvancedSettings,
}

impl Settings {
    /// Load settings from a JSON document. `null` yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfiguration`] for malformed JSON, an
    /// unknown strategy name, or a value of the wrong type.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let parsed: Option<Settings> = serde_json::from_str(s)
            .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?;
        Ok(parsed.unwrap_or_default())
    }

    /// Resolve the harmonization section into a [`HarmonizationConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfiguration`] if a slot entry is not a
    /// valid `HH:MM` time.
    pub fn harmonization(&self) -> Result<HarmonizationConfig> {
        Ok(HarmonizationConfig {
            enabled: self.harmonization.enabled,
            slots: parse_slots(&self.harmonization.slots)?,
            tolerance_seconds: self.harmonization.tolerance,
        })
    }

    pub fn is_per_content_scoping(&self) -> bool {
        self.scoping.strategy == ScopingStrategy::PerContent
    }

    pub fn is_dynamic_timing(&self) -> bool {
        self.timing.strategy == TimingStrategy::Dynamic
    }

    pub fn is_scheduler_timing(&self) -> bool {
        self.timing.strategy == TimingStrategy::Scheduler
    }

    pub fn is_hybrid_timing(&self) -> bool {
        self.timing.strategy == TimingStrategy::Hybrid
    }
}

// ── Deserialization helpers ─────────────────────────────────────────────────

/// Accept `true`/`false`, `0`/`1` and `"0"`/`"1"` (plus `"true"`/`"false"`).
fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexibleBool;

    impl Visitor<'_> for FlexibleBool {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a boolean, 0/1, or \"0\"/\"1\"")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<bool, E> {
            match v.trim() {
                "1" | "true" => Ok(true),
                "0" | "false" | "" => Ok(false),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }

    deserializer.deserialize_any(FlexibleBool)
}

/// Accept an integer or an integer-valued string such as `"3600"`.
fn flexible_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexibleInt;

    impl Visitor<'_> for FlexibleInt {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an integer or a string holding one")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<i64, E> {
            i64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<i64, E> {
            v.trim()
                .parse()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(FlexibleInt)
}

fn flexible_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = flexible_i64(deserializer)?;
    u64::try_from(value).map_err(|_| {
        de::Error::invalid_value(de::Unexpected::Signed(value), &"a non-negative integer")
    })
}

fn scheduler_interval<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let interval = flexible_u64(deserializer)?;
    Ok(interval.max(MIN_SCHEDULER_INTERVAL))
}

// ── Tests ───────────────────────────────────────────────────────────────────
