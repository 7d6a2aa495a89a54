//! # transition-engine
//!
//! Deterministic cache-transition computation for time-controlled content.
//!
//! Content records carry optional visibility bounds. A cache that renders
//! them must expire exactly when any of those bounds is crossed. This crate
//! computes when that happens, and optionally snaps transition instants to a
//! few configured daily slots ("harmonization") so that many changes share
//! one cache invalidation.
//!
//! All functions are pure: callers pass the records, the reference instant
//! and the resolved configuration. Nothing here reads the clock, touches
//! storage or evicts cache entries.
//!
//! ## Modules
//!
//! - [`record`] — `TemporalRecord` and the per-record transition calculator
//! - [`transition`] — Nearest future transition across a collection, transition windows
//! - [`harmonize`] — Slot harmonization and harmonization impact analysis
//! - [`config`] — Settings tree, strategies, and `HarmonizationConfig`
//! - [`registry`] — Immutable registry of tables carrying temporal fields
//! - [`lifetime`] — Cache-lifetime capping under scoping and timing strategies
//! - [`report`] — Statistics, filters, and harmonization plans
//! - [`error`] — Error types

pub mod config;
pub mod error;
pub mod harmonize;
pub mod lifetime;
pub mod record;
pub mod registry;
pub mod report;
pub mod transition;

pub use config::{
    parse_slots, HarmonizationConfig, ScopingStrategy, Settings, TimingRules, TimingStrategy,
};
pub use error::EngineError;
pub use harmonize::{analyze_impact, harmonize, harmonize_with_shift, HarmonizationImpact, SlotShift};
pub use lifetime::{cap_lifetime, effective_lifetime, is_scheduler_managed};
pub use record::{SourceKind, TemporalRecord};
pub use registry::{TableRegistry, TableRegistryBuilder};
pub use report::{
    plan, suggest, ContentFilter, ContentStatistics, HarmonizationPlan, HarmonizationSuggestion,
};
pub use transition::{
    next_transition, seconds_until_next_transition, transitions_between, upcoming_transitions,
    Transition, TransitionKind,
};
