use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use transition_engine::{
    analyze_impact, effective_lifetime, harmonize_with_shift, next_transition, plan,
    seconds_until_next_transition, transitions_between, ContentFilter, ContentStatistics,
    HarmonizationConfig, Settings, TemporalRecord,
};

#[derive(Parser)]
#[command(name = "temporal-cache")]
#[command(about = "Preview cache transitions and slot harmonization of time-controlled content.")]
pub struct CommandLine {
    /// Settings JSON file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Reference instant as Unix epoch seconds (defaults to the system clock)
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub now: Option<i64>,

    /// Enable harmonization regardless of the settings file
    #[arg(long, global = true)]
    pub enable_harmonization: bool,

    /// Harmonization slots, e.g. "00:00,06:00,12:00,18:00"
    #[arg(long, global = true)]
    pub slots: Option<String>,

    /// Harmonization tolerance in seconds
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub tolerance: Option<i64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Next visibility change and the resulting cache lifetime
    #[command(alias = "n")]
    Next {
        /// Records JSON array, or "-" for stdin
        #[arg(long, default_value = "-")]
        records: String,
        /// Page whose cache entry is computed
        #[arg(long, default_value_t = 0)]
        page: u64,
        /// Lifetime to cap, in seconds
        #[arg(long, default_value_t = 86_400)]
        lifetime: u64,
    },
    /// Snap epoch instants to the nearest slot
    #[command(alias = "h")]
    Harmonize {
        #[arg(required = true, allow_hyphen_values = true)]
        instants: Vec<i64>,
    },
    /// Consolidation achieved by harmonizing all record bounds
    #[command(alias = "i")]
    Impact {
        #[arg(long, default_value = "-")]
        records: String,
    },
    /// Record counts, optionally narrowed by a filter
    #[command(alias = "s")]
    Stats {
        #[arg(long, default_value = "-")]
        records: String,
        /// all, pages, content, active, scheduled, expired, harmonizable
        #[arg(long, default_value = "all")]
        filter: String,
    },
    /// Transitions in (after, until], as a scheduler run would see them
    #[command(alias = "w")]
    Window {
        #[arg(long, default_value = "-")]
        records: String,
        #[arg(long, allow_hyphen_values = true)]
        after: i64,
        #[arg(long, allow_hyphen_values = true)]
        until: i64,
    },
    /// Proposed slot-aligned bounds for selected records
    #[command(alias = "p")]
    Plan {
        #[arg(long, default_value = "-")]
        records: String,
        /// Record ids, comma separated
        #[arg(long, value_delimiter = ',')]
        ids: Vec<u64>,
    },
}

impl CommandLine {
    /// Read the settings file and apply command-line overrides.
    pub fn load_settings(&self) -> Result<Settings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading settings {}", path.display()))?;
                Settings::from_json_str(&raw)
                    .with_context(|| format!("parsing settings {}", path.display()))?
            }
            None => Settings::default(),
        };
        if self.enable_harmonization {
            settings.harmonization.enabled = true;
        }
        if let Some(slots) = &self.slots {
            settings.harmonization.slots = slots.clone();
        }
        if let Some(tolerance) = self.tolerance {
            settings.harmonization.tolerance = tolerance;
        }
        Ok(settings)
    }

    /// Execute the selected subcommand and return its JSON report.
    pub fn run(&self, settings: &Settings) -> Result<Value> {
        let now = self.reference_instant()?;

        let output = match &self.command {
            Commands::Next {
                records,
                page,
                lifetime,
            } => {
                let records = load_records(records)?;
                let next = next_transition(&records, now);
                json!({
                    "now": now.timestamp(),
                    "next_transition": next.map(|t| t.timestamp()),
                    "seconds_until": seconds_until_next_transition(&records, now),
                    "cache_lifetime": effective_lifetime(settings, &records, *page, now, *lifetime),
                })
            }
            Commands::Harmonize { instants } => {
                let harmonization = settings.harmonization()?;
                let shifts = instants
                    .iter()
                    .map(|secs| harmonize_with_shift(epoch(*secs)?, &harmonization))
                    .collect::<transition_engine::error::Result<Vec<_>>>()?;
                serde_json::to_value(shifts)?
            }
            Commands::Impact { records } => {
                let harmonization = settings.harmonization()?;
                let records = load_records(records)?;
                let instants = records
                    .iter()
                    .flat_map(|r| [r.visible_from, r.visible_until])
                    .flatten();
                serde_json::to_value(analyze_impact(instants, &harmonization)?)?
            }
            Commands::Stats { records, filter } => {
                let records = load_records(records)?;
                let filter: ContentFilter = filter.parse()?;
                // Only the harmonizable filter reads the slot settings.
                let harmonization = if filter == ContentFilter::Harmonizable {
                    settings.harmonization()?
                } else {
                    HarmonizationConfig::default()
                };
                let selected: Vec<TemporalRecord> = filter
                    .apply(&records, now, &harmonization)?
                    .into_iter()
                    .cloned()
                    .collect();
                json!({
                    "filter": filter,
                    "statistics": ContentStatistics::collect(&selected, now),
                    "ids": selected.iter().map(|r| r.id).collect::<Vec<_>>(),
                })
            }
            Commands::Window {
                records,
                after,
                until,
            } => {
                if until < after {
                    bail!("--until ({until}) is before --after ({after})");
                }
                let records = load_records(records)?;
                serde_json::to_value(transitions_between(&records, epoch(*after)?, epoch(*until)?))?
            }
            Commands::Plan { records, ids } => {
                let harmonization = settings.harmonization()?;
                let records = load_records(records)?;
                serde_json::to_value(plan(&records, ids, &harmonization)?)?
            }
        };
        Ok(output)
    }

    fn reference_instant(&self) -> Result<DateTime<Utc>> {
        match self.now {
            Some(secs) => Ok(epoch(secs)?),
            None => Ok(Utc::now()),
        }
    }
}

fn epoch(secs: i64) -> transition_engine::error::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(transition_engine::EngineError::OutOfRange(secs))
}

fn load_records(source: &str) -> Result<Vec<TemporalRecord>> {
    let raw = if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading records from stdin")?;
        buf
    } else {
        fs::read_to_string(source).with_context(|| format!("reading records {source}"))?
    };
    let records: Vec<TemporalRecord> =
        serde_json::from_str(&raw).with_context(|| format!("parsing records from {source}"))?;
    info!(count = records.len(), source, "loaded records");
    Ok(records)
}
