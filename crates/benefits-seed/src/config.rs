//! Configuration for seed runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::{TableSpec, WriteMode, tables};
use crate::errors::SeedError;
use crate::generators::DayOffset;
use crate::models::Environment;

/// Configuration for a seed run.
///
/// Loaded from defaults, then an optional JSON file, then CLI flags and
/// environment variables (applied by the binary).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub environment: Environment,

    /// Rows buffered per table before a bulk write.
    pub batch_size: usize,

    /// RNG seed; a random one is drawn when absent.
    pub seed: Option<u64>,

    /// Seed only the first N financers of the environment's catalog.
    pub financer_limit: Option<usize>,

    /// Registered users generated for each financer.
    pub users_per_financer: usize,

    /// Extra invitations over registrations, as a percentage range.
    pub invited_surplus_percent: (u32, u32),

    /// Monthly invoices per division and per financer (inclusive range).
    pub invoices_per_entity: (u32, u32),

    /// Days of session history per user.
    pub session_window_days: i64,

    pub articles_per_financer: usize,

    /// Percentage of a financer's users reacting to each article.
    pub interaction_rate: (u32, u32),

    /// Timestamp policy for historical interactions.
    pub day_offset: DayOffset,

    /// Per-table write mode overrides, keyed by table name.
    pub write_modes: BTreeMap<String, WriteMode>,

    pub notify: NotifyConfig,

    pub reconcile: ReconcileConfig,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            batch_size: 5000,
            seed: None,
            financer_limit: None,
            users_per_financer: 250,
            invited_surplus_percent: (10, 20),
            invoices_per_entity: (10, 15),
            session_window_days: 30,
            articles_per_financer: 6,
            interaction_rate: (5, 30),
            day_offset: DayOffset::default(),
            write_modes: BTreeMap::new(),
            notify: NotifyConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Incoming-webhook URL; messages are only logged without one.
    pub slack_webhook: Option<String>,
    pub slack_channel: Option<String>,
    /// Send even when stdout is a terminal.
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Run reconciliation after a successful seed outside production.
    pub reconcile_after_seed: bool,
    /// Program and arguments to run.
    pub command: Vec<String>,
    pub throttle_secs: u64,
    /// Holds the unix time of the last successful reconciliation.
    pub state_file: PathBuf,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            reconcile_after_seed: false,
            command: Vec::new(),
            throttle_secs: 300,
            state_file: std::env::temp_dir().join("benefits-seed-reconcile.state"),
        }
    }
}

impl SeedConfig {
    /// Reads a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SeedError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| SeedError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<(), SeedError> {
        if self.batch_size == 0 {
            return Err(SeedError::Config("batch_size must be at least 1".into()));
        }
        for (name, (low, high)) in [
            ("invited_surplus_percent", self.invited_surplus_percent),
            ("invoices_per_entity", self.invoices_per_entity),
            ("interaction_rate", self.interaction_rate),
        ] {
            if low > high {
                return Err(SeedError::Config(format!("{name}: {low} > {high}")));
            }
        }
        if self.interaction_rate.1 > 100 {
            return Err(SeedError::Config("interaction_rate above 100%".into()));
        }
        if self.session_window_days < 0 {
            return Err(SeedError::Config("session_window_days is negative".into()));
        }
        if let DayOffset::Recency { lambda } = self.day_offset
            && lambda <= 0.0
        {
            return Err(SeedError::Config(format!(
                "recency lambda must be positive, got {lambda}"
            )));
        }
        if self.reconcile.reconcile_after_seed && self.reconcile.command.is_empty() {
            return Err(SeedError::Config(
                "reconcile_after_seed needs a reconcile command".into(),
            ));
        }
        if let Some(unknown) = self.write_modes.keys().find(|t| tables::by_name(t).is_none()) {
            return Err(SeedError::Config(format!("unknown table `{unknown}` in write_modes")));
        }
        Ok(())
    }

    /// Write mode for a table: the override if any, else the table's default.
    pub fn write_mode_for(&self, table: &TableSpec) -> WriteMode {
        self.write_modes
            .get(table.name)
            .copied()
            .unwrap_or(table.default_mode)
    }
}
