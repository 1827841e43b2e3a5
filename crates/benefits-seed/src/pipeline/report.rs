//! Summary of a finished run.

use std::fmt::Write as _;

use serde::Serialize;

use crate::models::Environment;
use crate::pipeline::context::TableStats;
use crate::pipeline::plan::Stage;
use crate::pipeline::run::RunState;

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub elapsed_ms: u128,
    /// Rows generated by the stage, across all tables.
    pub generated: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub environment: Environment,
    /// Seed that reproduces this run.
    pub seed: u64,
    pub state: RunState,
    pub stages: Vec<StageReport>,
    pub tables: Vec<TableStats>,
    pub elapsed_ms: u128,
}

impl RunReport {
    pub fn table(&self, name: &str) -> Option<&TableStats> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn written_total(&self) -> u64 {
        self.tables.iter().map(|t| t.written).sum()
    }

    /// Human-readable multi-line summary, used for notifications.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Seeded {} ({} rows in {:.1}s, seed {})",
            self.environment,
            self.written_total(),
            self.elapsed_ms as f64 / 1000.0,
            self.seed
        );
        for t in &self.tables {
            let _ = write!(out, "\n  {}: {} written", t.table, t.written);
            if t.skipped > 0 {
                let _ = write!(out, ", {} skipped", t.skipped);
            }
        }
        out
    }
}
