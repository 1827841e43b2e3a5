//! Seed data for the benefits platform.
//!
//! This crate generates reference and demo data (divisions, financers,
//! modules and their activations, users, invoices, engagement logs and
//! metrics) and loads it in bulk, one transaction per run.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use benefits_seed::prelude::*;
//!
//! let config = SeedConfig {
//!     environment: Environment::Staging,
//!     batch_size: 1000,
//!     seed: Some(12345),
//!     ..Default::default()
//! };
//! let plan = plan_for(config.environment);
//!
//! let mut run = SeedRun::new(PgStore::new(pool), config, plan);
//! let report = run.execute().await?;
//! println!("{}", report.summary());
//! ```

pub mod calendar;
pub mod config;
pub mod db;
pub mod errors;
pub mod generators;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod reconcile;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{NotifyConfig, ReconcileConfig, SeedConfig};
    pub use crate::db::{
        BulkWriter, MemoryStore, PgStore, Record, Store, TableSpec, WriteError, WriteMode, tables,
    };
    pub use crate::errors::SeedError;
    pub use crate::generators::DayOffset;
    pub use crate::models::Environment;
    pub use crate::notify::{LogNotifier, Notifier, SlackNotifier};
    pub use crate::pipeline::{RunReport, RunState, SeedRun, Stage, plan_for, restrict};
    pub use crate::reconcile::{CommandReconciler, ReconcileOutcome, Reconciler};
}
