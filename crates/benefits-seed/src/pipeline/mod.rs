//! Batched loading pipeline.
//!
//! A [`SeedRun`] opens one transaction on a [`Store`](crate::db::Store), runs
//! each [`Stage`] of the environment's plan through a [`RunContext`], and
//! commits once every batch has been written.

mod batch;
mod context;
mod plan;
mod report;
mod run;
mod stages;

pub use batch::Batch;
pub use context::{References, RunContext, TableStats};
pub use plan::{Stage, plan_for, restrict};
pub use report::{RunReport, StageReport};
pub use run::{RunState, SeedRun};
pub use stages::run as run_stage;
