//! The seed run: one transaction, stages in plan order, commit or rollback.

use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::config::SeedConfig;
use crate::db::{BulkWriter, Store};
use crate::errors::SeedError;
use crate::notify::{LogNotifier, Notifier, notify_quietly};
use crate::pipeline::context::RunContext;
use crate::pipeline::plan::Stage;
use crate::pipeline::report::{RunReport, StageReport};
use crate::pipeline::stages;
use crate::reconcile::{self, Reconciler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Committed,
    RolledBack,
}

/// A single seed run against a store.
///
/// Every stage writes through the same transaction. Any generator or writer
/// error rolls it back and is returned wrapped with the failing stage; there
/// is no partial resume.
pub struct SeedRun<S: Store> {
    store: S,
    config: SeedConfig,
    plan: Vec<Stage>,
    state: RunState,
    notifier: Option<Box<dyn Notifier>>,
    reconciler: Option<Box<dyn Reconciler>>,
}

impl<S: Store> SeedRun<S> {
    pub fn new(store: S, config: SeedConfig, plan: Vec<Stage>) -> Self {
        Self {
            store,
            config,
            plan,
            state: RunState::NotStarted,
            notifier: None,
            reconciler: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_reconciler(mut self, reconciler: Box<dyn Reconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn plan(&self) -> &[Stage] {
        &self.plan
    }

    /// Runs every stage, commits, then runs the post-commit hooks.
    pub async fn execute(&mut self) -> Result<RunReport, SeedError> {
        if self.state != RunState::NotStarted {
            return Err(SeedError::AlreadyFinished);
        }
        self.config.validate()?;

        let result = self.run_stages().await;

        if let Some(notifier) = &self.notifier {
            let message = match &result {
                Ok(report) => report.summary(),
                Err(e) => format!("Seed of {} failed: {e}", self.config.environment),
            };
            notify_quietly(notifier.as_ref(), &message, result.is_err()).await;
        }

        let report = result?;
        self.after_commit().await;
        Ok(report)
    }

    async fn run_stages(&mut self) -> Result<RunReport, SeedError> {
        let started = Instant::now();
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let env = self.config.environment;

        self.state = RunState::Running;
        info!(
            environment = %env,
            seed,
            batch_size = self.config.batch_size,
            stages = ?self.plan,
            "Starting seed run"
        );

        let writer = match self.store.begin().await {
            Ok(w) => w,
            Err(e) => {
                self.state = RunState::RolledBack;
                return Err(e.into());
            }
        };
        let mut ctx = RunContext::new(
            writer,
            self.config.clone(),
            StdRng::seed_from_u64(seed),
            OffsetDateTime::now_utc(),
        );

        let plan = self.plan.clone();
        let mut stage_reports = Vec::with_capacity(plan.len());
        for stage in plan {
            let stage_started = Instant::now();
            let before = ctx.generated_total();

            let outcome = match stages::run(stage, &mut ctx).await {
                Ok(()) => ctx.flush_all().await,
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                let e = e.in_stage(stage);
                error!(stage = %stage, error = %e, "Stage failed, rolling back");
                self.rollback(ctx.into_writer()).await;
                return Err(e);
            }

            let report = StageReport {
                stage,
                elapsed_ms: stage_started.elapsed().as_millis(),
                generated: ctx.generated_total() - before,
            };
            info!(
                stage = %stage,
                rows = report.generated,
                elapsed_ms = report.elapsed_ms,
                "Stage done"
            );
            stage_reports.push(report);
        }

        let tables = ctx.stats();
        if let Err(e) = ctx.into_writer().commit().await {
            self.state = RunState::RolledBack;
            error!(error = %e, "Commit failed");
            return Err(e.into());
        }
        self.state = RunState::Committed;

        for t in &tables {
            info!(
                table = t.table,
                generated = t.generated,
                written = t.written,
                skipped = t.skipped,
                batches = t.batches,
                "Table summary"
            );
        }

        let report = RunReport {
            environment: env,
            seed,
            state: self.state,
            stages: stage_reports,
            tables,
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            rows = report.written_total(),
            elapsed_ms = report.elapsed_ms,
            "Seed run committed"
        );
        Ok(report)
    }

    async fn rollback(&mut self, writer: S::Writer) {
        if let Err(e) = writer.rollback().await {
            warn!(error = %e, "Rollback failed");
        }
        self.state = RunState::RolledBack;
    }

    async fn after_commit(&self) {
        let Some(reconciler) = &self.reconciler else {
            return;
        };
        let fallback: &dyn Notifier = &LogNotifier;
        let notifier = self.notifier.as_deref().unwrap_or(fallback);
        let _ = reconcile::reconcile_after_seed(
            self.config.environment,
            &self.config.reconcile,
            reconciler.as_ref(),
            notifier,
            OffsetDateTime::now_utc(),
        )
        .await;
    }
}
