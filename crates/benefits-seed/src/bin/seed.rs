//! Seed script - loads reference and demo data for one environment
//!
//! Run with:
//! ```
//! cargo run -p benefits-seed --bin seed -- --env staging
//! cargo run -p benefits-seed --bin seed -- --env local --dry-run --report-json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use benefits_seed::config::SeedConfig;
use benefits_seed::db::{MemoryStore, PgStore, Store};
use benefits_seed::errors::SeedError;
use benefits_seed::models::Environment;
use benefits_seed::notify::{self, Notifier};
use benefits_seed::pipeline::{RunReport, SeedRun, Stage, plan_for, restrict};
use benefits_seed::reconcile::{CommandReconciler, Reconciler};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Load reference and demo data for the benefits platform")]
struct Args {
    /// Target environment: production, staging, dev, or local.
    #[arg(long, env = "SEED_ENV")]
    env: Option<Environment>,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Rows per bulk insert.
    #[arg(long)]
    batch_size: Option<usize>,

    /// RNG seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Run only these stages (comma separated), in plan order.
    #[arg(long, value_delimiter = ',')]
    only: Vec<Stage>,

    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generate everything against an in-memory store.
    #[arg(long)]
    dry_run: bool,

    /// Apply schema migrations before seeding.
    #[arg(long)]
    migrate: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    report_json: bool,

    #[arg(long, env = "SEED_SLACK_WEBHOOK")]
    slack_webhook: Option<String>,

    /// Send notifications even from an interactive terminal.
    #[arg(long)]
    notify_force: bool,

    /// Reconcile translations after a successful seed.
    #[arg(long)]
    reconcile: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(SeedConfig, Vec<Stage>, RunTarget)> {
        let mut config = match &self.config {
            Some(path) => SeedConfig::from_json_file(path)?,
            None => SeedConfig::default(),
        };

        if let Some(env) = self.env {
            config.environment = env;
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.slack_webhook.is_some() {
            config.notify.slack_webhook = self.slack_webhook;
        }
        config.notify.force |= self.notify_force;
        config.reconcile.reconcile_after_seed |= self.reconcile;
        config.validate()?;

        let plan = restrict(plan_for(config.environment), &self.only);
        if plan.is_empty() {
            anyhow::bail!(
                "none of the requested stages run in {}",
                config.environment
            );
        }

        let target = if self.dry_run {
            RunTarget::Memory
        } else {
            RunTarget::Postgres {
                url: self
                    .database_url
                    .context("DATABASE_URL is required unless --dry-run is set")?,
                migrate: self.migrate,
            }
        };

        Ok((config, plan, target))
    }
}

enum RunTarget {
    Memory,
    Postgres { url: String, migrate: bool },
}

async fn execute<S: Store>(
    store: S,
    config: SeedConfig,
    plan: Vec<Stage>,
) -> anyhow::Result<RunReport> {
    let notifier: Box<dyn Notifier> = notify::from_config(&config.notify);
    let mut run = SeedRun::new(store, config.clone(), plan).with_notifier(notifier);

    if !config.reconcile.command.is_empty() {
        let reconciler: Box<dyn Reconciler> =
            Box::new(CommandReconciler::new(&config.reconcile.command)?);
        run = run.with_reconciler(reconciler);
    }

    Ok(run.execute().await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let report_json = args.report_json;
    let (config, plan, target) = args.into_config()?;

    let report = match target {
        RunTarget::Memory => {
            let store = MemoryStore::new();
            let report = execute(store.clone(), config, plan).await?;
            tracing::info!(rows = store.total_rows(), "Dry run complete, nothing written");
            report
        }
        RunTarget::Postgres { url, migrate } => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await?;
            tracing::info!("Connected to database");

            if migrate {
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .map_err(SeedError::from)?;
                tracing::info!("Migrations applied");
            }

            execute(PgStore::new(pool), config, plan).await?
        }
    };

    if report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
