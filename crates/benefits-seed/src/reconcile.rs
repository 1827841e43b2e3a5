//! Post-seed reconciliation of translations through an external command.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::process::Command;
use tracing::{error, warn};

use crate::config::ReconcileConfig;
use crate::models::Environment;
use crate::notify::{Notifier, notify_quietly};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Reconcile command is empty")]
    EmptyCommand,
    #[error("Throttle state {path}: {source}")]
    State {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How a reconciliation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Success(String),
    /// Finished, but reported problems.
    Warning(String),
    Failed(String),
}

impl ReconcileOutcome {
    pub fn output(&self) -> &str {
        match self {
            ReconcileOutcome::Success(s)
            | ReconcileOutcome::Warning(s)
            | ReconcileOutcome::Failed(s) => s,
        }
    }
}

#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn reconcile(&self) -> ReconcileOutcome;
}

/// Runs a program; exit code zero is success, any other code a warning.
#[derive(Debug, Clone)]
pub struct CommandReconciler {
    program: String,
    args: Vec<String>,
}

impl CommandReconciler {
    pub fn new(command: &[String]) -> Result<Self, ReconcileError> {
        let (program, args) = command.split_first().ok_or(ReconcileError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl Reconciler for CommandReconciler {
    async fn reconcile(&self) -> ReconcileOutcome {
        match Command::new(&self.program).args(&self.args).output().await {
            Ok(out) => {
                let mut text = String::from_utf8_lossy(&out.stdout).trim().to_string();
                let stderr = String::from_utf8_lossy(&out.stderr);
                if !stderr.trim().is_empty() {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(stderr.trim());
                }
                if out.status.success() {
                    ReconcileOutcome::Success(text)
                } else {
                    ReconcileOutcome::Warning(text)
                }
            }
            Err(e) => ReconcileOutcome::Failed(format!("{}: {e}", self.program)),
        }
    }
}

/// Remembers when reconciliation last succeeded, as unix seconds in a file.
#[derive(Debug, Clone)]
pub struct Throttle {
    path: PathBuf,
    window_secs: u64,
}

impl Throttle {
    pub fn new(path: impl Into<PathBuf>, window_secs: u64) -> Self {
        Self {
            path: path.into(),
            window_secs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unix time of the last success, if recorded.
    pub fn last_success(&self) -> Result<Option<i64>, ReconcileError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(raw.trim().parse().ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ReconcileError::State {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Seconds since the last success when it falls inside the window.
    pub fn active(&self, now: OffsetDateTime) -> Result<Option<u64>, ReconcileError> {
        Ok(self.last_success()?.and_then(|last| {
            let elapsed = now.unix_timestamp() - last;
            u64::try_from(elapsed)
                .ok()
                .filter(|e| *e < self.window_secs)
        }))
    }

    pub fn record(&self, now: OffsetDateTime) -> Result<(), ReconcileError> {
        std::fs::write(&self.path, now.unix_timestamp().to_string()).map_err(|source| {
            ReconcileError::State {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Why reconciliation did not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skipped {
    Environment,
    Disabled,
    Throttled { elapsed_secs: u64 },
}

/// Runs reconciliation after a committed seed when eligible.
///
/// Outside production and with `reconcile_after_seed` set, at most once per
/// throttle window. Every step is reported through `notifier`; nothing here
/// fails the seed.
pub async fn reconcile_after_seed(
    env: Environment,
    config: &ReconcileConfig,
    reconciler: &dyn Reconciler,
    notifier: &dyn Notifier,
    now: OffsetDateTime,
) -> Result<ReconcileOutcome, Skipped> {
    if env == Environment::Production {
        notify_quietly(
            notifier,
            "Skipping translation reconciliation (environment not eligible)",
            false,
        )
        .await;
        return Err(Skipped::Environment);
    }
    if !config.reconcile_after_seed {
        notify_quietly(
            notifier,
            "Skipping translation reconciliation (disabled in config)",
            false,
        )
        .await;
        return Err(Skipped::Disabled);
    }

    let throttle = Throttle::new(&config.state_file, config.throttle_secs);
    match throttle.active(now) {
        Ok(Some(elapsed_secs)) => {
            let message = format!(
                "Skipping reconciliation (already done {elapsed_secs}s ago, throttle: {}s)",
                config.throttle_secs
            );
            notify_quietly(notifier, &message, true).await;
            return Err(Skipped::Throttled { elapsed_secs });
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Ignoring unreadable throttle state"),
    }

    notify_quietly(notifier, "Starting translation reconciliation", false).await;
    let outcome = reconciler.reconcile().await;

    match &outcome {
        ReconcileOutcome::Success(_) => {
            notify_quietly(notifier, "Translation reconciliation completed successfully", true)
                .await;
            if let Err(e) = throttle.record(now) {
                warn!(error = %e, "Could not record reconciliation time");
            }
        }
        ReconcileOutcome::Warning(_) => {
            notify_quietly(notifier, "Translation reconciliation completed with warnings", true)
                .await;
        }
        ReconcileOutcome::Failed(reason) => {
            error!(reason = %reason, "Translation reconciliation failed");
            let message = format!("Translation reconciliation failed: {reason}");
            notify_quietly(notifier, &message, true).await;
        }
    }
    if !matches!(outcome, ReconcileOutcome::Failed(_)) && !outcome.output().is_empty() {
        notify_quietly(notifier, outcome.output(), false).await;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{LogNotifier, NotifyError};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(ReconcileOutcome, AtomicUsize);

    #[async_trait]
    impl Reconciler for Fixed {
        async fn reconcile(&self) -> ReconcileOutcome {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, bool)>>);

    #[async_trait]
    impl Notifier for Recording {
        async fn notify(&self, message: &str, force: bool) -> Result<(), NotifyError> {
            self.0
                .lock()
                .unwrap()
                .push((message.to_string(), force));
            Ok(())
        }
    }

    fn config(dir: &tempfile::TempDir) -> ReconcileConfig {
        ReconcileConfig {
            reconcile_after_seed: true,
            command: vec!["true".into()],
            throttle_secs: 300,
            state_file: dir.path().join("reconcile.state"),
        }
    }

    #[tokio::test]
    async fn test_production_never_reconciles() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = Fixed(ReconcileOutcome::Success(String::new()), AtomicUsize::new(0));
        let result = reconcile_after_seed(
            Environment::Production,
            &config(&dir),
            &reconciler,
            &LogNotifier,
            OffsetDateTime::now_utc(),
        )
        .await;
        assert_eq!(result, Err(Skipped::Environment));
        assert_eq!(reconciler.1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_starts_throttle_window() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let reconciler = Fixed(ReconcileOutcome::Success("ok".into()), AtomicUsize::new(0));
        let notifier = Recording::default();
        let now = OffsetDateTime::now_utc();

        let first = reconcile_after_seed(Environment::Dev, &config, &reconciler, &notifier, now).await;
        assert_eq!(first, Ok(ReconcileOutcome::Success("ok".into())));

        let later = now + time::Duration::seconds(60);
        let second =
            reconcile_after_seed(Environment::Dev, &config, &reconciler, &notifier, later).await;
        assert_eq!(second, Err(Skipped::Throttled { elapsed_secs: 60 }));
        assert_eq!(reconciler.1.load(Ordering::SeqCst), 1);

        let messages = notifier.0.lock().unwrap();
        assert!(messages.iter().any(|(m, force)| m.contains("successfully") && *force));
    }

    #[tokio::test]
    async fn test_warning_does_not_throttle() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let reconciler = Fixed(ReconcileOutcome::Warning("2 missing keys".into()), AtomicUsize::new(0));
        let now = OffsetDateTime::now_utc();

        for _ in 0..2 {
            let outcome =
                reconcile_after_seed(Environment::Staging, &config, &reconciler, &LogNotifier, now)
                    .await;
            assert!(matches!(outcome, Ok(ReconcileOutcome::Warning(_))));
        }
        assert_eq!(reconciler.1.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_program_fails_softly() {
        let reconciler = CommandReconciler::new(&["benefits-seed-no-such-program".to_string()]).unwrap();
        assert!(matches!(reconciler.reconcile().await, ReconcileOutcome::Failed(_)));
        assert!(matches!(CommandReconciler::new(&[]), Err(ReconcileError::EmptyCommand)));
    }
}
