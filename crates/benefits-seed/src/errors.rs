use thiserror::Error;

use crate::db::WriteError;
use crate::pipeline::Stage;

#[derive(Debug, Error)]
pub enum SeedError {
    /// A generator was asked to work from missing reference data.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Write failed: {0}")]
    Write(#[from] WriteError),

    #[error("Stage `{stage}` failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<SeedError>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Run already finished")]
    AlreadyFinished,
}

impl SeedError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        SeedError::Precondition(msg.into())
    }

    /// Wraps an error with the stage that raised it.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ SeedError::Stage { .. } => already,
            other => SeedError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping stage wrappers.
    pub fn root(&self) -> &SeedError {
        match self {
            SeedError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}
