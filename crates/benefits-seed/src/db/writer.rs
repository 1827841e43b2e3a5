//! The bulk writer seam between the pipeline and a storage backend.

use async_trait::async_trait;
use thiserror::Error;

use super::record::{Row, TableSpec, WriteMode};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Constraint violation on {table}: {detail}")]
    Constraint { table: &'static str, detail: String },
    #[error("Row for {table} has {actual} values, expected {expected}")]
    Arity {
        table: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Storage error on {table}: {detail}")]
    Storage { table: &'static str, detail: String },
}

/// Result of writing one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    /// Rows handed to the writer.
    pub submitted: u64,
    /// Rows that were actually inserted.
    pub written: u64,
}

impl WriteOutcome {
    /// Rows dropped by ignore-conflicts mode.
    pub fn skipped(&self) -> u64 {
        self.submitted - self.written
    }
}

/// Writes batches inside one open transaction.
///
/// Rows become visible to other connections only after [`BulkWriter::commit`].
#[async_trait]
pub trait BulkWriter: Send {
    /// Inserts a non-empty batch of same-shaped rows in one operation.
    async fn write(
        &mut self,
        table: &'static TableSpec,
        rows: Vec<Row>,
        mode: WriteMode,
    ) -> Result<WriteOutcome, WriteError>;

    /// Deletes every row of a table, returning how many were removed.
    async fn clear(&mut self, table: &'static TableSpec) -> Result<u64, WriteError>;

    async fn commit(self) -> Result<(), WriteError>;

    async fn rollback(self) -> Result<(), WriteError>;
}

/// A storage backend able to open a transactional writer.
#[async_trait]
pub trait Store: Send + Sync {
    type Writer: BulkWriter;

    async fn begin(&self) -> Result<Self::Writer, WriteError>;
}
