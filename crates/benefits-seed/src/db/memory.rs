//! In-memory transactional backend.
//!
//! Used by `--dry-run` and by tests. It enforces each table's unique keys,
//! records the size of every batch it receives, and can be told to fail a
//! specific write so rollback paths can be exercised.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::record::{Row, TableSpec, WriteMode};
use super::writer::{BulkWriter, Store, WriteError, WriteOutcome};

#[derive(Debug, Default, Clone)]
struct Tables {
    rows: HashMap<&'static str, Vec<Row>>,
}

#[derive(Debug, Default)]
struct Shared {
    committed: Tables,
    /// Batch sizes per table, in call order, across all transactions.
    writes: HashMap<&'static str, Vec<usize>>,
    /// Table name and zero-based write index that should fail.
    fail_at: Option<(&'static str, usize)>,
}

/// Cloneable handle to a set of in-memory tables.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes the `nth` (zero-based) write to `table` fail with a storage error.
    pub fn fail_write(&self, table: &'static TableSpec, nth: usize) {
        self.lock().fail_at = Some((table.name, nth));
    }

    /// Committed row count of a table.
    pub fn row_count(&self, table: &TableSpec) -> usize {
        self.lock()
            .committed
            .rows
            .get(table.name)
            .map_or(0, Vec::len)
    }

    /// Committed rows across every table.
    pub fn total_rows(&self) -> usize {
        self.lock().committed.rows.values().map(Vec::len).sum()
    }

    /// Committed rows of a table.
    pub fn rows(&self, table: &TableSpec) -> Vec<Row> {
        self.lock()
            .committed
            .rows
            .get(table.name)
            .cloned()
            .unwrap_or_default()
    }

    /// Sizes of every batch submitted for a table, committed or not.
    pub fn batch_sizes(&self, table: &TableSpec) -> Vec<usize> {
        self.lock()
            .writes
            .get(table.name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Writer = MemoryWriter;

    async fn begin(&self) -> Result<MemoryWriter, WriteError> {
        let staged = self.lock().committed.clone();
        Ok(MemoryWriter {
            store: self.clone(),
            staged,
        })
    }
}

/// Writer over a private copy of the tables, published on commit.
#[derive(Debug)]
pub struct MemoryWriter {
    store: MemoryStore,
    staged: Tables,
}

fn key_of(table: &TableSpec, key: &[&str], row: &Row) -> Vec<String> {
    key.iter()
        .map(|column| {
            table
                .column_index(column)
                .and_then(|i| row.get(i))
                .map(|v| v.key_fragment())
                .unwrap_or_default()
        })
        .collect()
}

#[async_trait]
impl BulkWriter for MemoryWriter {
    async fn write(
        &mut self,
        table: &'static TableSpec,
        rows: Vec<Row>,
        mode: WriteMode,
    ) -> Result<WriteOutcome, WriteError> {
        {
            let mut shared = self.store.lock();
            let calls = shared.writes.entry(table.name).or_default();
            let call_index = calls.len();
            calls.push(rows.len());
            if shared.fail_at == Some((table.name, call_index)) {
                return Err(WriteError::Storage {
                    table: table.name,
                    detail: format!("injected failure on write #{call_index}"),
                });
            }
        }

        let width = table.columns.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(WriteError::Arity {
                table: table.name,
                expected: width,
                actual: bad.len(),
            });
        }

        let existing = self.staged.rows.entry(table.name).or_default();
        let mut seen: Vec<HashSet<Vec<String>>> = table
            .unique_keys
            .iter()
            .map(|key| existing.iter().map(|r| key_of(table, key, r)).collect())
            .collect();

        let submitted = rows.len() as u64;
        let mut accepted = Vec::with_capacity(rows.len());

        'rows: for row in rows {
            let keys: Vec<Vec<String>> = table
                .unique_keys
                .iter()
                .map(|key| key_of(table, key, &row))
                .collect();

            for (i, key) in keys.iter().enumerate() {
                if seen[i].contains(key) {
                    match mode {
                        WriteMode::IgnoreConflicts => continue 'rows,
                        WriteMode::Strict => {
                            return Err(WriteError::Constraint {
                                table: table.name,
                                detail: format!(
                                    "duplicate key ({}) = ({})",
                                    table.unique_keys[i].join(", "),
                                    key.join(", ")
                                ),
                            });
                        }
                    }
                }
            }

            for (i, key) in keys.into_iter().enumerate() {
                seen[i].insert(key);
            }
            accepted.push(row);
        }

        let written = accepted.len() as u64;
        existing.extend(accepted);

        Ok(WriteOutcome { submitted, written })
    }

    async fn clear(&mut self, table: &'static TableSpec) -> Result<u64, WriteError> {
        let removed = self
            .staged
            .rows
            .remove(table.name)
            .map_or(0, |rows| rows.len());
        Ok(removed as u64)
    }

    async fn commit(self) -> Result<(), WriteError> {
        self.store.lock().committed = self.staged;
        Ok(())
    }

    async fn rollback(self) -> Result<(), WriteError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::record::Value;
    use crate::db::tables;
    use uuid::Uuid;

    fn pivot(financer: Uuid, module: Uuid) -> Row {
        vec![
            Value::Uuid(Uuid::new_v4()),
            Value::Uuid(financer),
            Value::Uuid(module),
            Value::Bool(true),
            Value::Null,
            Value::Null,
        ]
    }

    #[tokio::test]
    async fn test_rows_invisible_until_commit() {
        let store = MemoryStore::new();
        let mut writer = store.begin().await.unwrap();
        writer
            .write(
                &tables::FINANCER_MODULE,
                vec![pivot(Uuid::new_v4(), Uuid::new_v4())],
                WriteMode::Strict,
            )
            .await
            .unwrap();

        assert_eq!(store.row_count(&tables::FINANCER_MODULE), 0);
        writer.commit().await.unwrap();
        assert_eq!(store.row_count(&tables::FINANCER_MODULE), 1);
    }

    #[tokio::test]
    async fn test_strict_rejects_whole_batch() {
        let store = MemoryStore::new();
        let (f, m) = (Uuid::new_v4(), Uuid::new_v4());
        let mut writer = store.begin().await.unwrap();

        let err = writer
            .write(
                &tables::FINANCER_MODULE,
                vec![pivot(Uuid::new_v4(), Uuid::new_v4()), pivot(f, m), pivot(f, m)],
                WriteMode::Strict,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WriteError::Constraint { .. }));
        writer.commit().await.unwrap();
        assert_eq!(store.row_count(&tables::FINANCER_MODULE), 0);
    }

    #[tokio::test]
    async fn test_ignore_skips_composite_duplicates() {
        let store = MemoryStore::new();
        let (f, m) = (Uuid::new_v4(), Uuid::new_v4());
        let mut writer = store.begin().await.unwrap();

        let outcome = writer
            .write(
                &tables::FINANCER_MODULE,
                vec![pivot(f, m), pivot(f, m), pivot(f, Uuid::new_v4())],
                WriteMode::IgnoreConflicts,
            )
            .await
            .unwrap();

        assert_eq!(outcome.submitted, 3);
        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.skipped(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_clear() {
        let store = MemoryStore::new();
        let mut writer = store.begin().await.unwrap();
        writer
            .write(
                &tables::FINANCER_MODULE,
                vec![pivot(Uuid::new_v4(), Uuid::new_v4())],
                WriteMode::Strict,
            )
            .await
            .unwrap();
        writer.commit().await.unwrap();

        let mut writer = store.begin().await.unwrap();
        assert_eq!(writer.clear(&tables::FINANCER_MODULE).await.unwrap(), 1);
        writer.rollback().await.unwrap();

        assert_eq!(store.row_count(&tables::FINANCER_MODULE), 1);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.fail_write(&tables::FINANCER_MODULE, 1);
        let mut writer = store.begin().await.unwrap();

        let row = || vec![pivot(Uuid::new_v4(), Uuid::new_v4())];
        assert!(
            writer
                .write(&tables::FINANCER_MODULE, row(), WriteMode::Strict)
                .await
                .is_ok()
        );
        assert!(
            writer
                .write(&tables::FINANCER_MODULE, row(), WriteMode::Strict)
                .await
                .is_err()
        );
        assert_eq!(store.batch_sizes(&tables::FINANCER_MODULE), vec![1, 1]);
    }
}
