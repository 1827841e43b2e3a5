//! Per-run state handed to every stage.

use std::collections::HashMap;

use rand::rngs::StdRng;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::config::SeedConfig;
use crate::db::{BulkWriter, Record, Row, TableSpec, WriteError, WriteMode};
use crate::errors::SeedError;
use crate::generators::catalog::{self, Division, Financer, Module};
use crate::pipeline::batch::Batch;

/// Row counters for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub table: &'static str,
    /// Rows appended to the batch.
    pub generated: u64,
    /// Rows the store accepted.
    pub written: u64,
    /// Rows dropped by ignore-conflicts writes.
    pub skipped: u64,
    /// Bulk write calls.
    pub batches: u64,
}

struct TableBatch {
    table: &'static TableSpec,
    mode: WriteMode,
    rows: Batch<Row>,
    stats: TableStats,
}

/// Reference collections produced earlier in the run.
///
/// The catalog entries are known up front; users and articles are filled in
/// by the stages that create them.
#[derive(Debug, Clone, Default)]
pub struct References {
    pub divisions: Vec<Division>,
    pub financers: Vec<Financer>,
    pub modules: Vec<Module>,
    users: HashMap<Uuid, Vec<Uuid>>,
    invited: HashMap<Uuid, u64>,
    articles: HashMap<Uuid, Vec<Uuid>>,
}

impl References {
    pub fn for_config(config: &SeedConfig) -> Self {
        let mut financers = catalog::financers_for(config.environment);
        if let Some(limit) = config.financer_limit {
            financers.truncate(limit);
        }
        Self {
            divisions: catalog::divisions_for(config.environment),
            financers,
            modules: catalog::MODULES.to_vec(),
            ..Default::default()
        }
    }

    pub fn add_user(&mut self, financer_id: Uuid, user_id: Uuid) {
        self.users.entry(financer_id).or_default().push(user_id);
    }

    pub fn add_invitation(&mut self, financer_id: Uuid) {
        *self.invited.entry(financer_id).or_default() += 1;
    }

    pub fn add_article(&mut self, financer_id: Uuid, article_id: Uuid) {
        self.articles.entry(financer_id).or_default().push(article_id);
    }

    /// Users registered to a financer during this run.
    pub fn users_of(&self, financer_id: Uuid) -> &[Uuid] {
        self.users.get(&financer_id).map_or(&[], Vec::as_slice)
    }

    pub fn invited_to(&self, financer_id: Uuid) -> u64 {
        self.invited.get(&financer_id).copied().unwrap_or(0)
    }

    pub fn articles_of(&self, financer_id: Uuid) -> &[Uuid] {
        self.articles.get(&financer_id).map_or(&[], Vec::as_slice)
    }

    pub fn has_users(&self) -> bool {
        self.users.values().any(|u| !u.is_empty())
    }
}

/// Batches, counters, randomness, and references for one seed run.
///
/// Each table has its own batch and a full batch writes only itself. Stages
/// push one entity type completely and [`flush`](Self::flush) it before
/// starting the next, so referenced rows land before the rows pointing at
/// them and a table of `M` rows takes `ceil(M / N)` writes.
pub struct RunContext<W: BulkWriter> {
    writer: W,
    config: SeedConfig,
    batches: Vec<TableBatch>,
    pub rng: StdRng,
    /// Reference time for every generated timestamp.
    pub now: OffsetDateTime,
    pub refs: References,
}

impl<W: BulkWriter> RunContext<W> {
    pub fn new(writer: W, config: SeedConfig, rng: StdRng, now: OffsetDateTime) -> Self {
        let refs = References::for_config(&config);
        Self {
            writer,
            config,
            batches: Vec::new(),
            rng,
            now,
            refs,
        }
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    /// Appends one record to its table's batch, writing when the batch is full.
    pub async fn push<R: Record>(&mut self, record: R) -> Result<(), SeedError> {
        let table = R::TABLE;
        let row = record.into_row();
        if row.len() != table.columns.len() {
            return Err(WriteError::Arity {
                table: table.name,
                expected: table.columns.len(),
                actual: row.len(),
            }
            .into());
        }

        let index = self.batch_index(table);
        let entry = &mut self.batches[index];
        entry.rows.append(row);
        entry.stats.generated += 1;

        if entry.rows.should_flush() {
            self.flush_at(index).await?;
        }
        Ok(())
    }

    /// Writes the pending remainder of one table.
    pub async fn flush(&mut self, table: &'static TableSpec) -> Result<(), SeedError> {
        match self.batches.iter().position(|b| b.table == table) {
            Some(index) => self.flush_at(index).await,
            None => Ok(()),
        }
    }

    /// Writes every pending batch, in first-use order.
    pub async fn flush_all(&mut self) -> Result<(), SeedError> {
        for index in 0..self.batches.len() {
            self.flush_at(index).await?;
        }
        Ok(())
    }

    /// Deletes every row of a table inside the run's transaction.
    pub async fn clear(&mut self, table: &'static TableSpec) -> Result<u64, SeedError> {
        if let Some(entry) = self.batches.iter_mut().find(|b| b.table == table) {
            entry.rows.drain();
        }
        let removed = self.writer.clear(table).await?;
        debug!(table = table.name, removed, "Cleared table");
        Ok(removed)
    }

    /// Counters for every table touched so far, in first-use order.
    pub fn stats(&self) -> Vec<TableStats> {
        self.batches.iter().map(|b| b.stats.clone()).collect()
    }

    pub fn generated_total(&self) -> u64 {
        self.batches.iter().map(|b| b.stats.generated).sum()
    }

    /// Ends the run's use of the context, handing back the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn batch_index(&mut self, table: &'static TableSpec) -> usize {
        if let Some(i) = self.batches.iter().position(|b| b.table == table) {
            return i;
        }
        self.batches.push(TableBatch {
            table,
            mode: self.config.write_mode_for(table),
            rows: Batch::new(self.config.batch_size),
            stats: TableStats {
                table: table.name,
                ..Default::default()
            },
        });
        self.batches.len() - 1
    }

    async fn flush_at(&mut self, index: usize) -> Result<(), SeedError> {
        let entry = &mut self.batches[index];
        if entry.rows.is_empty() {
            return Ok(());
        }
        let rows = entry.rows.drain();
        let outcome = self.writer.write(entry.table, rows, entry.mode).await?;
        entry.stats.written += outcome.written;
        entry.stats.skipped += outcome.skipped();
        entry.stats.batches += 1;
        debug!(
            table = entry.table.name,
            submitted = outcome.submitted,
            written = outcome.written,
            mode = entry.mode.as_str(),
            "Flushed batch"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, MemoryWriter, Store, Value, tables};
    use rand::SeedableRng;

    struct RawDivision(Row);

    impl Record for RawDivision {
        const TABLE: &'static TableSpec = &tables::DIVISIONS;

        fn into_row(self) -> Row {
            self.0
        }
    }

    fn division(name: &str) -> RawDivision {
        RawDivision(vec![
            Value::Uuid(Uuid::new_v4()),
            name.into(),
            "BE".into(),
            "EUR".into(),
            Value::Null,
            Value::Null,
        ])
    }

    struct RawModule(Row);

    impl Record for RawModule {
        const TABLE: &'static TableSpec = &tables::MODULES;

        fn into_row(self) -> Row {
            self.0
        }
    }

    fn module() -> RawModule {
        let mut row = vec![Value::Null; tables::MODULES.columns.len()];
        row[0] = Value::Uuid(Uuid::new_v4());
        RawModule(row)
    }

    async fn context(store: &MemoryStore, batch_size: usize) -> RunContext<MemoryWriter> {
        let config = SeedConfig {
            batch_size,
            ..Default::default()
        };
        RunContext::new(
            store.begin().await.unwrap(),
            config,
            StdRng::seed_from_u64(1),
            OffsetDateTime::now_utc(),
        )
    }

    #[tokio::test]
    async fn test_push_flushes_full_batches() {
        let store = MemoryStore::new();
        let mut ctx = context(&store, 2).await;
        for i in 0..5 {
            ctx.push(division(&format!("d{i}"))).await.unwrap();
        }
        assert_eq!(store.batch_sizes(&tables::DIVISIONS), vec![2, 2]);

        ctx.flush_all().await.unwrap();
        assert_eq!(store.batch_sizes(&tables::DIVISIONS), vec![2, 2, 1]);

        let stats = ctx.stats();
        assert_eq!(stats[0].generated, 5);
        assert_eq!(stats[0].written, 5);
        assert_eq!(stats[0].batches, 3);
    }

    #[tokio::test]
    async fn test_full_batch_leaves_other_tables_pending() {
        let store = MemoryStore::new();
        let mut ctx = context(&store, 3).await;
        for i in 0..7 {
            ctx.push(division(&format!("d{i}"))).await.unwrap();
            ctx.push(module()).await.unwrap();
        }
        assert_eq!(store.batch_sizes(&tables::DIVISIONS), vec![3, 3]);
        assert_eq!(store.batch_sizes(&tables::MODULES), vec![3, 3]);

        ctx.flush(&tables::MODULES).await.unwrap();
        assert_eq!(store.batch_sizes(&tables::MODULES), vec![3, 3, 1]);
        assert_eq!(store.batch_sizes(&tables::DIVISIONS), vec![3, 3]);

        ctx.flush_all().await.unwrap();
        assert_eq!(store.batch_sizes(&tables::DIVISIONS), vec![3, 3, 1]);
        assert_eq!(store.batch_sizes(&tables::MODULES), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_wrong_arity_rejected_on_push() {
        let store = MemoryStore::new();
        let mut ctx = context(&store, 10).await;
        let err = ctx
            .push(RawDivision(vec![Value::Null]))
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::Write(WriteError::Arity { .. })));
        assert!(ctx.stats().is_empty());
    }

    #[test]
    fn test_references_start_from_catalog() {
        let refs = References::for_config(&SeedConfig::default());
        assert_eq!(refs.modules.len(), catalog::MODULES.len());
        assert!(!refs.financers.is_empty());
        assert!(!refs.has_users());
        assert!(refs.users_of(Uuid::new_v4()).is_empty());
    }
}
