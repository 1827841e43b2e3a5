//! PostgreSQL backend built on sqlx.

use async_trait::async_trait;
use sqlx::postgres::Postgres;
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder, Transaction};
use tracing::debug;

use super::record::{Row, TableSpec, Value, WriteMode};
use super::writer::{BulkWriter, Store, WriteError, WriteOutcome};

/// Postgres refuses statements with more bind parameters than this.
const MAX_BIND_PARAMS: usize = 65_535;

/// Number of rows that fit in one statement for a table of `columns` width.
pub fn rows_per_statement(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).max(1)
}

/// Store backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the pool for advanced usage.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    type Writer = PgWriter;

    async fn begin(&self) -> Result<PgWriter, WriteError> {
        let tx = self.pool.begin().await?;
        Ok(PgWriter { tx })
    }
}

/// Writer holding the run's open transaction.
pub struct PgWriter {
    tx: Transaction<'static, Postgres>,
}

impl PgWriter {
    async fn insert_chunk(
        &mut self,
        table: &'static TableSpec,
        rows: &[Row],
        mode: WriteMode,
    ) -> Result<u64, WriteError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            table.name,
            table.columns.join(", ")
        ));

        qb.push_values(rows, |mut b, row| {
            for value in row {
                match value {
                    Value::Null => {
                        b.push("NULL");
                    }
                    Value::Bool(v) => {
                        b.push_bind(*v);
                    }
                    Value::Int(v) => {
                        b.push_bind(*v);
                    }
                    Value::Float(v) => {
                        b.push_bind(*v);
                    }
                    Value::Text(v) => {
                        b.push_bind(v.clone());
                    }
                    Value::Uuid(v) => {
                        b.push_bind(*v);
                    }
                    Value::Date(v) => {
                        b.push_bind(*v);
                    }
                    Value::Timestamp(v) => {
                        b.push_bind(*v);
                    }
                    Value::Json(v) => {
                        b.push_bind(Json(v.clone()));
                    }
                }
            }
        });

        if mode == WriteMode::IgnoreConflicts {
            qb.push(" ON CONFLICT DO NOTHING");
        }

        let result = qb
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(|e| classify(table, e))?;

        Ok(result.rows_affected())
    }
}

/// Maps uniqueness and foreign-key violations to [`WriteError::Constraint`].
fn classify(table: &'static TableSpec, err: sqlx::Error) -> WriteError {
    if let sqlx::Error::Database(db) = &err
        && (db.is_unique_violation() || db.is_foreign_key_violation())
    {
        return WriteError::Constraint {
            table: table.name,
            detail: db.message().to_string(),
        };
    }
    WriteError::Database(err)
}

#[async_trait]
impl BulkWriter for PgWriter {
    async fn write(
        &mut self,
        table: &'static TableSpec,
        rows: Vec<Row>,
        mode: WriteMode,
    ) -> Result<WriteOutcome, WriteError> {
        let width = table.columns.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(WriteError::Arity {
                table: table.name,
                expected: width,
                actual: bad.len(),
            });
        }

        let mut written = 0;
        for chunk in rows.chunks(rows_per_statement(width)) {
            written += self.insert_chunk(table, chunk, mode).await?;
        }

        debug!(
            "Wrote {}/{} rows into {} ({})",
            written,
            rows.len(),
            table.name,
            mode.as_str()
        );

        Ok(WriteOutcome {
            submitted: rows.len() as u64,
            written,
        })
    }

    async fn clear(&mut self, table: &'static TableSpec) -> Result<u64, WriteError> {
        let result = sqlx::query(&format!("DELETE FROM {}", table.name))
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<(), WriteError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), WriteError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
