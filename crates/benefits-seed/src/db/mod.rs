//! Storage layer for seeding.
//!
//! Generated records are turned into [`Row`]s and handed to a [`BulkWriter`]
//! opened from a [`Store`]. [`PgStore`] writes to Postgres; [`MemoryStore`]
//! keeps everything in process for dry runs and tests.

mod memory;
mod postgres;
mod record;
pub mod tables;
mod writer;

pub use memory::{MemoryStore, MemoryWriter};
pub use postgres::{PgStore, PgWriter, rows_per_statement};
pub use record::{Record, Row, TableSpec, Value, WriteMode};
pub use writer::{BulkWriter, Store, WriteError, WriteOutcome};
