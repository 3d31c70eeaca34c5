//! Column-family storage backends.
//!
//! The sink talks to storage only through [`ColumnFamilyStore`]. A single store
//! handle is created at startup and shared for the lifetime of the connector.
//!
//! - [`MemoryStore`]: in-process tables, used for tests and dry runs.
//! - [`RestStore`]: an HBase REST gateway.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::row::RowWrite;

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Operations the sink needs from a column-family store.
#[async_trait]
pub trait ColumnFamilyStore: Send + Sync {
    /// Whether a table with this name exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Create a table with the given column families.
    async fn create_table(&self, table: &str, families: &BTreeSet<String>) -> Result<()>;

    /// Persist one row.
    async fn write_row(&self, row: &RowWrite) -> Result<()>;
}
