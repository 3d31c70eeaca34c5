//! In-memory column-family store.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ColumnFamilyStore;
use crate::error::{ConnectorError, Result};
use crate::row::{RowValues, RowWrite};

#[derive(Debug, Default)]
struct MemoryTable {
    families: BTreeSet<String>,
    rows: HashMap<String, RowValues>,
    write_order: Vec<String>,
}

/// A store that keeps tables in process memory.
///
/// Writes to a missing table or an undeclared column family are rejected the
/// same way a real cluster would reject them. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column families of a table, or `None` if it does not exist.
    pub async fn families(&self, table: &str) -> Option<BTreeSet<String>> {
        let tables = self.tables.read().await;
        tables.get(table).map(|t| t.families.clone())
    }

    /// Rows of a table in the order they were first written.
    pub async fn rows(&self, table: &str) -> Vec<(String, RowValues)> {
        let tables = self.tables.read().await;
        let Some(t) = tables.get(table) else {
            return Vec::new();
        };
        t.write_order
            .iter()
            .filter_map(|id| t.rows.get(id).map(|values| (id.clone(), values.clone())))
            .collect()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ColumnFamilyStore for MemoryStore {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.tables.read().await.contains_key(table))
    }

    async fn create_table(&self, table: &str, families: &BTreeSet<String>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(table) {
            return Err(ConnectorError::BackendError(format!(
                "table '{}' already exists",
                table
            )));
        }
        if families.is_empty() {
            return Err(ConnectorError::BackendError(format!(
                "table '{}' needs at least one column family",
                table
            )));
        }
        tables.insert(
            table.to_string(),
            MemoryTable {
                families: families.clone(),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn write_row(&self, row: &RowWrite) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(&row.table).ok_or_else(|| {
            ConnectorError::BackendError(format!("table '{}' does not exist", row.table))
        })?;

        if let Some(unknown) = row.values.keys().find(|f| !table.families.contains(*f)) {
            return Err(ConnectorError::BackendError(format!(
                "column family '{}' does not exist in table '{}'",
                unknown, row.table
            )));
        }

        if !table.rows.contains_key(&row.row_id) {
            table.write_order.push(row.row_id.clone());
        }
        let stored = table.rows.entry(row.row_id.clone()).or_default();
        for (family, columns) in &row.values {
            stored
                .entry(family.clone())
                .or_default()
                .extend(columns.iter().map(|(c, v)| (c.clone(), v.clone())));
        }
        Ok(())
    }
}
