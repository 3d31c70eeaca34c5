//! Startup schema bootstrap.
//!
//! Creates the target table with every column family the routing table needs
//! if it does not exist yet. An existing table is left untouched: families
//! missing from it only show up later as failed row writes.
//!
//! ```text
//! NotStarted -> CheckedExists -> Ready
//!                     |
//!                     +-> Created -> Ready
//! ```

use std::fmt;

use crate::error::{ConnectorError, Result};
use crate::mapping::RoutingTable;
use crate::store::ColumnFamilyStore;

/// Progress of the bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    NotStarted,
    CheckedExists,
    Created,
    Ready,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapState::NotStarted => write!(f, "NOT_STARTED"),
            BootstrapState::CheckedExists => write!(f, "CHECKED_EXISTS"),
            BootstrapState::Created => write!(f, "CREATED"),
            BootstrapState::Ready => write!(f, "READY"),
        }
    }
}

/// What the bootstrap did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    TableExisted,
    TableCreated { families: Vec<String> },
}

#[derive(Debug)]
pub struct SchemaBootstrapper {
    table: String,
    state: BootstrapState,
}

impl SchemaBootstrapper {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            state: BootstrapState::NotStarted,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Ensure the table exists. A bootstrapper that is already `Ready` does
    /// not contact the store again.
    ///
    /// Existence-check and create failures are returned as
    /// [`ConnectorError::BootstrapError`]. Not safe against another instance
    /// creating the same table concurrently.
    pub async fn run(
        &mut self,
        store: &dyn ColumnFamilyStore,
        routing: &RoutingTable,
    ) -> Result<BootstrapOutcome> {
        if self.state == BootstrapState::Ready {
            return Ok(BootstrapOutcome::TableExisted);
        }

        let exists = store.table_exists(&self.table).await.map_err(|e| {
            ConnectorError::BootstrapError(format!(
                "failed to check whether table '{}' exists: {}",
                self.table, e
            ))
        })?;
        self.state = BootstrapState::CheckedExists;

        if exists {
            tracing::info!(table = %self.table, "table exists, skipping column family setup");
            self.state = BootstrapState::Ready;
            return Ok(BootstrapOutcome::TableExisted);
        }

        let families = routing.column_families()?;
        store
            .create_table(&self.table, &families)
            .await
            .map_err(|e| {
                ConnectorError::BootstrapError(format!(
                    "failed to create table '{}': {}",
                    self.table, e
                ))
            })?;
        self.state = BootstrapState::Created;

        tracing::info!(
            table = %self.table,
            families = ?families,
            "created table"
        );
        self.state = BootstrapState::Ready;
        Ok(BootstrapOutcome::TableCreated {
            families: families.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowWrite;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn routing() -> RoutingTable {
        RoutingTable::compile(
            "foo=>event:foo,iam.nested=>event:nested",
            Some("event:tag"),
            Some("event:time"),
        )
        .unwrap()
    }

    // Counts calls and can fail either operation.
    #[derive(Default)]
    struct ScriptedStore {
        exists: bool,
        fail_check: bool,
        fail_create: bool,
        checks: AtomicUsize,
        creates: AtomicUsize,
    }

    #[async_trait]
    impl ColumnFamilyStore for ScriptedStore {
        async fn table_exists(&self, _table: &str) -> Result<bool> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if self.fail_check {
                return Err(ConnectorError::ConnectionError("refused".to_string()));
            }
            Ok(self.exists)
        }
        async fn create_table(&self, _table: &str, _families: &BTreeSet<String>) -> Result<()> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(ConnectorError::BackendError("TableExistsException".to_string()));
            }
            Ok(())
        }
        async fn write_row(&self, _row: &RowWrite) -> Result<()> {
            Ok(())
        }
    }

    // ---------------------------------------------------------------
    // Create path
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_creates_missing_table_with_deduplicated_families() {
        let store = MemoryStore::new();
        let mut bootstrapper = SchemaBootstrapper::new("events");
        assert_eq!(bootstrapper.state(), BootstrapState::NotStarted);

        let outcome = bootstrapper.run(&store, &routing()).await.unwrap();
        assert_eq!(
            outcome,
            BootstrapOutcome::TableCreated {
                families: vec!["event".to_string()]
            }
        );
        assert_eq!(bootstrapper.state(), BootstrapState::Ready);
        assert_eq!(store.families("events").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_table_is_not_modified() {
        let store = MemoryStore::new();
        let families: BTreeSet<String> = ["other".to_string()].into_iter().collect();
        store.create_table("events", &families).await.unwrap();

        let mut bootstrapper = SchemaBootstrapper::new("events");
        let outcome = bootstrapper.run(&store, &routing()).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::TableExisted);
        assert_eq!(store.families("events").await, Some(families));
    }

    #[tokio::test]
    async fn test_ready_bootstrapper_skips_store() {
        let store = ScriptedStore::default();
        let mut bootstrapper = SchemaBootstrapper::new("events");
        bootstrapper.run(&store, &routing()).await.unwrap();
        bootstrapper.run(&store, &routing()).await.unwrap();
        assert_eq!(store.checks.load(Ordering::SeqCst), 1);
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    // ---------------------------------------------------------------
    // Failures
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_check_failure_is_bootstrap_error() {
        let store = ScriptedStore {
            fail_check: true,
            ..Default::default()
        };
        let mut bootstrapper = SchemaBootstrapper::new("events");
        let err = bootstrapper.run(&store, &routing()).await.unwrap_err();
        assert!(matches!(err, ConnectorError::BootstrapError(_)));
        assert_eq!(bootstrapper.state(), BootstrapState::NotStarted);
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_failure_is_bootstrap_error() {
        let store = ScriptedStore {
            fail_create: true,
            ..Default::default()
        };
        let mut bootstrapper = SchemaBootstrapper::new("events");
        let err = bootstrapper.run(&store, &routing()).await.unwrap_err();
        assert!(matches!(err, ConnectorError::BootstrapError(_)));
        assert!(err.to_string().contains("TableExistsException"));
        assert_eq!(bootstrapper.state(), BootstrapState::CheckedExists);
    }

    #[tokio::test]
    async fn test_bad_destination_is_config_error() {
        let store = ScriptedStore::default();
        let routing = RoutingTable::compile("foo=>badcolumn", None, None).unwrap();
        let mut bootstrapper = SchemaBootstrapper::new("events");
        let err = bootstrapper.run(&store, &routing).await.unwrap_err();
        assert!(matches!(err, ConnectorError::ConfigError(_)));
        assert!(err.to_string().contains("badcolumn"));
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(BootstrapState::NotStarted.to_string(), "NOT_STARTED");
        assert_eq!(BootstrapState::Ready.to_string(), "READY");
    }
}
