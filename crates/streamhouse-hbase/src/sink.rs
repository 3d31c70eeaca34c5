//! HBase Sink Connector
//!
//! Maps nested event records onto HBase columns. Each record is flattened
//! according to `fields_to_columns_mapping` and appended to an in-memory chunk;
//! flushing the chunk writes one row per record with a generated row key.
//!
//! See [`crate::config`] for the configuration keys.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;

use crate::bootstrap::{BootstrapOutcome, BootstrapState, SchemaBootstrapper};
use crate::config::HBaseSinkConfig;
use crate::error::Result;
use crate::row::RowAssembler;
use crate::store::{ColumnFamilyStore, RestStore};
use crate::traits::{SinkConnector, SinkRecord};
use crate::transform::RecordTransformer;
use crate::value::Value;

/// HBase Sink Connector implementation.
///
/// Holds one store handle for its whole lifetime. A chunk that fails to
/// flush with a retryable error is kept and written again by the next flush,
/// which can duplicate rows that were already written. Any other failure
/// drops the chunk so later records are not stuck behind it.
pub struct HBaseSinkConnector {
    name: String,
    config: HBaseSinkConfig,
    transformer: RecordTransformer,
    assembler: RowAssembler,
    bootstrapper: SchemaBootstrapper,
    store: Arc<dyn ColumnFamilyStore>,
    chunk: BytesMut,
    pending: usize,
}

impl HBaseSinkConnector {
    /// Create a new connector writing to the REST gateway named in the config map.
    pub fn new(name: &str, config_map: &HashMap<String, String>) -> Result<Self> {
        let config = HBaseSinkConfig::from_config_map(config_map)?;
        Self::with_config(name, config)
    }

    /// Create with an already-parsed config.
    pub fn with_config(name: &str, config: HBaseSinkConfig) -> Result<Self> {
        let store = Arc::new(RestStore::new(&config.storage_url())?);
        Ok(Self::with_store(name, config, store))
    }

    /// Create with an injected store (useful for testing and dry runs).
    pub fn with_store(
        name: &str,
        config: HBaseSinkConfig,
        store: Arc<dyn ColumnFamilyStore>,
    ) -> Self {
        let transformer =
            RecordTransformer::new(config.routing.clone(), config.time_encoding.clone());
        let assembler = RowAssembler::new(config.storage_table.clone(), config.row_id_strategy);
        let bootstrapper = SchemaBootstrapper::new(config.storage_table.clone());
        Self {
            name: name.to_string(),
            config,
            transformer,
            assembler,
            bootstrapper,
            store,
            chunk: BytesMut::new(),
            pending: 0,
        }
    }

    pub fn config(&self) -> &HBaseSinkConfig {
        &self.config
    }

    pub fn bootstrap_state(&self) -> BootstrapState {
        self.bootstrapper.state()
    }

    /// Number of records waiting in the current chunk.
    pub fn pending_records(&self) -> usize {
        self.pending
    }

    /// Flatten and encode one event.
    pub fn format(&self, tag: &str, time: i64, record: &Value) -> Result<Vec<u8>> {
        self.transformer.format(tag, time, record)
    }

    /// Write every record of a chunk produced by [`format`](Self::format).
    pub async fn write(&self, chunk: &[u8]) -> Result<usize> {
        self.assembler.write_chunk(self.store.as_ref(), chunk).await
    }

    async fn flush_chunk(&mut self) -> Result<()> {
        if self.chunk.is_empty() {
            return Ok(());
        }

        let result = self.write(&self.chunk).await;
        let written = match result {
            Ok(written) => written,
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    connector = %self.name,
                    records = self.pending,
                    error = %e,
                    "flush failed, keeping chunk for redelivery"
                );
                return Err(e);
            }
            Err(e) => {
                tracing::error!(
                    connector = %self.name,
                    records = self.pending,
                    error = %e,
                    "flush failed permanently, dropping chunk"
                );
                self.chunk.clear();
                self.pending = 0;
                return Err(e);
            }
        };
        self.chunk.clear();
        self.pending = 0;

        tracing::debug!(
            connector = %self.name,
            table = %self.config.storage_table,
            rows = written,
            "flushed chunk to HBase"
        );
        Ok(())
    }
}

#[async_trait]
impl SinkConnector for HBaseSinkConnector {
    async fn start(&mut self) -> Result<()> {
        let outcome = self
            .bootstrapper
            .run(self.store.as_ref(), &self.config.routing)
            .await?;

        match outcome {
            BootstrapOutcome::TableExisted => {
                tracing::info!(
                    connector = %self.name,
                    table = %self.config.storage_table,
                    "HBase sink connector started"
                );
            }
            BootstrapOutcome::TableCreated { families } => {
                tracing::info!(
                    connector = %self.name,
                    table = %self.config.storage_table,
                    families = families.len(),
                    "HBase sink connector started with new table"
                );
            }
        }
        Ok(())
    }

    async fn put(&mut self, records: &[SinkRecord]) -> Result<()> {
        for record in records {
            let bytes = self.format(&record.tag, record.time, &record.record)?;
            self.chunk.extend_from_slice(&bytes);
            self.pending += 1;
        }

        if self.pending >= self.config.batch_size {
            self.flush_chunk().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.flush_chunk().await
    }

    async fn stop(&mut self) -> Result<()> {
        self.flush().await?;
        tracing::info!(connector = %self.name, "HBase sink connector stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
