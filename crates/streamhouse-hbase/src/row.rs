//! Row assembly (the write stage).
//!
//! Decodes a flushed chunk, regroups each flat record by column family, and
//! writes one row per record. Rows are written strictly in chunk order; the
//! first failed write fails the whole chunk.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::codec::RecordDecoder;
use crate::config::RowIdStrategy;
use crate::error::{ConnectorError, Result};
use crate::store::ColumnFamilyStore;
use crate::transform::FlatRecord;
use crate::value::Value;

/// `family -> column -> value`.
pub type RowValues = BTreeMap<String, BTreeMap<String, Value>>;

/// A single row to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct RowWrite {
    pub table: String,
    pub row_id: String,
    pub values: RowValues,
}

/// Regroup a flat record by the text before the first `:` of each key.
pub fn group_columns(record: FlatRecord) -> Result<RowValues> {
    let mut values = RowValues::new();
    for (key, value) in record {
        let (family, column) = key.split_once(':').ok_or_else(|| {
            ConnectorError::SerializationError(format!(
                "column '{}' is not in 'family:column' form",
                key
            ))
        })?;
        values
            .entry(family.to_string())
            .or_default()
            .insert(column.to_string(), value);
    }
    Ok(values)
}

/// Generates row keys.
#[derive(Debug, Clone, Copy)]
pub struct RowIdGenerator {
    strategy: RowIdStrategy,
}

impl RowIdGenerator {
    pub fn new(strategy: RowIdStrategy) -> Self {
        Self { strategy }
    }

    pub fn next_id(&self) -> String {
        match self.strategy {
            RowIdStrategy::Random => Uuid::new_v4().to_string(),
            // Zero-padded so keys sort lexicographically by time.
            RowIdStrategy::TimePrefixed => format!(
                "{:013}-{}",
                Utc::now().timestamp_millis(),
                Uuid::new_v4().simple()
            ),
        }
    }
}

/// Turns decoded records into row writes for one table.
#[derive(Debug, Clone)]
pub struct RowAssembler {
    table: String,
    ids: RowIdGenerator,
}

impl RowAssembler {
    pub fn new(table: impl Into<String>, strategy: RowIdStrategy) -> Self {
        Self {
            table: table.into(),
            ids: RowIdGenerator::new(strategy),
        }
    }

    /// Build the row write for one record with a fresh row id.
    pub fn assemble(&self, record: FlatRecord) -> Result<RowWrite> {
        Ok(RowWrite {
            table: self.table.clone(),
            row_id: self.ids.next_id(),
            values: group_columns(record)?,
        })
    }

    /// Decode `chunk` and write every record to `store`, one row at a time.
    ///
    /// Records without any cells are skipped, since a put needs at least one
    /// column. Returns the number of rows written. Rows written before a
    /// failure stay written; redelivering the chunk writes them again under
    /// new ids.
    pub async fn write_chunk(&self, store: &dyn ColumnFamilyStore, chunk: &[u8]) -> Result<usize> {
        let mut written = 0;

        for decoded in RecordDecoder::new(chunk) {
            let row = self.assemble(decoded?)?;
            if row.values.is_empty() {
                tracing::debug!(table = %self.table, "record has no cells, skipping row");
                continue;
            }

            if let Err(e) = store.write_row(&row).await {
                tracing::error!(
                    table = %self.table,
                    row_id = %row.row_id,
                    written,
                    error = %e,
                    "row write failed"
                );
                return Err(ConnectorError::WriteError(format!(
                    "failed to write row '{}' to table '{}': {}",
                    row.row_id, self.table, e
                )));
            }
            written += 1;
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_record;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIME: i64 = 1_293_974_055;

    fn flat(foo: &str, nested: &str) -> FlatRecord {
        let mut r = FlatRecord::new();
        r.insert("event:tag".to_string(), Value::from("test"));
        r.insert("event:time".to_string(), Value::Int(TIME));
        r.insert("event:foo".to_string(), Value::from(foo));
        r.insert("event:nested".to_string(), Value::from(nested));
        r
    }

    fn chunk(records: &[FlatRecord]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|r| encode_record(r).unwrap())
            .collect()
    }

    async fn event_store() -> MemoryStore {
        let store = MemoryStore::new();
        let families: BTreeSet<String> = ["event".to_string()].into_iter().collect();
        store.create_table("events", &families).await.unwrap();
        store
    }

    // A store whose writes start failing after `fail_after` rows.
    struct FlakyStore {
        inner: MemoryStore,
        fail_after: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ColumnFamilyStore for FlakyStore {
        async fn table_exists(&self, table: &str) -> Result<bool> {
            self.inner.table_exists(table).await
        }
        async fn create_table(&self, table: &str, families: &BTreeSet<String>) -> Result<()> {
            self.inner.create_table(table, families).await
        }
        async fn write_row(&self, row: &RowWrite) -> Result<()> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
                return Err(ConnectorError::ConnectionError("region server down".to_string()));
            }
            self.inner.write_row(row).await
        }
    }

    // ---------------------------------------------------------------
    // Grouping
    // ---------------------------------------------------------------

    #[test]
    fn test_group_single_family() {
        let values = group_columns(flat("foo1", "nested1")).unwrap();
        assert_eq!(values.len(), 1);

        let event = &values["event"];
        assert_eq!(event["tag"], Value::from("test"));
        assert_eq!(event["time"], Value::Int(TIME));
        assert_eq!(event["foo"], Value::from("foo1"));
        assert_eq!(event["nested"], Value::from("nested1"));
    }

    #[test]
    fn test_group_multiple_families() {
        let mut r = FlatRecord::new();
        r.insert("a:x".to_string(), Value::Int(1));
        r.insert("b:y".to_string(), Value::Int(2));
        r.insert("a:z".to_string(), Value::Int(3));

        let values = group_columns(r).unwrap();
        assert_eq!(values["a"].len(), 2);
        assert_eq!(values["b"]["y"], Value::Int(2));
    }

    #[test]
    fn test_group_splits_on_first_colon() {
        let mut r = FlatRecord::new();
        r.insert("event:a:b".to_string(), Value::Bool(true));
        let values = group_columns(r).unwrap();
        assert_eq!(values["event"]["a:b"], Value::Bool(true));
    }

    #[test]
    fn test_group_rejects_key_without_family() {
        let mut r = FlatRecord::new();
        r.insert("nofamily".to_string(), Value::Null);
        let err = group_columns(r).unwrap_err();
        assert!(err.to_string().contains("nofamily"));
    }

    // ---------------------------------------------------------------
    // Row ids
    // ---------------------------------------------------------------

    #[test]
    fn test_random_ids_are_unique() {
        let ids = RowIdGenerator::new(RowIdStrategy::Random);
        let generated: HashSet<String> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(generated.len(), 1000);
        assert!(generated.iter().all(|id| Uuid::parse_str(id).is_ok()));
    }

    #[test]
    fn test_time_prefixed_ids() {
        let ids = RowIdGenerator::new(RowIdStrategy::TimePrefixed);
        let before = Utc::now().timestamp_millis();
        let id = ids.next_id();

        let (prefix, suffix) = id.split_once('-').unwrap();
        assert_eq!(prefix.len(), 13);
        assert!(prefix.parse::<i64>().unwrap() >= before);
        assert_eq!(suffix.len(), 32);
        assert_ne!(id, ids.next_id());
    }

    #[test]
    fn test_time_prefixed_ids_sort_by_time() {
        let ids = RowIdGenerator::new(RowIdStrategy::TimePrefixed);
        let first = ids.next_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = ids.next_id();
        assert!(first < second);
    }

    // ---------------------------------------------------------------
    // Assembly and chunk writes
    // ---------------------------------------------------------------

    #[test]
    fn test_assemble() {
        let assembler = RowAssembler::new("events", RowIdStrategy::Random);
        let row = assembler.assemble(flat("foo1", "nested1")).unwrap();
        assert_eq!(row.table, "events");
        assert!(!row.row_id.is_empty());
        assert_eq!(row.values["event"].len(), 4);

        let again = assembler.assemble(flat("foo1", "nested1")).unwrap();
        assert_ne!(row.row_id, again.row_id);
    }

    #[tokio::test]
    async fn test_write_chunk_in_order() {
        let store = event_store().await;
        let assembler = RowAssembler::new("events", RowIdStrategy::Random);
        let bytes = chunk(&[flat("foo1", "nested1"), flat("foo2", "nested2")]);

        let written = assembler.write_chunk(&store, &bytes).await.unwrap();
        assert_eq!(written, 2);

        let rows = store.rows("events").await;
        assert_eq!(rows[0].1["event"]["foo"], Value::from("foo1"));
        assert_eq!(rows[1].1["event"]["foo"], Value::from("foo2"));
    }

    #[tokio::test]
    async fn test_write_empty_chunk() {
        let store = event_store().await;
        let assembler = RowAssembler::new("events", RowIdStrategy::Random);
        assert_eq!(assembler.write_chunk(&store, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_chunk_fails_on_first_bad_row() {
        let store = FlakyStore {
            inner: event_store().await,
            fail_after: 1,
            attempts: AtomicUsize::new(0),
        };
        let assembler = RowAssembler::new("events", RowIdStrategy::Random);
        let bytes = chunk(&[flat("a", "1"), flat("b", "2"), flat("c", "3")]);

        let err = assembler.write_chunk(&store, &bytes).await.unwrap_err();
        assert!(matches!(err, ConnectorError::WriteError(_)));
        assert!(err.to_string().contains("region server down"));
        // No further rows are attempted after the failure.
        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(store.inner.row_count("events").await, 1);
    }

    #[tokio::test]
    async fn test_write_chunk_skips_records_without_cells() {
        let store = event_store().await;
        let assembler = RowAssembler::new("events", RowIdStrategy::Random);
        let bytes = chunk(&[FlatRecord::new(), flat("a", "1"), FlatRecord::new()]);

        let written = assembler.write_chunk(&store, &bytes).await.unwrap();
        assert_eq!(written, 1);

        let rows = store.rows("events").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1["event"]["foo"], Value::from("a"));
    }

    #[tokio::test]
    async fn test_write_chunk_unknown_family_fails() {
        let store = event_store().await;
        let assembler = RowAssembler::new("events", RowIdStrategy::Random);
        let mut r = FlatRecord::new();
        r.insert("other:x".to_string(), Value::Int(1));

        let err = assembler.write_chunk(&store, &chunk(&[r])).await.unwrap_err();
        assert!(matches!(err, ConnectorError::WriteError(_)));
    }

    #[tokio::test]
    async fn test_write_chunk_corrupt_bytes() {
        let store = event_store().await;
        let assembler = RowAssembler::new("events", RowIdStrategy::Random);
        let mut bytes = chunk(&[flat("a", "1")]);
        bytes.push(0x05);

        let err = assembler.write_chunk(&store, &bytes).await.unwrap_err();
        assert!(matches!(err, ConnectorError::SerializationError(_)));
        assert_eq!(store.row_count("events").await, 1);
    }
}
