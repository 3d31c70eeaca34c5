//! Record transformation (the format stage).
//!
//! Turns a nested event into a [`FlatRecord`] keyed by `family:column`, then
//! encodes it for the chunk buffer.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{TimeZone, Utc};

use crate::codec;
use crate::config::TimeEncoding;
use crate::error::Result;
use crate::mapping::RoutingTable;
use crate::value::Value;

/// Column-keyed values for one event.
pub type FlatRecord = BTreeMap<String, Value>;

/// Applies a [`RoutingTable`] to incoming events.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    routing: RoutingTable,
    time_encoding: TimeEncoding,
}

impl RecordTransformer {
    pub fn new(routing: RoutingTable, time_encoding: TimeEncoding) -> Self {
        Self {
            routing,
            time_encoding,
        }
    }

    /// Build the flat record for one event.
    ///
    /// The tag and time columns are written first; mapped fields are applied in
    /// route order and overwrite earlier values at the same column. Paths that
    /// do not resolve are left out.
    pub fn transform(&self, tag: &str, time: i64, record: &Value) -> FlatRecord {
        let mut flat = FlatRecord::new();

        if let Some(column) = self.routing.tag_column() {
            flat.insert(column.to_string(), Value::from(tag));
        }
        if let Some(column) = self.routing.time_column() {
            flat.insert(column.to_string(), self.encode_time(time));
        }

        for (path, column) in self.routing.routes() {
            match record.resolve_path(path) {
                Some(value) => {
                    flat.insert(column.to_string(), value.clone());
                }
                None => tracing::trace!(path, column, "field not present, skipping"),
            }
        }

        flat
    }

    /// Transform and encode one event into its buffer bytes.
    pub fn format(&self, tag: &str, time: i64, record: &Value) -> Result<Vec<u8>> {
        codec::encode_record(&self.transform(tag, time, record))
    }

    fn encode_time(&self, time: i64) -> Value {
        let TimeEncoding::Formatted(pattern) = &self.time_encoding else {
            return Value::Int(time);
        };

        let Some(dt) = Utc.timestamp_opt(time, 0).single() else {
            return Value::Int(time);
        };

        let mut formatted = String::new();
        match write!(formatted, "{}", dt.format(pattern)) {
            Ok(()) => Value::String(formatted),
            Err(_) => Value::Int(time),
        }
    }
}
