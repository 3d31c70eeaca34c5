//! Connector lifecycle trait and the event type it consumes.

use async_trait::async_trait;

use crate::error::Result;
use crate::value::Value;

/// A tagged, timestamped event delivered to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecord {
    /// Source label, e.g. `app.access`.
    pub tag: String,
    /// Event time in seconds since the epoch.
    pub time: i64,
    /// Nested event body.
    pub record: Value,
}

impl SinkRecord {
    pub fn new(tag: impl Into<String>, time: i64, record: Value) -> Self {
        Self {
            tag: tag.into(),
            time,
            record,
        }
    }
}

/// Trait that all sink connectors must implement.
#[async_trait]
pub trait SinkConnector: Send + Sync {
    /// Initialize the connector and prepare the destination.
    async fn start(&mut self) -> Result<()>;

    /// Accept a batch of records.
    ///
    /// Implementations may buffer records internally and defer the actual
    /// write until [`flush`](SinkConnector::flush) is called.
    async fn put(&mut self, records: &[SinkRecord]) -> Result<()>;

    /// Flush any buffered records to the external system.
    async fn flush(&mut self) -> Result<()>;

    /// Gracefully shut down the connector, flushing remaining data.
    async fn stop(&mut self) -> Result<()>;

    /// Return the unique name of this connector instance.
    fn name(&self) -> &str;
}
