//! Configuration for the HBase sink.
//!
//! ## Configuration
//!
//! | Key                         | Description                                   | Default     |
//! |-----------------------------|-----------------------------------------------|-------------|
//! | `fields_to_columns_mapping` | Comma-separated `path=>family:column` pairs   | required    |
//! | `storage_table`             | Target table name                             | required    |
//! | `tag_column_name`           | Column receiving the event tag                | (none)      |
//! | `time_column_name`          | Column receiving the event time               | (none)      |
//! | `time_format`               | `iso8601` or a strftime pattern               | raw numeric |
//! | `storage_host`              | REST gateway host                             | `localhost` |
//! | `storage_port`              | REST gateway port                             | `9090`      |
//! | `storage_scheme`            | `http` or `https`                             | `http`      |
//! | `row_id_strategy`           | `random` or `time_prefixed`                   | `random`    |
//! | `batch.size`                | Records per flushed chunk (binary driver)     | `1000`      |
//!
//! Everything is validated here, so a malformed mapping never produces a
//! running connector.

use std::collections::HashMap;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};
use crate::mapping::RoutingTable;

/// ISO-8601 with millisecond precision and a `+hh:mm` offset.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

fn default_connector_class() -> String {
    "hbase".to_string()
}

/// Connector declaration as read from a JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Unique name identifying this connector instance.
    pub name: String,

    /// Implementation identifier. Defaults to `hbase`.
    #[serde(default = "default_connector_class")]
    pub connector_class: String,

    /// Key-value options parsed by [`HBaseSinkConfig::from_config_map`].
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// How the event time is written to the time column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeEncoding {
    /// Seconds since the epoch as an integer.
    Raw,
    /// A string formatted with the given strftime pattern, in UTC.
    Formatted(String),
}

impl TimeEncoding {
    pub fn from_str_config(s: &str) -> Result<Self> {
        let pattern = match s.trim() {
            "" | "raw" => return Ok(TimeEncoding::Raw),
            "iso8601" | "default" => DEFAULT_TIME_FORMAT,
            other => other,
        };

        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(ConnectorError::ConfigError(format!(
                "invalid time_format: '{}'",
                pattern
            )));
        }
        Ok(TimeEncoding::Formatted(pattern.to_string()))
    }
}

/// How row identifiers are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowIdStrategy {
    /// A random UUID.
    Random,
    /// Wall-clock milliseconds followed by a random UUID, so row keys sort
    /// roughly by write time.
    TimePrefixed,
}

impl RowIdStrategy {
    /// Parse from a string (case-insensitive).
    pub fn from_str_config(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "random" | "uuid" => Ok(RowIdStrategy::Random),
            "time_prefixed" => Ok(RowIdStrategy::TimePrefixed),
            other => Err(ConnectorError::ConfigError(format!(
                "unknown row_id_strategy: '{}'",
                other
            ))),
        }
    }
}

/// Parsed and validated sink configuration.
#[derive(Debug, Clone)]
pub struct HBaseSinkConfig {
    pub routing: RoutingTable,
    pub time_encoding: TimeEncoding,
    pub row_id_strategy: RowIdStrategy,
    pub storage_scheme: String,
    pub storage_host: String,
    pub storage_port: u16,
    pub storage_table: String,
    pub batch_size: usize,
}

impl HBaseSinkConfig {
    /// Parse an HBaseSinkConfig from a string key-value map.
    pub fn from_config_map(config: &HashMap<String, String>) -> Result<Self> {
        let mapping = config.get("fields_to_columns_mapping").ok_or_else(|| {
            ConnectorError::ConfigError(
                "missing required 'fields_to_columns_mapping'".to_string(),
            )
        })?;

        let storage_table = config
            .get("storage_table")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ConnectorError::ConfigError("missing required 'storage_table'".to_string())
            })?;

        let routing = RoutingTable::compile(
            mapping,
            config.get("tag_column_name").map(String::as_str),
            config.get("time_column_name").map(String::as_str),
        )?;
        // Destinations are checked here so a bad column never reaches bootstrap.
        routing.column_families()?;

        let time_encoding = config
            .get("time_format")
            .map(|s| TimeEncoding::from_str_config(s))
            .transpose()?
            .unwrap_or(TimeEncoding::Raw);

        let row_id_strategy = config
            .get("row_id_strategy")
            .map(|s| RowIdStrategy::from_str_config(s))
            .transpose()?
            .unwrap_or(RowIdStrategy::Random);

        let storage_scheme = match config.get("storage_scheme").map(|s| s.to_lowercase()) {
            None => "http".to_string(),
            Some(s) if s == "http" || s == "https" => s,
            Some(other) => {
                return Err(ConnectorError::ConfigError(format!(
                    "unknown storage_scheme: '{}'",
                    other
                )))
            }
        };

        let storage_host = config
            .get("storage_host")
            .cloned()
            .unwrap_or_else(|| "localhost".to_string());

        let storage_port = config
            .get("storage_port")
            .map(|s| {
                s.parse::<u16>().map_err(|e| {
                    ConnectorError::ConfigError(format!("invalid storage_port: {}", e))
                })
            })
            .transpose()?
            .unwrap_or(9090);

        let batch_size = config
            .get("batch.size")
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|e| ConnectorError::ConfigError(format!("invalid batch.size: {}", e)))
            })
            .transpose()?
            .unwrap_or(1000);

        if batch_size == 0 {
            return Err(ConnectorError::ConfigError(
                "batch.size must be greater than zero".to_string(),
            ));
        }

        Ok(HBaseSinkConfig {
            routing,
            time_encoding,
            row_id_strategy,
            storage_scheme,
            storage_host,
            storage_port,
            storage_table,
            batch_size,
        })
    }

    /// Base URL of the REST gateway, e.g. `http://localhost:9090`.
    pub fn storage_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.storage_scheme, self.storage_host, self.storage_port
        )
    }
}
