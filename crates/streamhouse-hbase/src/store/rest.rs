//! HBase REST gateway store.
//!
//! | Operation      | Request                                   |
//! |----------------|-------------------------------------------|
//! | `table_exists` | `GET /{table}/schema` (200 / 404)         |
//! | `create_table` | `PUT /{table}/schema` with `ColumnSchema` |
//! | `write_row`    | `PUT /{table}/{row}` with a `CellSet`     |
//!
//! Row keys, column names and cell values are base64 encoded in JSON bodies.

use std::collections::BTreeSet;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{StatusCode, Url};
use serde::Serialize;

use super::ColumnFamilyStore;
use crate::error::{ConnectorError, Result};
use crate::row::RowWrite;

#[derive(Debug, Serialize)]
struct TableSchema<'a> {
    name: &'a str,
    #[serde(rename = "ColumnSchema")]
    column_schema: Vec<ColumnSchema<'a>>,
}

#[derive(Debug, Serialize)]
struct ColumnSchema<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct CellSet {
    #[serde(rename = "Row")]
    rows: Vec<CellSetRow>,
}

#[derive(Debug, Serialize)]
struct CellSetRow {
    key: String,
    #[serde(rename = "Cell")]
    cells: Vec<Cell>,
}

#[derive(Debug, Serialize)]
struct Cell {
    column: String,
    #[serde(rename = "$")]
    value: String,
}

/// Store backed by an HBase REST server.
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: Url,
    client: reqwest::Client,
}

impl RestStore {
    /// Create a store for the gateway at `base_url`, e.g. `http://localhost:9090`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            ConnectorError::ConnectionError(format!("failed to build HTTP client: {}", e))
        })?;
        Self::with_client(base_url, client)
    }

    /// Create with an injected reqwest client.
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ConnectorError::ConfigError(format!("invalid storage URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConnectorError::ConfigError(format!(
                "invalid storage URL '{}'",
                base_url
            )));
        }
        Ok(Self { base_url, client })
    }

    /// Build `{base}/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ConnectorError::ConfigError(format!("invalid storage URL '{}'", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn schema_body(table: &str, families: &BTreeSet<String>) -> Result<serde_json::Value> {
        let schema = TableSchema {
            name: table,
            column_schema: families
                .iter()
                .map(|name| ColumnSchema { name })
                .collect(),
        };
        Ok(serde_json::to_value(schema)?)
    }

    /// Build the `CellSet` JSON body for one row.
    pub fn cell_set_body(row: &RowWrite) -> Result<serde_json::Value> {
        let cells = row
            .values
            .iter()
            .flat_map(|(family, columns)| {
                columns.iter().map(move |(column, value)| Cell {
                    column: BASE64.encode(format!("{}:{}", family, column)),
                    value: BASE64.encode(value.to_cell_bytes()),
                })
            })
            .collect();

        let cell_set = CellSet {
            rows: vec![CellSetRow {
                key: BASE64.encode(&row.row_id),
                cells,
            }],
        };
        Ok(serde_json::to_value(cell_set)?)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ConnectorError::ConnectionError(format!("HBase request failed: {}", e)))
    }

    async fn error_for_status(response: reqwest::Response, action: &str) -> ConnectorError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ConnectorError::BackendError(format!("{} returned {}: {}", action, status, body))
    }
}

#[async_trait]
impl ColumnFamilyStore for RestStore {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let url = self.url(&[table, "schema"])?;
        let response = self.send(self.client.get(url)).await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_for_status(response, "table schema lookup").await),
        }
    }

    async fn create_table(&self, table: &str, families: &BTreeSet<String>) -> Result<()> {
        let url = self.url(&[table, "schema"])?;
        let body = Self::schema_body(table, families)?;
        let response = self.send(self.client.put(url).json(&body)).await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "create table").await);
        }
        tracing::debug!(table, families = families.len(), "created HBase table");
        Ok(())
    }

    async fn write_row(&self, row: &RowWrite) -> Result<()> {
        let url = self.url(&[row.table.as_str(), row.row_id.as_str()])?;
        let body = Self::cell_set_body(row)?;
        let response = self.send(self.client.put(url).json(&body)).await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "row put").await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowValues;
    use crate::value::Value;
    use std::collections::BTreeMap;

    fn sample_row() -> RowWrite {
        let mut columns = BTreeMap::new();
        columns.insert("foo".to_string(), Value::from("foo1"));
        columns.insert("time".to_string(), Value::Int(1_293_974_055));
        let mut values = RowValues::new();
        values.insert("event".to_string(), columns);
        RowWrite {
            table: "events".to_string(),
            row_id: "row-1".to_string(),
            values,
        }
    }

    // ---------------------------------------------------------------
    // URLs
    // ---------------------------------------------------------------

    #[test]
    fn test_url_building() {
        let store = RestStore::new("http://localhost:9090").unwrap();
        assert_eq!(
            store.url(&["events", "schema"]).unwrap().as_str(),
            "http://localhost:9090/events/schema"
        );
    }

    #[test]
    fn test_url_building_with_base_path() {
        let store = RestStore::new("http://gateway:8080/hbase/").unwrap();
        assert_eq!(
            store.url(&["events", "row 1"]).unwrap().as_str(),
            "http://gateway:8080/hbase/events/row%201"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(RestStore::new("not a url").is_err());
        assert!(RestStore::new("mailto:someone@example.com").is_err());
    }

    // ---------------------------------------------------------------
    // Bodies
    // ---------------------------------------------------------------

    #[test]
    fn test_schema_body() {
        let families: BTreeSet<String> = ["event", "meta"].iter().map(|s| s.to_string()).collect();
        let body = RestStore::schema_body("events", &families).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "name": "events",
                "ColumnSchema": [{ "name": "event" }, { "name": "meta" }]
            })
        );
    }

    #[test]
    fn test_cell_set_body() {
        let body = RestStore::cell_set_body(&sample_row()).unwrap();
        let row = &body["Row"][0];
        assert_eq!(row["key"], BASE64.encode("row-1"));

        let cells = row["Cell"].as_array().unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0]["column"], BASE64.encode("event:foo"));
        assert_eq!(cells[0]["$"], BASE64.encode("foo1"));
        assert_eq!(cells[1]["column"], BASE64.encode("event:time"));
        assert_eq!(cells[1]["$"], BASE64.encode("1293974055"));
    }

    // ---------------------------------------------------------------
    // Connectivity
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_unreachable_gateway_is_connection_error() {
        let store = RestStore::new("http://127.0.0.1:1").unwrap();
        let err = store.table_exists("events").await.unwrap_err();
        assert!(matches!(err, ConnectorError::ConnectionError(_)));
    }
}
