//! HBase Sink Driver
//!
//! Reads newline-delimited JSON events from stdin and writes them to HBase
//! through [`HBaseSinkConnector`].
//!
//! Each input line is an object of the form:
//!
//! ```json
//! {"tag": "app.access", "time": 1293974055, "record": {"foo": "bar"}}
//! ```
//!
//! `tag` falls back to `--tag` and `time` to the current time when omitted.
//! Lines that are not valid events are logged and skipped.
//!
//! ## Example
//!
//! ```bash
//! cat > hbase.json <<'EOF'
//! {
//!   "name": "access-log",
//!   "config": {
//!     "fields_to_columns_mapping": "path=>req:path,user.id=>req:user",
//!     "tag_column_name": "meta:tag",
//!     "time_column_name": "meta:time",
//!     "storage_table": "access",
//!     "storage_host": "hbase-rest"
//!   }
//! }
//! EOF
//! RUST_LOG=debug hbase-sink --config hbase.json < events.ndjson
//! ```
//!
//! `--dry-run` writes into an in-process store instead and prints the
//! resulting rows as JSON on exit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use streamhouse_hbase::{
    ColumnFamilyStore, ConnectorConfig, HBaseSinkConfig, HBaseSinkConnector, MemoryStore,
    SinkConnector, SinkRecord, Value,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "hbase-sink")]
#[command(about = "Write newline-delimited JSON events to HBase", long_about = None)]
struct Cli {
    /// Connector config file (JSON)
    #[arg(short, long, env = "HBASE_SINK_CONFIG")]
    config: PathBuf,

    /// Tag used for events that do not carry one
    #[arg(short, long, default_value = "hbase-sink")]
    tag: String,

    /// Write into an in-memory table and print the rows instead of contacting HBase
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct InputEvent {
    tag: Option<String>,
    time: Option<i64>,
    record: serde_json::Value,
}

impl InputEvent {
    fn into_sink_record(self, default_tag: &str) -> SinkRecord {
        SinkRecord::new(
            self.tag.unwrap_or_else(|| default_tag.to_string()),
            self.time.unwrap_or_else(|| Utc::now().timestamp()),
            Value::from(self.record),
        )
    }
}

async fn load_config(path: &Path) -> Result<ConnectorConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: ConnectorConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;

    if config.connector_class != "hbase" {
        bail!(
            "unsupported connector_class '{}' (expected 'hbase')",
            config.connector_class
        );
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or(Level::INFO);

    // Logs go to stderr so dry-run output on stdout stays clean.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let connector_config = load_config(&cli.config).await?;
    let sink_config = HBaseSinkConfig::from_config_map(&connector_config.config)
        .with_context(|| format!("invalid config for connector '{}'", connector_config.name))?;
    let batch_size = sink_config.batch_size;

    let memory = MemoryStore::new();
    let mut sink = if cli.dry_run {
        let store: Arc<dyn ColumnFamilyStore> = Arc::new(memory.clone());
        HBaseSinkConnector::with_store(&connector_config.name, sink_config, store)
    } else {
        info!(url = %sink_config.storage_url(), "using HBase REST gateway");
        HBaseSinkConnector::with_config(&connector_config.name, sink_config)?
    };

    sink.start()
        .await
        .context("failed to prepare the HBase table")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut batch = Vec::with_capacity(batch_size);
    let mut line_no = 0usize;
    let mut skipped = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<InputEvent>(&line) {
            Ok(event) => batch.push(event.into_sink_record(&cli.tag)),
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed event");
                skipped += 1;
                continue;
            }
        }

        if batch.len() >= batch_size {
            sink.put(&batch).await?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        sink.put(&batch).await?;
    }
    sink.stop().await?;

    info!(
        connector = %sink.name(),
        lines = line_no,
        skipped,
        "input exhausted"
    );

    if cli.dry_run {
        let table = &sink.config().storage_table;
        for (row_id, values) in memory.rows(table).await {
            let cells: serde_json::Map<String, serde_json::Value> = values
                .iter()
                .flat_map(|(family, columns)| {
                    columns.iter().map(move |(column, value)| {
                        (format!("{}:{}", family, column), value.to_json())
                    })
                })
                .collect();
            println!("{}", serde_json::json!({ "row": row_id, "cells": cells }));
        }
    }

    Ok(())
}
