//! StreamHouse HBase Sink
//!
//! Writes tagged, timestamped log events into an HBase table. Nested record
//! fields are routed to `family:column` cells through a declarative mapping.
//!
//! ## Architecture
//!
//! - **Mapping**: `RoutingTable` compiles `path=>family:column` pairs once at startup.
//! - **Format**: `RecordTransformer` flattens an event into a `FlatRecord` and
//!   encodes it with the `codec` module.
//! - **Write**: `RowAssembler` decodes a chunk, groups columns by family and
//!   writes one row per record with a generated row key.
//! - **Bootstrap**: `SchemaBootstrapper` creates the table and its column
//!   families when missing.
//! - **Stores**: `ColumnFamilyStore` abstracts the backend; `RestStore` talks to
//!   an HBase REST gateway and `MemoryStore` keeps tables in process.
//! - **Sink**: `HBaseSinkConnector` ties the stages together behind the
//!   `SinkConnector` lifecycle.

pub mod bootstrap;
pub mod codec;
pub mod config;
pub mod error;
pub mod mapping;
pub mod row;
pub mod sink;
pub mod store;
pub mod traits;
pub mod transform;
pub mod value;

// Re-export key types at crate root for convenience.
pub use bootstrap::{BootstrapOutcome, BootstrapState, SchemaBootstrapper};
pub use config::{ConnectorConfig, HBaseSinkConfig, RowIdStrategy, TimeEncoding};
pub use error::{ConnectorError, Result};
pub use mapping::{ColumnName, FieldMapping, RoutingTable};
pub use row::{RowAssembler, RowWrite};
pub use sink::HBaseSinkConnector;
pub use store::{ColumnFamilyStore, MemoryStore, RestStore};
pub use traits::{SinkConnector, SinkRecord};
pub use transform::{FlatRecord, RecordTransformer};
pub use value::Value;
