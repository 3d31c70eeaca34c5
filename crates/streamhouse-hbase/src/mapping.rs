//! Field-to-column mapping.
//!
//! Compiles the `fields_to_columns_mapping` option into a [`RoutingTable`]:
//!
//! ```text
//! foo=>event:foo,iam.nested=>event:nested
//! ```
//!
//! Pairs are separated by `,` and each pair is split on `=>` into a
//! dot-separated source path and a `family:column` destination. Empty tokens
//! are treated as absent and the pair is skipped when transforming records.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ConnectorError, Result};

const PAIR_SEPARATOR: char = ',';
const PATH_COLUMN_SEPARATOR: &str = "=>";

/// A destination column split into family and qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnName {
    pub family: String,
    pub qualifier: String,
}

impl ColumnName {
    /// Split on the first `:`. Both sides must be non-empty.
    pub fn parse(column: &str) -> Result<Self> {
        match column.split_once(':') {
            Some((family, qualifier)) if !family.is_empty() && !qualifier.is_empty() => {
                Ok(ColumnName {
                    family: family.to_string(),
                    qualifier: qualifier.to_string(),
                })
            }
            _ => Err(ConnectorError::ConfigError(format!(
                "unexpected format for column name: '{}'. Each destination column must be \
                 specified as 'column_family:column'",
                column
            ))),
        }
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.qualifier)
    }
}

/// One declared `path=>column` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub path: Option<String>,
    pub column: Option<String>,
}

/// Compiled mapping plus the optional tag and time columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    fields: Vec<FieldMapping>,
    routes: Vec<(String, String)>,
    tag_column: Option<String>,
    time_column: Option<String>,
}

impl RoutingTable {
    /// Parse the mapping string. Fails if any pair does not split into exactly
    /// two tokens. Empty segments are only allowed at the end.
    pub fn compile(
        mapping: &str,
        tag_column: Option<&str>,
        time_column: Option<&str>,
    ) -> Result<Self> {
        let mut pairs: Vec<&str> = mapping.split(PAIR_SEPARATOR).collect();
        // Trailing empty segments are ignored, so `a=>f:a,` is one pair.
        while pairs.last().is_some_and(|p| p.is_empty()) {
            pairs.pop();
        }

        let mut fields = Vec::new();
        for pair in pairs {
            let tokens: Vec<&str> = pair.split(PATH_COLUMN_SEPARATOR).collect();
            if tokens.len() != 2 {
                return Err(ConnectorError::ConfigError(format!(
                    "invalid mapping pair '{}': expected 'path{}family:column'",
                    pair, PATH_COLUMN_SEPARATOR
                )));
            }
            fields.push(FieldMapping {
                path: non_empty(tokens[0]),
                column: non_empty(tokens[1]),
            });
        }

        // A repeated path keeps its first position and takes the last
        // declared column.
        let mut routes: Vec<(String, String)> = Vec::new();
        for field in &fields {
            if let (Some(path), Some(column)) = (&field.path, &field.column) {
                match routes.iter_mut().find(|(p, _)| p == path) {
                    Some(route) => route.1 = column.clone(),
                    None => routes.push((path.clone(), column.clone())),
                }
            }
        }

        Ok(RoutingTable {
            fields,
            routes,
            tag_column: tag_column.and_then(non_empty),
            time_column: time_column.and_then(non_empty),
        })
    }

    /// Every declared pair, in declaration order.
    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    /// Effective `(path, column)` routes used to build flat records.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn tag_column(&self) -> Option<&str> {
        self.tag_column.as_deref()
    }

    pub fn time_column(&self) -> Option<&str> {
        self.time_column.as_deref()
    }

    /// Distinct column families referenced by the tag column, the time column,
    /// and every route destination.
    pub fn column_families(&self) -> Result<BTreeSet<String>> {
        let columns = [self.tag_column(), self.time_column()]
            .into_iter()
            .flatten()
            .chain(self.routes().map(|(_, column)| column));

        let mut families = BTreeSet::new();
        for column in columns {
            families.insert(ColumnName::parse(column)?.family);
        }
        Ok(families)
    }
}

fn non_empty(token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
