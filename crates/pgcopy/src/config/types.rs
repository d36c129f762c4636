//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source database connection. May be left empty when `--source` is given.
    #[serde(default, skip_serializing_if = "DatabaseConfig::is_empty")]
    pub source: DatabaseConfig,

    /// Target database connection. May be left empty when `--target` is given.
    #[serde(default, skip_serializing_if = "DatabaseConfig::is_empty")]
    pub target: DatabaseConfig,

    /// Schemas and the tables to copy from each, in copy order.
    #[serde(default)]
    pub schemas: Vec<SchemaConfig>,
}

impl Config {
    /// Flatten all schemas into the ordered list of tables to copy.
    pub fn tables(&self) -> Vec<TableSpec> {
        self.schemas
            .iter()
            .flat_map(|schema| {
                schema.tables.iter().map(move |table| TableSpec {
                    schema: schema.name.clone(),
                    table: table.name.clone(),
                    ignore: table.ignore.clone(),
                    transform: table.transform.clone(),
                    filter: table.filter.clone().filter(|f| !f.trim().is_empty()),
                    truncate: table.truncate,
                })
            })
            .collect()
    }
}

/// PostgreSQL connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    #[serde(default)]
    pub database: String,

    /// Username.
    #[serde(default)]
    pub username: String,

    /// Password. `${VAR}` references are expanded at load time.
    #[serde(default)]
    pub password: String,

    /// SSL mode (default: "prefer").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_pg_port(),
            database: String::new(),
            username: String::new(),
            password: String::new(),
            ssl_mode: default_ssl_mode(),
        }
    }
}

impl DatabaseConfig {
    /// A section with no host, database or username is treated as absent.
    pub fn is_empty(&self) -> bool {
        self.host.is_empty() && self.database.is_empty() && self.username.is_empty()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// A schema and its tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema name.
    pub name: String,

    /// Tables to copy, in copy order.
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

/// Per-table copy settings as written in the YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name.
    pub name: String,

    /// Columns left out of both the extraction and the load.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,

    /// Column name to transformation token.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub transform: HashMap<String, String>,

    /// Raw SQL predicate applied to the extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Truncate the target table (with CASCADE) before loading.
    #[serde(default)]
    pub truncate: bool,
}

/// Everything the engine needs to know about one table for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSpec {
    pub schema: String,
    pub table: String,
    pub ignore: Vec<String>,
    pub transform: HashMap<String, String>,
    /// Never `Some("")`; blank filters are normalized to `None`.
    pub filter: Option<String>,
    pub truncate: bool,
}

impl TableSpec {
    /// Create a spec with no ignores, transforms, filter or truncate.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            ..Default::default()
        }
    }

    /// `schema.table`, exactly as it appears in generated SQL.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// True if the column is excluded from the copy.
    pub fn is_ignored(&self, column: &str) -> bool {
        self.ignore.iter().any(|c| c == column)
    }

    pub fn with_ignore<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_transform(mut self, column: impl Into<String>, token: impl Into<String>) -> Self {
        self.transform.insert(column.into(), token.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.filter = if filter.trim().is_empty() {
            None
        } else {
            Some(filter)
        };
        self
    }

    pub fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }
}

// Default value functions for serde
fn default_pg_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "prefer".to_string()
}
