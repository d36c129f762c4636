//! Configuration loading and validation.

mod env;
mod types;
mod validation;

pub use env::expand_env;
pub use types::*;

use crate::db::Endpoint;
use crate::error::{CopyError, Result};
use std::path::Path;
use tracing::info;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml)?;
        config.expand_env();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Expand `${VAR}` / `$VAR` references in the database passwords.
    fn expand_env(&mut self) {
        for db in [&mut self.source, &mut self.target] {
            if !db.password.is_empty() {
                db.password = expand_env(&db.password);
            }
        }
    }

    /// Resolve the source connection. A command-line value wins over the file.
    pub fn source_endpoint(&self, flag: Option<&str>) -> Result<Endpoint> {
        resolve_endpoint(flag, &self.source, "source")
    }

    /// Resolve the target connection. A command-line value wins over the file.
    pub fn target_endpoint(&self, flag: Option<&str>) -> Result<Endpoint> {
        resolve_endpoint(flag, &self.target, "target")
    }
}

fn resolve_endpoint(flag: Option<&str>, db: &DatabaseConfig, side: &str) -> Result<Endpoint> {
    match flag.filter(|s| !s.is_empty()) {
        Some(conn) => {
            info!(
                "Using {} database connection from command line (overrides config file)",
                side
            );
            Endpoint::from_connection_string(conn)
        }
        None if !db.host.is_empty() => {
            info!("Using {} database connection from config file", side);
            Endpoint::from_database_config(db)
        }
        None => Err(CopyError::Config(format!(
            "{} database connection not provided in config file or command line",
            side
        ))),
    }
}

impl DatabaseConfig {
    /// Build a libpq-style key/value connection string.
    pub fn connection_string(&self) -> String {
        if self.host.is_empty() {
            return String::new();
        }

        let mut conn = format!(
            "host={} port={} dbname={} user={}",
            self.host, self.port, self.database, self.username
        );
        if !self.password.is_empty() {
            conn.push_str(&format!(" password={}", self.password));
        }
        if !self.ssl_mode.is_empty() {
            conn.push_str(&format!(" sslmode={}", self.ssl_mode));
        }
        conn
    }
}
