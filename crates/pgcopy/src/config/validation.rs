//! Configuration validation.

use super::{Config, DatabaseConfig};
use crate::db::SslMode;
use crate::error::{CopyError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_database(&config.source, "source")?;
    validate_database(&config.target, "target")?;

    if config.schemas.is_empty() {
        return Err(CopyError::Config("no schemas defined".into()));
    }

    for (i, schema) in config.schemas.iter().enumerate() {
        if schema.name.is_empty() {
            return Err(CopyError::Config(format!("schema {} has no name", i)));
        }
        if schema.tables.is_empty() {
            return Err(CopyError::Config(format!(
                "schema '{}' has no tables",
                schema.name
            )));
        }

        for (j, table) in schema.tables.iter().enumerate() {
            if table.name.is_empty() {
                return Err(CopyError::Config(format!(
                    "table {} in schema '{}' has no name",
                    j, schema.name
                )));
            }

            if let Some(col) = table.ignore.iter().find(|c| table.transform.contains_key(*c)) {
                return Err(CopyError::Config(format!(
                    "table '{}' in schema '{}': column '{}' cannot be both ignored and transformed",
                    table.name, schema.name, col
                )));
            }
        }
    }

    Ok(())
}

/// An entirely empty section is valid; the command line supplies the connection.
fn validate_database(db: &DatabaseConfig, side: &str) -> Result<()> {
    if db.is_empty() {
        return Ok(());
    }

    if db.host.is_empty() {
        return Err(CopyError::Config(format!("{} database: host is required", side)));
    }
    if db.database.is_empty() {
        return Err(CopyError::Config(format!(
            "{} database: database name is required",
            side
        )));
    }
    if db.username.is_empty() {
        return Err(CopyError::Config(format!(
            "{} database: username is required",
            side
        )));
    }
    if db.port == 0 {
        return Err(CopyError::Config(format!("{} database: port must be non-zero", side)));
    }
    SslMode::parse(&db.ssl_mode)
        .map_err(|e| CopyError::Config(format!("{} database: {}", side, e)))?;

    Ok(())
}
