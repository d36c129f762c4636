//! Error types for the copy engine.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for connection and pool errors.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for database and copy errors.
pub const EXIT_DATABASE_ERROR: u8 = 3;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code when the job was interrupted.
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for copy operations.
#[derive(Error, Debug)]
pub enum CopyError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Column discovery failed (connectivity, permissions).
    #[error("Catalog query failed for {table}: {message}")]
    Catalog { table: String, message: String },

    /// The table has no transferable columns left after filtering.
    #[error("no columns to copy for table {table}")]
    NoColumns { table: String },

    /// The destructive pre-clear of the target table failed.
    #[error("failed to truncate table {table}: {message}")]
    Truncate { table: String, message: String },

    /// The source side of a stream transfer failed.
    #[error("source extraction failed: {0}")]
    Extraction(String),

    /// The target side of a stream transfer failed.
    #[error("target load failed: {0}")]
    Load(String),

    /// The conduit reader went away while the producer was still writing.
    #[error("conduit closed by reader")]
    ConduitClosed,

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Driver error that was not attributed to a copy step
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The job was cancelled (SIGINT, etc.)
    #[error("Copy cancelled")]
    Cancelled,
}

impl CopyError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        CopyError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Catalog error for a table.
    pub fn catalog(table: impl Into<String>, message: impl ToString) -> Self {
        CopyError::Catalog {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Truncate error for a table.
    pub fn truncate(table: impl Into<String>, message: impl ToString) -> Self {
        CopyError::Truncate {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create an Extraction error.
    pub fn extraction(message: impl ToString) -> Self {
        CopyError::Extraction(message.to_string())
    }

    /// Create a Load error.
    pub fn load(message: impl ToString) -> Self {
        CopyError::Load(message.to_string())
    }

    /// True for errors raised on the source side of a stream transfer.
    pub fn is_extraction(&self) -> bool {
        matches!(self, CopyError::Extraction(_))
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CopyError::Config(_) | CopyError::Yaml(_) | CopyError::Json(_) => EXIT_CONFIG_ERROR,
            CopyError::Pool { .. } => EXIT_CONNECTION_ERROR,
            CopyError::Io(_) => EXIT_IO_ERROR,
            CopyError::Cancelled => EXIT_CANCELLED,
            _ => EXIT_DATABASE_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for copy operations.
pub type Result<T> = std::result::Result<T, CopyError>;
