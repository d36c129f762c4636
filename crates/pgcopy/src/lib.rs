//! # pgcopy
//!
//! Streaming table copy between two PostgreSQL databases.
//!
//! Each configured table is extracted from the source with
//! `COPY (SELECT ...) TO STDOUT` and loaded into the target with
//! `COPY ... FROM STDIN`, with the two sides connected by a bounded
//! in-memory conduit. Along the way:
//!
//! - **Ignored columns** are left out of both statements
//! - **Transformations** (`hash`, `redact`, `anonymize`, `nullify`, custom SQL)
//!   rewrite column values during extraction
//! - **Row filters** restrict what is extracted
//! - **Truncate** clears the target table first
//!
//! Tables are copied one at a time; a failed table is recorded and the job
//! continues.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pgcopy::{Config, CopyEngine, PgSession};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pgcopy::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let source = PgSession::connect(&config.source_endpoint(None)?, "source").await?;
//!     let target = PgSession::connect(&config.target_endpoint(None)?, "target").await?;
//!
//!     let engine = CopyEngine::new(source, target);
//!     let stats = engine.run(&config.tables(), CancellationToken::new()).await?;
//!     println!("Copied {} rows", stats.rows_copied);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod conduit;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod query;
pub mod session;
pub mod transfer;
pub mod transform;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, SchemaConfig, TableConfig, TableSpec};
pub use db::{Endpoint, PgSession, SslMode};
pub use engine::{dry_run, CopyEngine, CopyStats, CopySummary, TablePlan, TableState};
pub use error::{CopyError, Result};
pub use query::CompiledQueries;
pub use session::{SourceSession, TargetSession};
pub use transform::Transformation;
