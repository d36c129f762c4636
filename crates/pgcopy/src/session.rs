//! Database-facing traits used by the copy engine.
//!
//! - [`SourceSession`]: catalog lookups and bulk extraction
//! - [`TargetSession`]: plain statements and bulk loading
//!
//! [`crate::db::PgSession`] implements both against a live PostgreSQL
//! pool. Tests substitute in-memory implementations.

use async_trait::async_trait;

use crate::conduit::{ConduitReader, ConduitWriter};
use crate::error::Result;

/// Read side of a copy.
#[async_trait]
pub trait SourceSession: Send + Sync {
    /// Column names of `schema.table` in ordinal order.
    ///
    /// Returns an empty list for an unknown table. Failures are
    /// reported as [`crate::CopyError::Catalog`].
    async fn table_columns(&self, schema: &str, table: &str) -> Result<Vec<String>>;

    /// Run a `COPY ... TO STDOUT` statement, writing every chunk it
    /// produces into `writer`. Returns the number of bytes produced.
    ///
    /// Does not close the writer; the caller decides how the stream ends.
    async fn copy_out(&self, statement: &str, writer: &mut ConduitWriter) -> Result<u64>;
}

/// Write side of a copy.
#[async_trait]
pub trait TargetSession: Send + Sync {
    /// Execute a statement that returns no rows. Returns rows affected.
    async fn execute(&self, statement: &str) -> Result<u64>;

    /// Run a `COPY ... FROM STDIN` statement fed from `reader` until the
    /// writer end closes. Returns the row count reported by the server.
    ///
    /// An error read from the conduit must abort the load and be
    /// returned unchanged so the caller can attribute it to the source.
    async fn copy_in(&self, statement: &str, reader: &mut ConduitReader) -> Result<u64>;
}
