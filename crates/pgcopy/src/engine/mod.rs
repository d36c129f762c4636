//! Copy engine - table operation and job runner.
//!
//! Tables are copied one at a time in configuration order. A failed table is
//! recorded and the job moves on; only cancellation stops it early.

mod stats;

pub use stats::{CopyStats, CopySummary, ErrorSummary, TableFailure};

use std::fmt;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::resolve_columns;
use crate::config::TableSpec;
use crate::error::{CopyError, Result};
use crate::query::{build_truncate_statement, CompiledQueries};
use crate::session::{SourceSession, TargetSession};
use crate::transfer::{cancellable, stream_transfer, TransferConfig};

/// Lifecycle of one table within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Pending,
    Truncating,
    ResolvingColumns,
    CompilingQueries,
    Streaming,
    Done,
    Failed,
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableState::Pending => "pending",
            TableState::Truncating => "truncating",
            TableState::ResolvingColumns => "resolving_columns",
            TableState::CompilingQueries => "compiling_queries",
            TableState::Streaming => "streaming",
            TableState::Done => "done",
            TableState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tracks and logs state transitions for one table.
struct Progress<'a> {
    table: &'a str,
    state: TableState,
}

impl<'a> Progress<'a> {
    fn new(table: &'a str) -> Self {
        Self {
            table,
            state: TableState::Pending,
        }
    }

    fn enter(&mut self, next: TableState) {
        debug!(table = %self.table, from = %self.state, to = %next, "Table state change");
        self.state = next;
    }
}

/// What a dry run reports for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePlan {
    pub schema: String,
    pub table: String,
    pub ignore: Vec<String>,
    pub filter: Option<String>,
    pub truncate: bool,
    /// Columns with a transformation, sorted.
    pub transformed_columns: Vec<String>,
}

impl From<&TableSpec> for TablePlan {
    fn from(spec: &TableSpec) -> Self {
        let mut transformed_columns: Vec<String> = spec.transform.keys().cloned().collect();
        transformed_columns.sort();
        Self {
            schema: spec.schema.clone(),
            table: spec.table.clone(),
            ignore: spec.ignore.clone(),
            filter: spec.filter.clone(),
            truncate: spec.truncate,
            transformed_columns,
        }
    }
}

/// Echo each table's configuration without touching any database.
pub fn dry_run(tables: &[TableSpec]) -> Vec<TablePlan> {
    info!("Dry run: {} tables configured", tables.len());
    tables
        .iter()
        .map(|spec| {
            let plan = TablePlan::from(spec);
            info!(
                schema = %plan.schema,
                table = %plan.table,
                ignore = ?plan.ignore,
                filter = plan.filter.as_deref().unwrap_or(""),
                truncate = plan.truncate,
                transformed = ?plan.transformed_columns,
                "Table configuration"
            );
            plan
        })
        .collect()
}

/// Copies tables from a source session to a target session.
pub struct CopyEngine<S, T> {
    source: S,
    target: T,
    transfer: TransferConfig,
}

impl<S, T> CopyEngine<S, T>
where
    S: SourceSession,
    T: TargetSession,
{
    /// Create an engine with the default conduit capacity.
    pub fn new(source: S, target: T) -> Self {
        Self {
            source,
            target,
            transfer: TransferConfig::default(),
        }
    }

    /// Override the number of chunks buffered per table transfer.
    pub fn with_conduit_capacity(mut self, capacity: usize) -> Self {
        self.transfer.conduit_capacity = capacity.max(1);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Copy every table once, in order.
    ///
    /// Per-table failures are collected in the returned stats; the job
    /// itself still succeeds.
    pub async fn run(&self, tables: &[TableSpec], cancel: CancellationToken) -> Result<CopyStats> {
        let mut stats = CopyStats::start(tables.len());
        info!(run_id = %stats.run_id, "Starting copy of {} tables", tables.len());

        for spec in tables {
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping before {}", spec.full_name());
                stats.mark_cancelled();
                break;
            }

            let table = spec.full_name();
            stats.record_attempt();

            match self.copy_table(spec, &cancel).await {
                Ok(rows) => {
                    info!("{}: completed ({} rows)", table, rows);
                    stats.record_success(table, rows);
                }
                Err(e) => {
                    error!("{}: failed: {}", table, e);
                    stats.record_failure(table, e);
                }
            }
        }

        stats.finish();
        stats.log_summary();
        Ok(stats)
    }

    /// Run one table's operation: optional truncate, column resolution,
    /// query compilation, then the streaming transfer.
    pub async fn copy_table(&self, spec: &TableSpec, cancel: &CancellationToken) -> Result<u64> {
        let table = spec.full_name();
        let mut progress = Progress::new(&table);

        match self.run_steps(spec, cancel, &mut progress).await {
            Ok(rows) => {
                progress.enter(TableState::Done);
                Ok(rows)
            }
            Err(e) => {
                if matches!(e, CopyError::Cancelled) {
                    warn!("{}: cancelled while {}", table, progress.state);
                }
                progress.enter(TableState::Failed);
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        spec: &TableSpec,
        cancel: &CancellationToken,
        progress: &mut Progress<'_>,
    ) -> Result<u64> {
        let table = spec.full_name();

        if spec.truncate {
            progress.enter(TableState::Truncating);
            let statement = build_truncate_statement(spec);
            cancellable(cancel, self.target.execute(&statement))
                .await
                .map_err(|e| match e {
                    CopyError::Cancelled => e,
                    other => CopyError::truncate(&table, other),
                })?;
            info!("{}: truncated", table);
        }

        progress.enter(TableState::ResolvingColumns);
        let columns = cancellable(cancel, resolve_columns(&self.source, spec)).await?;

        progress.enter(TableState::CompilingQueries);
        let queries = CompiledQueries::compile(spec, &columns)?;
        debug!(extraction = %queries.extraction, load = %queries.load, "{}: compiled", table);

        progress.enter(TableState::Streaming);
        stream_transfer(&self.source, &self.target, &queries, &self.transfer, cancel).await
    }
}
