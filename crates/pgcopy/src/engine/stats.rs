//! Per-run accounting and the summary report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{CopyError, Result};

/// One table's failure, in the order it happened.
#[derive(Debug)]
pub struct TableFailure {
    /// `schema.table`.
    pub table: String,
    /// What went wrong.
    pub error: CopyError,
}

/// Aggregate state of one job run.
///
/// Owned and mutated only by the job runner's sequential loop.
#[derive(Debug)]
pub struct CopyStats {
    /// Unique run identifier.
    pub run_id: String,
    /// Tables in the job.
    pub tables_total: usize,
    /// Tables whose operation was started.
    pub tables_attempted: usize,
    /// Tables copied successfully.
    pub tables_processed: usize,
    /// Rows loaded into the target across all tables.
    pub rows_copied: u64,
    /// Names of tables copied successfully, in order.
    pub succeeded: Vec<String>,
    /// Per-table failures, in order.
    pub errors: Vec<TableFailure>,
    /// The job stopped early because it was cancelled.
    pub cancelled: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: Option<DateTime<Utc>>,
}

impl CopyStats {
    /// Fresh stats for a job of `tables_total` tables, stamped now.
    pub fn start(tables_total: usize) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            tables_total,
            tables_attempted: 0,
            tables_processed: 0,
            rows_copied: 0,
            succeeded: Vec::new(),
            errors: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark a table as started.
    pub fn record_attempt(&mut self) {
        self.tables_attempted += 1;
    }

    /// Fold in a successful table.
    pub fn record_success(&mut self, table: impl Into<String>, rows: u64) {
        self.tables_processed += 1;
        self.rows_copied += rows;
        self.succeeded.push(table.into());
    }

    /// Fold in a failed table.
    pub fn record_failure(&mut self, table: impl Into<String>, error: CopyError) {
        if matches!(error, CopyError::Cancelled) {
            self.cancelled = true;
        }
        self.errors.push(TableFailure {
            table: table.into(),
            error,
        });
    }

    /// Note that the job stopped before attempting every table.
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Stamp the end time.
    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Number of failed tables.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Wall time from start to finish (or to now while running).
    pub fn duration_seconds(&self) -> f64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    /// `completed`, `completed_with_errors` or `cancelled`.
    pub fn status(&self) -> &'static str {
        if self.cancelled {
            "cancelled"
        } else if self.errors.is_empty() {
            "completed"
        } else {
            "completed_with_errors"
        }
    }

    /// Render into a serializable report.
    pub fn summary(&self) -> CopySummary {
        let duration = self.duration_seconds();
        let rows_per_second = if duration > 0.0 {
            (self.rows_copied as f64 / duration) as u64
        } else {
            0
        };

        CopySummary {
            run_id: self.run_id.clone(),
            status: self.status().to_string(),
            started_at: self.started_at,
            completed_at: self.completed_at.unwrap_or_else(Utc::now),
            duration_seconds: duration,
            tables_total: self.tables_total,
            tables_processed: self.tables_processed,
            tables_failed: self.errors.len(),
            rows_copied: self.rows_copied,
            rows_per_second,
            succeeded_tables: self.succeeded.clone(),
            errors: self
                .errors
                .iter()
                .map(|f| ErrorSummary {
                    table: f.table.clone(),
                    message: f.error.to_string(),
                })
                .collect(),
        }
    }

    /// Emit the end-of-run summary through tracing.
    pub fn log_summary(&self) {
        info!(
            run_id = %self.run_id,
            tables_processed = self.tables_processed,
            rows_copied = self.rows_copied,
            "Copy {}: {} tables processed, {} rows in {:.1}s, {} errors",
            self.status(),
            self.tables_processed,
            self.rows_copied,
            self.duration_seconds(),
            self.errors.len()
        );

        if self.cancelled {
            warn!(
                "{} of {} tables were not attempted",
                self.tables_total - self.tables_attempted.min(self.tables_total),
                self.tables_total
            );
        }

        for (i, failure) in self.errors.iter().enumerate() {
            error!(index = i + 1, table = %failure.table, "{}", failure.error);
        }
    }
}

/// Serializable end-of-run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopySummary {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables in the job.
    pub tables_total: usize,

    /// Tables copied successfully.
    pub tables_processed: usize,

    /// Tables that failed.
    pub tables_failed: usize,

    /// Total rows loaded.
    pub rows_copied: u64,

    /// Average throughput.
    pub rows_per_second: u64,

    /// Names of tables copied successfully.
    pub succeeded_tables: Vec<String>,

    /// Per-table errors, in order.
    pub errors: Vec<ErrorSummary>,
}

/// One failed table in a [`CopySummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub table: String,
    pub message: String,
}

impl CopySummary {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_fold_per_table() {
        let mut stats = CopyStats::start(3);
        stats.record_attempt();
        stats.record_success("public.users", 120);
        stats.record_attempt();
        stats.record_failure("public.orders", CopyError::load("disk full"));
        stats.record_attempt();
        stats.record_success("public.items", 30);
        stats.finish();

        assert_eq!(stats.tables_processed, 2);
        assert_eq!(stats.rows_copied, 150);
        assert_eq!(stats.error_count(), 1);
        assert_eq!(stats.succeeded, vec!["public.users", "public.items"]);
        assert_eq!(stats.status(), "completed_with_errors");
        assert!(stats.completed_at.is_some());
    }

    #[test]
    fn test_status_values() {
        let mut stats = CopyStats::start(1);
        assert_eq!(stats.status(), "completed");
        stats.mark_cancelled();
        assert_eq!(stats.status(), "cancelled");

        let mut stats = CopyStats::start(1);
        stats.record_failure("public.users", CopyError::Cancelled);
        assert!(stats.cancelled);
    }

    #[test]
    fn test_summary_json() {
        let mut stats = CopyStats::start(2);
        stats.record_success("public.users", 10);
        stats.record_failure(
            "public.orders",
            CopyError::NoColumns {
                table: "public.orders".to_string(),
            },
        );
        stats.finish();

        let summary = stats.summary();
        assert_eq!(summary.tables_total, 2);
        assert_eq!(summary.tables_failed, 1);
        assert_eq!(
            summary.errors,
            vec![ErrorSummary {
                table: "public.orders".to_string(),
                message: "no columns to copy for table public.orders".to_string(),
            }]
        );

        let json = summary.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "completed_with_errors");
        assert_eq!(value["rows_copied"], 10);
        assert_eq!(value["succeeded_tables"][0], "public.users");
        assert!(uuid::Uuid::parse_str(value["run_id"].as_str().unwrap()).is_ok());
    }
}
