//! Streaming transfer of one table through a bounded conduit.
//!
//! The producer runs the extraction statement against the source and writes
//! into the conduit; the consumer runs the load statement against the target
//! and reads from it. Both run concurrently so the target starts loading
//! before the source finishes, and the bounded conduit throttles the source
//! to the target's pace.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::conduit::{self, DEFAULT_CONDUIT_CAPACITY};
use crate::error::{CopyError, Result};
use crate::query::CompiledQueries;
use crate::session::{SourceSession, TargetSession};

/// Transfer settings.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Chunks buffered between producer and consumer.
    pub conduit_capacity: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            conduit_capacity: DEFAULT_CONDUIT_CAPACITY,
        }
    }
}

/// Run `fut` unless `cancel` fires first.
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CopyError::Cancelled),
        result = fut => result,
    }
}

/// Stream `queries.extraction` from `source` into `queries.load` on `target`.
///
/// Returns the row count reported by the target. A source failure is
/// reported as [`CopyError::Extraction`] even though the target observes it
/// first; a target failure as [`CopyError::Load`].
pub async fn stream_transfer<S, T>(
    source: &S,
    target: &T,
    queries: &CompiledQueries,
    config: &TransferConfig,
    cancel: &CancellationToken,
) -> Result<u64>
where
    S: SourceSession + ?Sized,
    T: TargetSession + ?Sized,
{
    let (mut writer, mut reader) = conduit::pipe(config.conduit_capacity);

    // Each side owns its conduit end so that finishing one side releases
    // the other (a dropped reader fails pending writes, a dropped writer
    // ends the stream).
    let producer = async move {
        let result = cancellable(cancel, source.copy_out(&queries.extraction, &mut writer))
            .await
            .map_err(attribute_to_source);
        match &result {
            Ok(bytes) => {
                debug!(bytes, "Source extraction finished");
                writer.close();
            }
            Err(CopyError::Extraction(reason)) => writer.close_with_error(reason.clone()).await,
            Err(other) => writer.close_with_error(other.to_string()).await,
        }
        result
    };

    let consumer = async move {
        cancellable(cancel, target.copy_in(&queries.load, &mut reader))
            .await
            .map_err(attribute_to_target)
    };

    let (produced, consumed) = tokio::join!(producer, consumer);
    resolve_outcome(produced, consumed)
}

fn attribute_to_source(err: CopyError) -> CopyError {
    match err {
        CopyError::Extraction(_) | CopyError::ConduitClosed | CopyError::Cancelled => err,
        other => CopyError::Extraction(other.to_string()),
    }
}

fn attribute_to_target(err: CopyError) -> CopyError {
    match err {
        CopyError::Extraction(_) | CopyError::Load(_) | CopyError::Cancelled => err,
        other => CopyError::Load(other.to_string()),
    }
}

/// Pick the error that names the side at fault.
fn resolve_outcome(produced: Result<u64>, consumed: Result<u64>) -> Result<u64> {
    match (produced, consumed) {
        (Err(CopyError::Cancelled), _) | (_, Err(CopyError::Cancelled)) => Err(CopyError::Cancelled),
        (Err(e), _) if e.is_extraction() => Err(e),
        (_, Err(e)) => Err(e),
        (Err(CopyError::ConduitClosed), Ok(rows)) => Err(CopyError::Load(format!(
            "target stopped reading after {} rows before the source finished",
            rows
        ))),
        (Err(e), Ok(_)) => Err(e),
        (Ok(_), Ok(rows)) => Ok(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conduit::{ConduitReader, ConduitWriter};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    enum SourceBehaviour {
        Rows(Vec<&'static str>),
        FailAfter(Vec<&'static str>, &'static str),
        Hang,
    }

    struct FakeSource(SourceBehaviour);

    #[async_trait]
    impl SourceSession for FakeSource {
        async fn table_columns(&self, _schema: &str, _table: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }

        async fn copy_out(&self, _statement: &str, writer: &mut ConduitWriter) -> Result<u64> {
            let (rows, failure) = match &self.0 {
                SourceBehaviour::Rows(rows) => (rows.clone(), None),
                SourceBehaviour::FailAfter(rows, msg) => (rows.clone(), Some(*msg)),
                SourceBehaviour::Hang => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
            };
            let mut bytes = 0;
            for row in rows {
                bytes += row.len() as u64;
                writer.write(Bytes::from(format!("{}\n", row))).await?;
            }
            match failure {
                Some(msg) => Err(CopyError::extraction(msg)),
                None => Ok(bytes),
            }
        }
    }

    enum TargetBehaviour {
        Load,
        Reject(&'static str),
        Hang,
    }

    struct FakeTarget {
        behaviour: TargetBehaviour,
        received: Mutex<Vec<u8>>,
    }

    impl FakeTarget {
        fn new(behaviour: TargetBehaviour) -> Self {
            Self {
                behaviour,
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TargetSession for FakeTarget {
        async fn execute(&self, _statement: &str) -> Result<u64> {
            Ok(0)
        }

        async fn copy_in(&self, _statement: &str, reader: &mut ConduitReader) -> Result<u64> {
            match self.behaviour {
                TargetBehaviour::Reject(msg) => return Err(CopyError::load(msg)),
                TargetBehaviour::Hang => futures::future::pending::<()>().await,
                TargetBehaviour::Load => {}
            }
            let data = reader.read_to_end().await?;
            let rows = data.iter().filter(|b| **b == b'\n').count() as u64;
            self.received.lock().unwrap().extend_from_slice(&data);
            Ok(rows)
        }
    }

    fn queries() -> CompiledQueries {
        CompiledQueries {
            extraction: "COPY (SELECT id, name FROM public.users) TO STDOUT".to_string(),
            load: "COPY public.users (id, name) FROM STDIN".to_string(),
        }
    }

    fn small() -> TransferConfig {
        TransferConfig { conduit_capacity: 1 }
    }

    #[tokio::test]
    async fn test_rows_stream_through_in_order() {
        let source = FakeSource(SourceBehaviour::Rows(vec!["1\talice", "2\tbob", "3\tcarol"]));
        let target = FakeTarget::new(TargetBehaviour::Load);
        let cancel = CancellationToken::new();

        let rows = stream_transfer(&source, &target, &queries(), &small(), &cancel)
            .await
            .unwrap();

        assert_eq!(rows, 3);
        assert_eq!(
            target.received.lock().unwrap().as_slice(),
            b"1\talice\n2\tbob\n3\tcarol\n"
        );
    }

    #[tokio::test]
    async fn test_producer_failure_mid_stream_is_extraction_error() {
        let source = FakeSource(SourceBehaviour::FailAfter(
            vec!["1\talice", "2\tbob"],
            "canceling statement due to conflict with recovery",
        ));
        let target = FakeTarget::new(TargetBehaviour::Load);
        let cancel = CancellationToken::new();

        let err = stream_transfer(&source, &target, &queries(), &small(), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_extraction(), "unexpected error: {}", err);
        assert_eq!(
            err.to_string(),
            "source extraction failed: canceling statement due to conflict with recovery"
        );
    }

    #[tokio::test]
    async fn test_consumer_reports_source_failure_read_from_conduit() {
        let target = FakeTarget::new(TargetBehaviour::Load);
        let (mut writer, mut reader) = conduit::pipe(4);
        writer.write(Bytes::from_static(b"1\talice\n")).await.unwrap();
        writer.close_with_error("could not read block 42").await;

        let err = target
            .copy_in("COPY public.users (id, name) FROM STDIN", &mut reader)
            .await
            .unwrap_err();

        assert!(err.is_extraction(), "unexpected error: {}", err);
        assert_eq!(err.to_string(), "source extraction failed: could not read block 42");
        assert!(target.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_consumer_failure_is_load_error() {
        let rows: Vec<&'static str> = vec!["1\ta"; 64];
        let source = FakeSource(SourceBehaviour::Rows(rows));
        let target = FakeTarget::new(TargetBehaviour::Reject("relation \"public.users\" does not exist"));
        let cancel = CancellationToken::new();

        let err = stream_transfer(&source, &target, &queries(), &small(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, CopyError::Load(_)), "unexpected error: {}", err);
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_stalled_producer() {
        let source = FakeSource(SourceBehaviour::Hang);
        let target = FakeTarget::new(TargetBehaviour::Load);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            stream_transfer(&source, &target, &queries(), &small(), &cancel),
        )
        .await
        .expect("transfer should stop once cancelled")
        .unwrap_err();

        assert!(matches!(err, CopyError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_stalled_consumer() {
        let source = FakeSource(SourceBehaviour::Rows(vec!["1\talice"; 8]));
        let target = FakeTarget::new(TargetBehaviour::Hang);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            stream_transfer(&source, &target, &queries(), &small(), &cancel),
        )
        .await
        .expect("transfer should stop once cancelled")
        .unwrap_err();

        assert!(matches!(err, CopyError::Cancelled));
    }

    #[test]
    fn test_resolve_outcome_prefers_source_failure() {
        let out = resolve_outcome(
            Err(CopyError::extraction("disk read error")),
            Err(CopyError::load("COPY aborted")),
        );
        assert!(out.unwrap_err().is_extraction());
    }

    #[test]
    fn test_resolve_outcome_early_target_finish() {
        let out = resolve_outcome(Err(CopyError::ConduitClosed), Ok(10));
        assert!(matches!(out, Err(CopyError::Load(_))));
    }

    #[test]
    fn test_attribution_wraps_untyped_errors() {
        let err = attribute_to_source(CopyError::Config("odd".into()));
        assert!(err.is_extraction());
        let err = attribute_to_target(CopyError::pool("gone", "copy_in"));
        assert!(matches!(err, CopyError::Load(_)));
    }
}
