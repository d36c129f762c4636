//! Bounded in-memory byte pipe between a COPY producer and consumer.
//!
//! The writer end can finish the stream cleanly (drop or [`ConduitWriter::close`])
//! or with a failure reason ([`ConduitWriter::close_with_error`]). The reader
//! sees every chunk written before the close, in order, followed by either a
//! clean end of stream or the failure as [`CopyError::Extraction`].
//!
//! Capacity is counted in chunks, so a slow reader blocks the writer.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{CopyError, Result};

/// Default number of chunks buffered between producer and consumer.
pub const DEFAULT_CONDUIT_CAPACITY: usize = 16;

#[derive(Debug)]
enum Frame {
    Data(Bytes),
    Failed(String),
}

/// Create a conduit holding at most `capacity` chunks in flight.
pub fn pipe(capacity: usize) -> (ConduitWriter, ConduitReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ConduitWriter { tx: Some(tx) },
        ConduitReader {
            rx,
            finished: false,
        },
    )
}

/// Producer end of a conduit.
#[derive(Debug)]
pub struct ConduitWriter {
    tx: Option<mpsc::Sender<Frame>>,
}

impl ConduitWriter {
    /// Write one chunk, waiting while the conduit is full.
    ///
    /// Fails with [`CopyError::ConduitClosed`] if the reader is gone or the
    /// writer was already closed.
    pub async fn write(&mut self, chunk: Bytes) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let tx = self.tx.as_ref().ok_or(CopyError::ConduitClosed)?;
        tx.send(Frame::Data(chunk))
            .await
            .map_err(|_| CopyError::ConduitClosed)
    }

    /// End the stream cleanly.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// End the stream with a failure the reader will observe after the
    /// chunks already written.
    pub async fn close_with_error(&mut self, reason: impl Into<String>) {
        if let Some(tx) = self.tx.take() {
            // A vanished reader has nothing left to tell.
            let _ = tx.send(Frame::Failed(reason.into())).await;
        }
    }
}

/// Consumer end of a conduit.
#[derive(Debug)]
pub struct ConduitReader {
    rx: mpsc::Receiver<Frame>,
    finished: bool,
}

impl ConduitReader {
    /// Next chunk, `Ok(None)` at a clean end of stream, or the producer's
    /// failure as [`CopyError::Extraction`].
    pub async fn read(&mut self) -> Result<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(Frame::Data(chunk)) => Ok(Some(chunk)),
            Some(Frame::Failed(reason)) => {
                self.finished = true;
                self.rx.close();
                Err(CopyError::Extraction(reason))
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Drain the conduit into one buffer.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.read().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}
