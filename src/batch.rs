//! Line-preserving batching of an input stream.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Receiver of full batches. Returns the number of bytes it accepted.
#[allow(async_fn_in_trait)]
pub trait BatchSink {
    async fn flush(&mut self, batch: &[u8]) -> Result<u64>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub written: u64,
    pub batches: usize,
}

/// Read `reader` line by line and hand the accumulated lines to `sink`
/// whenever they reach `threshold` bytes, then once more at end of input,
/// even if nothing is left by then.
///
/// A batch only ever holds whole lines, so it may exceed `threshold` by up
/// to one line. A last line without a trailing newline is passed on as is.
pub async fn drive<R, S>(mut reader: R, threshold: usize, sink: &mut S) -> Result<BatchStats>
where
    R: AsyncBufRead + Unpin,
    S: BatchSink,
{
    let threshold = threshold.max(1);
    let mut buf = Vec::with_capacity(threshold.min(crate::DEFAULT_BATCH_SIZE as usize));
    let mut stats = BatchStats::default();

    loop {
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("reading input failed")?;
        if n == 0 {
            break;
        }
        if buf.len() >= threshold {
            stats.written += sink.flush(&buf).await?;
            stats.batches += 1;
            buf.clear();
        }
    }
    stats.written += sink.flush(&buf).await?;
    stats.batches += 1;
    tracing::debug!("input exhausted after {} batches", stats.batches);

    Ok(stats)
}
