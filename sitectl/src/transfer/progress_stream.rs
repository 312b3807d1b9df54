//! Progress-tracking stream wrapper for backup downloads.

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::time::{Duration, Instant};

/// Called with the running byte count
pub type ProgressCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Stream wrapper that counts bytes and reports them at most every
/// `update_interval`, plus once at the end of the stream.
pub struct ProgressStream<S> {
    inner: S,
    bytes_transferred: u64,
    last_update: Instant,
    update_interval: Duration,
    callback: ProgressCallback,
}

impl<S> ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    pub fn new(inner: S, callback: ProgressCallback) -> Self {
        Self::with_interval(inner, callback, Duration::from_secs(5))
    }

    pub fn with_interval(inner: S, callback: ProgressCallback, update_interval: Duration) -> Self {
        Self {
            inner,
            bytes_transferred: 0,
            last_update: Instant::now(),
            update_interval,
            callback,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
{
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let inner = Pin::new(&mut self.inner);

        match inner.poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                self.bytes_transferred += bytes.len() as u64;

                let now = Instant::now();
                if now.duration_since(self.last_update) >= self.update_interval {
                    (self.callback)(self.bytes_transferred);
                    self.last_update = now;
                }

                Poll::Ready(Some(Ok(bytes)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => {
                (self.callback)(self.bytes_transferred);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_final_callback_reports_total() {
        let seen = Arc::new(AtomicU64::new(0));
        let seen_clone = Arc::clone(&seen);
        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"defgh")),
        ];

        let mut progress = ProgressStream::new(
            stream::iter(chunks),
            Arc::new(move |bytes| seen_clone.store(bytes, Ordering::Relaxed)),
        );
        while progress.next().await.is_some() {}

        assert_eq!(seen.load(Ordering::Relaxed), 8);
    }
}
