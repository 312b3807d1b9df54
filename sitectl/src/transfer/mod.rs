//! Streaming download helpers.

pub mod progress;
pub mod progress_stream;

use crate::{Error, Result};
use futures_util::TryStreamExt;
use progress::ProgressTracker;
use progress_stream::ProgressStream;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tracing::info;

/// Stream a response body into `dest` without buffering it in memory.
///
/// Only HTTP 200 is accepted; any other status fails before `dest` is
/// created. Returns the number of bytes written.
pub async fn stream_to_file(response: reqwest::Response, dest: &Path) -> Result<u64> {
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(Error::remote(
            status.as_u16(),
            format!("Download of {} failed", response.url()),
        ));
    }

    let tracker = Arc::new(Mutex::new(ProgressTracker::new(response.content_length())));
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let callback_tracker = Arc::clone(&tracker);
    let callback_name = file_name.clone();
    let callback = Arc::new(move |bytes: u64| {
        if let Ok(mut tracker) = callback_tracker.lock() {
            info!("Downloading {}: {}", callback_name, tracker.update(bytes).describe());
        }
    });

    let body = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
    let mut reader = StreamReader::new(ProgressStream::new(body, callback));

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(dest).await?;
    let written = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;

    if let Ok(tracker) = tracker.lock() {
        info!(
            "Downloaded {} ({}, average {})",
            file_name,
            progress::format_bytes(written),
            progress::format_speed(tracker.average_speed())
        );
    }

    Ok(written)
}
