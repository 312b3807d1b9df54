//! Byte-level progress tracking for backup downloads.

use std::time::{Duration, Instant};

/// Progress of a single download
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    /// Expected size from `Content-Length`, when the server sent one
    pub total_bytes: Option<u64>,

    /// Bytes written so far
    pub transferred_bytes: u64,

    /// Current transfer speed in bytes/second
    pub bytes_per_second: u64,

    /// Estimated time remaining (seconds), zero when unknown
    pub eta_seconds: u64,
}

impl DownloadProgress {
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            total_bytes,
            transferred_bytes: 0,
            bytes_per_second: 0,
            eta_seconds: 0,
        }
    }

    /// Percentage complete, when the total is known
    pub fn percent_complete(&self) -> Option<f64> {
        match self.total_bytes {
            Some(total) if total > 0 => {
                Some((self.transferred_bytes as f64 / total as f64) * 100.0)
            }
            _ => None,
        }
    }

    /// One-line summary for log output
    pub fn describe(&self) -> String {
        let mut line = format!(
            "{} at {}",
            format_bytes(self.transferred_bytes),
            format_speed(self.bytes_per_second)
        );
        if let (Some(total), Some(percent)) = (self.total_bytes, self.percent_complete()) {
            line = format!(
                "{} of {} ({:.1}%) at {}, {} left",
                format_bytes(self.transferred_bytes),
                format_bytes(total),
                percent,
                format_speed(self.bytes_per_second),
                format_duration(self.eta_seconds)
            );
        }
        line
    }
}

/// Progress tracker with time-based speed calculation
pub struct ProgressTracker {
    start_time: Instant,
    last_update_time: Instant,
    last_bytes: u64,
    progress: DownloadProgress,
}

impl ProgressTracker {
    pub fn new(total_bytes: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_update_time: now,
            last_bytes: 0,
            progress: DownloadProgress::new(total_bytes),
        }
    }

    /// Update progress and calculate speed
    pub fn update(&mut self, transferred_bytes: u64) -> &DownloadProgress {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update_time).as_secs_f64();

        if elapsed > 0.0 {
            let bytes_diff = transferred_bytes.saturating_sub(self.last_bytes);
            self.progress.bytes_per_second = (bytes_diff as f64 / elapsed) as u64;
        }

        if let Some(total) = self.progress.total_bytes {
            if self.progress.bytes_per_second > 0 {
                let remaining_bytes = total.saturating_sub(transferred_bytes);
                self.progress.eta_seconds = remaining_bytes / self.progress.bytes_per_second;
            }
        }

        self.progress.transferred_bytes = transferred_bytes;
        self.last_update_time = now;
        self.last_bytes = transferred_bytes;

        &self.progress
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average speed since start
    pub fn average_speed(&self) -> u64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            (self.progress.transferred_bytes as f64 / elapsed) as u64
        } else {
            0
        }
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format speed as human-readable string
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Format duration as human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
