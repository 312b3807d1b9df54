//! Bounded fixed-interval polling of remote tasks and notifications.

use crate::api::{TaskStatus, TaskStatusSource};
use crate::config::BackupConfig;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Waits for a set of remote tasks. The default budget is 200 sweeps at
/// 15 second intervals.
#[derive(Debug, Clone, Copy)]
pub struct TaskPoller {
    interval: Duration,
    iteration_limit: u32,
}

impl Default for TaskPoller {
    fn default() -> Self {
        Self::new(Duration::from_secs(15), 200)
    }
}

impl TaskPoller {
    pub fn new(interval: Duration, iteration_limit: u32) -> Self {
        Self {
            interval,
            iteration_limit,
        }
    }

    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(
            Duration::from_secs(config.poll_interval_secs),
            config.poll_iteration_limit,
        )
    }

    /// True only when every task completed with a success status within the
    /// iteration budget. A status check error also yields false.
    pub async fn wait<S: TaskStatusSource>(&self, source: &S, ids: &[String]) -> bool {
        match self.wait_for_all(source, ids).await {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// Like [`wait`](Self::wait) but keeps timeouts and task failures
    /// apart.
    pub async fn wait_for_all<S: TaskStatusSource>(&self, source: &S, ids: &[String]) -> Result<()> {
        let mut pending: Vec<String> = ids.to_vec();
        let mut finished: Vec<TaskStatus> = Vec::with_capacity(ids.len());
        let mut iteration = 0u32;

        info!(
            "Waiting for {} task(s): {} checks at {}s intervals at most",
            ids.len(),
            self.iteration_limit,
            self.interval.as_secs()
        );

        while iteration < self.iteration_limit {
            let mut still_pending = Vec::with_capacity(pending.len());
            for id in pending {
                let status = source.task_status(&id).await?;
                if status.completed {
                    debug!("Task {} completed with status {}", id, status.status);
                    finished.push(status);
                } else {
                    still_pending.push(id);
                }
            }
            pending = still_pending;

            if pending.is_empty() {
                break;
            }

            iteration += 1;
            debug!(
                "{} task(s) pending after check {}/{}",
                pending.len(),
                iteration,
                self.iteration_limit
            );
            tokio::time::sleep(self.interval).await;
        }

        if !pending.is_empty() {
            warn!("Tasks still pending: {}", pending.join(", "));
            return Err(Error::Timeout {
                iterations: self.iteration_limit,
                interval_secs: self.interval.as_secs(),
            });
        }

        if let Some(failed) = finished.iter().find(|s| !s.succeeded) {
            return Err(Error::TaskFailed {
                id: failed.id.clone(),
                status: failed.status.clone(),
            });
        }

        info!("All {} task(s) completed successfully", finished.len());
        Ok(())
    }
}
