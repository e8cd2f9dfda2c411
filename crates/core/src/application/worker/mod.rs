// Worker - one slot of a category's pool

pub mod constants;
mod pool;
mod shutdown;

pub use pool::{PoolCloseReport, PoolSettings, WorkerPool, WorkerPools};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::handler::HandlerRegistry;
use crate::application::truncation::hold_group;
use crate::domain::{Job, QueueCategory};
use crate::error::{AppError, Result};
use crate::port::GroupedQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// A worker slot: processes at most one job at a time
pub struct Worker {
    slot: usize,
    queue: Arc<dyn GroupedQueue>,
    handlers: Arc<HandlerRegistry>,
    idle_sleep: Duration,
    error_backoff: Duration,
}

impl Worker {
    pub fn new(
        slot: usize,
        queue: Arc<dyn GroupedQueue>,
        handlers: Arc<HandlerRegistry>,
        settings: &PoolSettings,
    ) -> Self {
        Self {
            slot,
            queue,
            handlers,
            idle_sleep: settings.poll_interval,
            error_backoff: settings.error_backoff,
        }
    }

    fn category(&self) -> QueueCategory {
        self.queue.category()
    }

    /// Run the slot loop until shutdown
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        let category = self.category();
        info!(category = %category, slot = self.slot, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(self.idle_sleep) => {},
                        _ = shutdown.wait() => break,
                    }
                }
                Err(e) => {
                    error!(category = %category, slot = self.slot, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(self.error_backoff) => {},
                        _ = shutdown.wait() => {
                            info!(category = %category, slot = self.slot, "Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(category = %category, slot = self.slot, "Worker stopped");
        Ok(())
    }

    /// Process the next eligible job (returns true if a job was taken)
    pub async fn process_next_job(&self) -> Result<bool> {
        // Already atomically activated by the broker
        let job = match self.queue.next_eligible().await? {
            Some(j) => j,
            None => return Ok(false),
        };
        let category = self.category();

        let handler = match self.handlers.get(category).await {
            Ok(h) => h,
            Err(e) => {
                error!(
                    category = %category,
                    job_id = %job.id,
                    group_id = %job.group_id,
                    error = %e,
                    "Handler unavailable, failing job"
                );
                self.record_outcome(&job, Some(e.to_string().as_str())).await?;
                return Ok(true);
            }
        };

        info!(
            category = %category,
            job_id = %job.id,
            group_id = %job.group_id,
            timeout_ms = ?job.timeout_ms,
            "Processing job"
        );

        // Job body in its own task: a panicking handler must not take the slot down
        let job = Arc::new(job);
        let job_for_exec = Arc::clone(&job);
        let handle = tokio::task::spawn(async move {
            hold_group(job_for_exec.timeout_ms).await;
            handler.process(&job_for_exec).await
        });

        match handle.await {
            Ok(Ok(())) => {
                self.record_outcome(&job, None).await?;
                info!(category = %category, job_id = %job.id, group_id = %job.group_id, "Job completed");
            }
            Ok(Err(e)) => {
                warn!(category = %category, job_id = %job.id, group_id = %job.group_id, error = %e, "Job failed");
                self.record_outcome(&job, Some(e.to_string().as_str())).await?;
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "handler panicked"
                } else {
                    "handler task cancelled"
                };
                error!(category = %category, job_id = %job.id, group_id = %job.group_id, "{}", reason);
                self.record_outcome(&job, Some(reason)).await?;
            }
        }
        Ok(true)
    }

    /// Mark the job completed (`failure == None`) or failed.
    ///
    /// An unreachable broker is retried every `error_backoff`: the job stays
    /// active, and so does its group, until the transition is recorded.
    async fn record_outcome(&self, job: &Job, failure: Option<&str>) -> Result<()> {
        loop {
            let result = match failure {
                None => self.queue.mark_completed(&job.id).await,
                Some(reason) => self.queue.mark_failed(&job.id, reason).await,
            };
            match result {
                Ok(_) => return Ok(()),
                Err(AppError::BrokerUnavailable(e)) => {
                    warn!(
                        category = %job.category,
                        job_id = %job.id,
                        group_id = %job.group_id,
                        error = %e,
                        "Could not record job outcome, retrying"
                    );
                    sleep(self.error_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
