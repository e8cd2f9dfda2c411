// Stalled job recovery (startup)
use crate::application::dispatch::QueueRegistry;
use crate::domain::QueueCategory;
use crate::error::Result;
use crate::port::TimeProvider;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_STALLED_WINDOW_MS;

/// Reason recorded on jobs failed by recovery
pub const STALLED_REASON: &str = "stalled: owning process stopped before finishing";

/// Stalled job recovery service
///
/// A job left active by a process that died keeps its group blocked forever.
/// On startup, jobs active for longer than their own `timeout_ms` plus the
/// stalled window are marked failed so the rest of their group can be
/// dispatched.
pub struct RecoveryService {
    queues: Arc<QueueRegistry>,
    time_provider: Arc<dyn TimeProvider>,
    stalled_window_ms: i64,
}

impl RecoveryService {
    /// # Arguments
    /// * `stalled_window_ms` - Optional custom window (default: 5 minutes)
    pub fn new(
        queues: Arc<QueueRegistry>,
        time_provider: Arc<dyn TimeProvider>,
        stalled_window_ms: Option<i64>,
    ) -> Self {
        Self {
            queues,
            time_provider,
            stalled_window_ms: stalled_window_ms.unwrap_or(DEFAULT_STALLED_WINDOW_MS),
        }
    }

    /// Fail stalled jobs in every category; returns how many were failed
    pub async fn recover_stalled_jobs(&self) -> Result<usize> {
        let mut recovered = 0;
        for category in QueueCategory::ALL {
            recovered += self.recover_category(category).await?;
        }
        info!(recovered_count = recovered, "Stalled job recovery complete");
        Ok(recovered)
    }

    async fn recover_category(&self, category: QueueCategory) -> Result<usize> {
        let queue = self.queues.queue(category);
        let now = self.time_provider.now_millis();

        let mut recovered = 0;
        for job in queue.active_jobs().await? {
            // Missing started_at on an active job is inconsistent: treat as stalled
            let stalled = job
                .started_at
                .map_or(true, |started| self.stalled_after(started, job.timeout_ms) < now);
            if !stalled {
                continue;
            }
            warn!(
                category = %category,
                job_id = %job.id,
                group_id = %job.group_id,
                started_at = ?job.started_at,
                "Stalled job found, marking as FAILED"
            );
            queue.mark_failed(&job.id, STALLED_REASON).await?;
            recovered += 1;
        }
        Ok(recovered)
    }

    /// Last instant a job started at `started` may still be legitimately active
    fn stalled_after(&self, started: i64, timeout_ms: Option<i64>) -> i64 {
        started
            .saturating_add(timeout_ms.unwrap_or(0).max(0))
            .saturating_add(self.stalled_window_ms)
    }
}
