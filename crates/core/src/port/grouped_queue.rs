// Grouped Queue Port (broker contract)

use async_trait::async_trait;

use crate::domain::{GroupId, Job, JobId, JobPayload, QueueCategory, QueueCounts};
use crate::error::Result;

/// Everything the broker needs to enqueue one job (group already resolved)
#[derive(Debug, Clone)]
pub struct EnqueueRecord {
    pub group_id: GroupId,
    pub payload: JobPayload,
    pub order_key: i64,
    pub delay_ms: Option<i64>,
    pub timeout_ms: Option<i64>,
    pub sent_at: Option<i64>,
}

/// One category's grouped queue.
///
/// Implementations must make `next_eligible` atomic: between choosing a job
/// and marking it active no other caller may activate a job of the same group.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupedQueue: Send + Sync {
    /// Category this queue serves
    fn category(&self) -> QueueCategory;

    /// Store a new pending job; the broker assigns id and sequence
    async fn enqueue(&self, record: EnqueueRecord) -> Result<Job>;

    /// Activate and return the next eligible job, if any.
    ///
    /// Eligible: pending, ready, no active job in its group, and no earlier
    /// pending job (by order key, then sequence) in its group.
    async fn next_eligible(&self) -> Result<Option<Job>>;

    /// Active -> Completed
    async fn mark_completed(&self, id: &JobId) -> Result<Job>;

    /// Active -> Failed
    async fn mark_failed(&self, id: &JobId, reason: &str) -> Result<Job>;

    async fn counts(&self) -> Result<QueueCounts>;

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Jobs currently active (recovery and diagnostics)
    async fn active_jobs(&self) -> Result<Vec<Job>>;
}
