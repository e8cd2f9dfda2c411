// In-process Grouped Queue
// A single mutex over the whole queue state makes every transition atomic.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::{Job, JobId, JobState, NewJob, QueueCategory, QueueConfig, QueueCounts};
use crate::error::{AppError, Result};
use crate::port::grouped_queue::{EnqueueRecord, GroupedQueue};
use crate::port::{IdProvider, TimeProvider};

#[derive(Default)]
struct QueueState {
    /// Jobs keyed by enqueue sequence
    jobs: BTreeMap<i64, Job>,
    by_id: HashMap<JobId, i64>,
    last_seq: i64,
}

pub struct InMemoryGroupedQueue {
    category: QueueCategory,
    keep_completed: usize,
    keep_failed: usize,
    state: Mutex<QueueState>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl InMemoryGroupedQueue {
    pub fn new(
        config: &QueueConfig,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            category: config.category,
            keep_completed: config.keep_completed,
            keep_failed: config.keep_failed,
            state: Mutex::new(QueueState::default()),
            time_provider,
            id_provider,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| AppError::BrokerUnavailable("in-memory queue lock poisoned".to_string()))
    }

    fn finish(&self, id: &JobId, failure: Option<&str>) -> Result<Job> {
        let now = self.time_provider.now_millis();
        let mut state = self.lock()?;

        let seq = *state
            .by_id
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("job {id} in queue \"{}\"", self.category)))?;
        let job = state
            .jobs
            .get_mut(&seq)
            .ok_or_else(|| AppError::Internal(format!("job index out of sync for {id}")))?;

        if job.state != JobState::Active {
            return Err(AppError::InvalidState(format!(
                "job {id} is {} and cannot be finished",
                job.state
            )));
        }
        match failure {
            Some(reason) => job.fail(now, reason)?,
            None => job.complete(now)?,
        }
        let finished = job.clone();

        let limit = match finished.state {
            JobState::Failed => self.keep_failed,
            _ => self.keep_completed,
        };
        evict_finished(&mut state, finished.state, limit);
        Ok(finished)
    }
}

/// Drop the oldest finished jobs of `state` beyond `keep`
fn evict_finished(state: &mut QueueState, terminal: JobState, keep: usize) {
    let mut finished: Vec<(i64, i64)> = state
        .jobs
        .values()
        .filter(|job| job.state == terminal)
        .map(|job| (job.finished_at.unwrap_or(job.enqueued_at), job.seq))
        .collect();
    if finished.len() <= keep {
        return;
    }
    finished.sort_unstable();
    let excess = finished.len() - keep;
    for (_, seq) in finished.into_iter().take(excess) {
        if let Some(job) = state.jobs.remove(&seq) {
            state.by_id.remove(&job.id);
        }
    }
}

#[async_trait]
impl GroupedQueue for InMemoryGroupedQueue {
    fn category(&self) -> QueueCategory {
        self.category
    }

    async fn enqueue(&self, record: EnqueueRecord) -> Result<Job> {
        let now = self.time_provider.now_millis();
        let id = self.id_provider.generate_id();
        let mut state = self.lock()?;

        if state.by_id.contains_key(&id) {
            return Err(AppError::Internal(format!("duplicate job id {id}")));
        }
        let seq = state.last_seq + 1;
        let job = Job::new(NewJob {
            id: id.clone(),
            category: self.category,
            group_id: record.group_id,
            payload: record.payload,
            order_key: record.order_key,
            seq,
            enqueued_at: now,
            delay_ms: record.delay_ms,
            timeout_ms: record.timeout_ms,
            sent_at: record.sent_at,
        })?;

        state.last_seq = seq;
        state.by_id.insert(id, seq);
        state.jobs.insert(seq, job.clone());
        Ok(job)
    }

    async fn next_eligible(&self) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();
        let mut state = self.lock()?;

        let busy: HashSet<&str> = state
            .jobs
            .values()
            .filter(|job| job.state == JobState::Active)
            .map(|job| job.group_id.as_str())
            .collect();

        // Head of every idle group
        let mut heads: HashMap<&str, &Job> = HashMap::new();
        for job in state.jobs.values().filter(|job| job.state.is_pending()) {
            if busy.contains(job.group_id.as_str()) {
                continue;
            }
            heads
                .entry(job.group_id.as_str())
                .and_modify(|head| {
                    if job.sort_key() < head.sort_key() {
                        *head = job;
                    }
                })
                .or_insert(job);
        }

        let chosen = heads
            .values()
            .filter(|head| head.ready_at <= now)
            .min_by_key(|head| head.sort_key())
            .map(|head| head.seq);

        let Some(seq) = chosen else {
            return Ok(None);
        };
        let job = state
            .jobs
            .get_mut(&seq)
            .ok_or_else(|| AppError::Internal(format!("job sequence {seq} vanished")))?;
        job.activate(now)?;
        Ok(Some(job.clone()))
    }

    async fn mark_completed(&self, id: &JobId) -> Result<Job> {
        self.finish(id, None)
    }

    async fn mark_failed(&self, id: &JobId, reason: &str) -> Result<Job> {
        self.finish(id, Some(reason))
    }

    async fn counts(&self) -> Result<QueueCounts> {
        let now = self.time_provider.now_millis();
        let state = self.lock()?;
        let mut counts = QueueCounts::default();
        for job in state.jobs.values() {
            match job.state_at(now) {
                JobState::Waiting => counts.waiting += 1,
                JobState::Delayed => counts.delayed += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let state = self.lock()?;
        Ok(state
            .by_id
            .get(id)
            .and_then(|seq| state.jobs.get(seq))
            .cloned())
    }

    async fn active_jobs(&self) -> Result<Vec<Job>> {
        let state = self.lock()?;
        Ok(state
            .jobs
            .values()
            .filter(|job| job.state == JobState::Active)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobPayload;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use serde_json::json;

    fn queue_with_clock(keep: usize) -> (InMemoryGroupedQueue, Arc<ManualTimeProvider>) {
        let clock = Arc::new(ManualTimeProvider::new(10_000));
        let config = QueueConfig::new(QueueCategory::Message, 2).with_retention(keep, keep);
        let queue = InMemoryGroupedQueue::new(
            &config,
            clock.clone(),
            Arc::new(SequentialIdProvider::new("job")),
        );
        (queue, clock)
    }

    fn record(group: &str, order_key: i64) -> EnqueueRecord {
        EnqueueRecord {
            group_id: group.to_string(),
            payload: JobPayload::new(json!({"groupId": group})),
            order_key,
            delay_ms: None,
            timeout_ms: None,
            sent_at: None,
        }
    }

    #[tokio::test]
    async fn test_group_is_exclusive_while_active() {
        let (queue, _) = queue_with_clock(10);
        queue.enqueue(record("g1", 1)).await.unwrap();
        queue.enqueue(record("g1", 2)).await.unwrap();

        let first = queue.next_eligible().await.unwrap().unwrap();
        assert_eq!(first.order_key, 1);
        assert!(queue.next_eligible().await.unwrap().is_none());

        queue.mark_completed(&first.id).await.unwrap();
        let second = queue.next_eligible().await.unwrap().unwrap();
        assert_eq!(second.order_key, 2);
    }

    #[tokio::test]
    async fn test_order_key_beats_arrival_order() {
        let (queue, _) = queue_with_clock(10);
        queue.enqueue(record("g1", 30)).await.unwrap();
        queue.enqueue(record("g1", 10)).await.unwrap();
        queue.enqueue(record("g1", 20)).await.unwrap();

        let mut order = Vec::new();
        while let Some(job) = queue.next_eligible().await.unwrap() {
            order.push(job.order_key);
            queue.mark_completed(&job.id).await.unwrap();
        }
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_delayed_head_blocks_its_group_only() {
        let (queue, clock) = queue_with_clock(10);
        let mut delayed = record("g1", 1);
        delayed.delay_ms = Some(500);
        queue.enqueue(delayed).await.unwrap();
        queue.enqueue(record("g1", 2)).await.unwrap();
        queue.enqueue(record("g2", 3)).await.unwrap();

        let counts = queue.counts().await.unwrap();
        assert_eq!(counts.delayed, 1);
        assert_eq!(counts.waiting, 2);

        let job = queue.next_eligible().await.unwrap().unwrap();
        assert_eq!(job.group_id, "g2");
        assert!(queue.next_eligible().await.unwrap().is_none());

        clock.advance(500);
        let job = queue.next_eligible().await.unwrap().unwrap();
        assert_eq!((job.group_id.as_str(), job.order_key), ("g1", 1));
    }

    #[tokio::test]
    async fn test_marking_errors() {
        let (queue, _) = queue_with_clock(10);
        let job = queue.enqueue(record("g1", 1)).await.unwrap();

        let err = queue.mark_completed(&job.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let err = queue.mark_failed(&"missing".to_string(), "x").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_retention_evicts_oldest_finished() {
        let (queue, clock) = queue_with_clock(2);
        let mut ids = Vec::new();
        for n in 0..3 {
            queue.enqueue(record(&format!("g{n}"), n)).await.unwrap();
            let job = queue.next_eligible().await.unwrap().unwrap();
            clock.advance(1);
            queue.mark_completed(&job.id).await.unwrap();
            ids.push(job.id);
        }

        assert_eq!(queue.counts().await.unwrap().completed, 2);
        assert!(queue.find_by_id(&ids[0]).await.unwrap().is_none());
        assert!(queue.find_by_id(&ids[2]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failure_reason_recorded() {
        let (queue, _) = queue_with_clock(10);
        queue.enqueue(record("g1", 1)).await.unwrap();
        let job = queue.next_eligible().await.unwrap().unwrap();
        assert_eq!(queue.active_jobs().await.unwrap().len(), 1);

        let failed = queue.mark_failed(&job.id, "handler exploded").await.unwrap();
        assert_eq!(failed.failure_reason.as_deref(), Some("handler exploded"));
        assert!(queue.active_jobs().await.unwrap().is_empty());
    }
}
