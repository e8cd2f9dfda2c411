// Ingestion Sequencer: per-category FIFO of "resolve group + enqueue"

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::application::dispatch::QueueRegistry;
use crate::domain::group::GROUP_ID_FIELD;
use crate::domain::{resolve_group_id, Job, JobPayload, PerCategory, QueueCategory};
use crate::error::{AppError, Result};
use crate::port::{EnqueueRecord, TimeProvider};

/// Longest accepted `delay_ms` (one year)
pub const MAX_DELAY_MS: i64 = 365 * 24 * 60 * 60 * 1_000;
/// Longest accepted `timeout_ms` (one day)
pub const MAX_TIMEOUT_MS: i64 = 24 * 60 * 60 * 1_000;

/// Per-submission options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitOptions {
    /// Intra-group order (defaults to the submission time)
    pub order_key: Option<i64>,
    pub delay_ms: Option<i64>,
    /// Overrides payload-derived grouping
    pub group_id: Option<String>,
    /// In-slot wait before the handler runs
    pub timeout_ms: Option<i64>,
    pub sent_at: Option<i64>,
}

struct PendingTask {
    category: QueueCategory,
    payload: serde_json::Value,
    options: SubmitOptions,
    reply: oneshot::Sender<Result<Job>>,
}

#[derive(Default)]
struct Lane {
    tasks: VecDeque<PendingTask>,
    draining: bool,
}

/// Resets a lane whose drain task unwound mid-loop.
///
/// Leftover tasks get a fresh drain task; an empty lane is released.
struct DrainGuard {
    sequencer: Arc<IngestionSequencer>,
    category: QueueCategory,
    armed: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut lane = self.sequencer.lane(self.category);
        if lane.tasks.is_empty() {
            lane.draining = false;
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                drop(lane);
                warn!(category = %self.category, "Ingestion drain restarted after a panic");
                let sequencer = Arc::clone(&self.sequencer);
                handle.spawn(sequencer.drain(self.category));
            }
            Err(_) => lane.draining = false,
        }
    }
}

/// Serializes submissions per category.
///
/// Each category has one lane and at most one drain task. The drain task
/// clears `draining` under the same lock that observed the lane empty, so a
/// task pushed concurrently is either seen by the running drain or starts a
/// new one.
pub struct IngestionSequencer {
    queues: Arc<QueueRegistry>,
    time_provider: Arc<dyn TimeProvider>,
    lanes: PerCategory<Mutex<Lane>>,
}

impl IngestionSequencer {
    pub fn new(queues: Arc<QueueRegistry>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            queues,
            time_provider,
            lanes: PerCategory::from_fn(|_| Mutex::new(Lane::default())),
        }
    }

    /// Queue a submission and wait for its enqueue result.
    ///
    /// Dropping the returned future does not cancel the submission.
    pub async fn submit(
        self: &Arc<Self>,
        category: QueueCategory,
        payload: serde_json::Value,
        options: SubmitOptions,
    ) -> Result<Job> {
        let (reply, rx) = oneshot::channel();
        let start_drain = {
            let mut lane = self.lane(category);
            lane.tasks.push_back(PendingTask {
                category,
                payload,
                options,
                reply,
            });
            !std::mem::replace(&mut lane.draining, true)
        };

        if start_drain {
            tokio::spawn(Arc::clone(self).drain(category));
        }

        rx.await
            .map_err(|_| AppError::Internal(format!("ingestion lane \"{category}\" dropped a task")))?
    }

    fn lane(&self, category: QueueCategory) -> MutexGuard<'_, Lane> {
        self.lanes
            .get(category)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn drain(self: Arc<Self>, category: QueueCategory) {
        let mut guard = DrainGuard {
            sequencer: Arc::clone(&self),
            category,
            armed: true,
        };
        loop {
            let task = {
                let mut lane = self.lane(category);
                match lane.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        lane.draining = false;
                        guard.armed = false;
                        return;
                    }
                }
            };

            let result = self.ingest(task.category, task.payload, task.options).await;
            if let Err(e) = &result {
                warn!(category = %category, error = %e, "Submission rejected");
            }
            // Receiver may have given up waiting; the job stays enqueued
            let _ = task.reply.send(result);
        }
    }

    async fn ingest(
        &self,
        category: QueueCategory,
        payload: serde_json::Value,
        options: SubmitOptions,
    ) -> Result<Job> {
        if !payload.is_object() {
            return Err(AppError::Validation(format!(
                "payload for queue \"{category}\" must be a JSON object"
            )));
        }
        check_bound("delayMs", options.delay_ms, MAX_DELAY_MS)?;
        check_bound("timeoutMs", options.timeout_ms, MAX_TIMEOUT_MS)?;
        let mut payload = JobPayload::new(payload);
        let group_id = resolve_group_id(category, &payload, options.group_id.as_deref())?;
        payload.set_field(GROUP_ID_FIELD, serde_json::Value::String(group_id.clone()));

        let now = self.time_provider.now_millis();
        let record = EnqueueRecord {
            group_id,
            payload,
            order_key: options.order_key.unwrap_or(now),
            delay_ms: options.delay_ms,
            timeout_ms: options.timeout_ms,
            sent_at: Some(options.sent_at.unwrap_or(now)),
        };

        let job = self.queues.queue(category).enqueue(record).await?;
        debug!(
            category = %category,
            job_id = %job.id,
            group_id = %job.group_id,
            order_key = job.order_key,
            "Job enqueued"
        );
        Ok(job)
    }
}

fn check_bound(name: &str, value: Option<i64>, max: i64) -> Result<()> {
    match value {
        Some(v) if v > max => Err(AppError::Validation(format!(
            "{name} of {v} exceeds the maximum of {max}"
        ))),
        _ => Ok(()),
    }
}
