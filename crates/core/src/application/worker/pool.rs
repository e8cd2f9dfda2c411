// Worker Pool: `concurrency` slots per category

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::constants::{ERROR_RECOVERY_SLEEP_DURATION, IDLE_SLEEP_DURATION};
use super::shutdown::{shutdown_channel, ShutdownSender};
use super::Worker;
use crate::application::dispatch::QueueRegistry;
use crate::application::handler::HandlerRegistry;
use crate::domain::{QueueCategory, QueueConfig};
use crate::error::Result;
use crate::port::GroupedQueue;

#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    /// Idle sleep when no job is eligible
    pub poll_interval: Duration,
    /// Sleep after a broker error
    pub error_backoff: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            poll_interval: IDLE_SLEEP_DURATION,
            error_backoff: ERROR_RECOVERY_SLEEP_DURATION,
        }
    }
}

/// Outcome of closing one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolCloseReport {
    pub category: QueueCategory,
    pub finished_slots: usize,
    /// Slots still busy when the grace period ran out
    pub abandoned_slots: usize,
}

impl PoolCloseReport {
    pub fn is_clean(&self) -> bool {
        self.abandoned_slots == 0
    }
}

pub struct WorkerPool {
    category: QueueCategory,
    shutdown: ShutdownSender,
    slots: Vec<JoinHandle<Result<()>>>,
}

impl WorkerPool {
    /// Spawn `config.concurrency` slots pulling from `queue`
    pub fn start(
        config: &QueueConfig,
        queue: Arc<dyn GroupedQueue>,
        handlers: Arc<HandlerRegistry>,
        settings: PoolSettings,
    ) -> Self {
        let (shutdown, token) = shutdown_channel();
        let slots = (0..config.concurrency)
            .map(|slot| {
                let worker = Worker::new(slot, Arc::clone(&queue), Arc::clone(&handlers), &settings);
                let token = token.clone();
                tokio::spawn(async move { worker.run(token).await })
            })
            .collect();

        info!(
            category = %config.category,
            concurrency = config.concurrency,
            "{} worker pool started",
            config.category.display_name()
        );
        Self {
            category: config.category,
            shutdown,
            slots,
        }
    }

    pub fn category(&self) -> QueueCategory {
        self.category
    }

    /// Number of slots
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Stop taking jobs, wait up to `grace` for busy slots, abandon the rest
    pub async fn close(self, grace: Duration) -> PoolCloseReport {
        self.shutdown.shutdown();
        let deadline = close_deadline(grace);

        let mut finished_slots = 0;
        let mut abandoned_slots = 0;
        for mut handle in self.slots {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(_) => finished_slots += 1,
                Err(_) => {
                    handle.abort();
                    abandoned_slots += 1;
                }
            }
        }

        let report = PoolCloseReport {
            category: self.category,
            finished_slots,
            abandoned_slots,
        };
        if report.is_clean() {
            info!(category = %self.category, finished_slots, "Worker pool closed");
        } else {
            warn!(
                category = %self.category,
                finished_slots,
                abandoned_slots,
                grace_ms = grace.as_millis() as u64,
                "Worker pool closed with busy slots abandoned"
            );
        }
        report
    }
}

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + grace`, saturating to a far-future instant
fn close_deadline(grace: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(grace)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// One pool per category
pub struct WorkerPools {
    pools: Vec<WorkerPool>,
}

impl WorkerPools {
    pub fn start(queues: &QueueRegistry, handlers: Arc<HandlerRegistry>, settings: PoolSettings) -> Self {
        let pools = QueueCategory::ALL
            .into_iter()
            .map(|category| {
                WorkerPool::start(
                    queues.config(category),
                    Arc::clone(queues.queue(category)),
                    Arc::clone(&handlers),
                    settings,
                )
            })
            .collect();
        Self { pools }
    }

    /// Close every pool concurrently, sharing the same grace period
    pub async fn close(self, grace: Duration) -> Vec<PoolCloseReport> {
        join_all(self.pools.into_iter().map(|pool| pool.close(grace))).await
    }
}
