// Dispatch Service - submission, status and worker startup

mod registry;

pub use registry::{QueueBinding, QueueRegistry};

use std::sync::Arc;

use crate::application::handler::HandlerRegistry;
use crate::application::ingestion::{IngestionSequencer, SubmitOptions};
use crate::application::worker::{PoolSettings, WorkerPools};
use crate::domain::{CategoryStatus, Job, QueueCategory};
use crate::error::Result;
use crate::port::TimeProvider;

/// Entry point used by the RPC surface and the composition root
pub struct DispatchService {
    queues: Arc<QueueRegistry>,
    handlers: Arc<HandlerRegistry>,
    sequencer: Arc<IngestionSequencer>,
}

impl DispatchService {
    pub fn new(
        queues: Arc<QueueRegistry>,
        handlers: Arc<HandlerRegistry>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let sequencer = Arc::new(IngestionSequencer::new(Arc::clone(&queues), time_provider));
        Self {
            queues,
            handlers,
            sequencer,
        }
    }

    /// Submit a job; returns once it is enqueued
    pub async fn submit_job(
        &self,
        category: QueueCategory,
        payload: serde_json::Value,
        options: SubmitOptions,
    ) -> Result<Job> {
        self.sequencer.submit(category, payload, options).await
    }

    pub async fn get_counts(&self, category: QueueCategory) -> Result<CategoryStatus> {
        let counts = self.queues.queue(category).counts().await?;
        Ok(CategoryStatus {
            category,
            display_name: category.display_name().to_string(),
            concurrency: self.queues.config(category).concurrency,
            counts,
        })
    }

    /// Status of every category, in category order
    pub async fn get_all_counts(&self) -> Result<Vec<CategoryStatus>> {
        let mut statuses = Vec::with_capacity(QueueCategory::ALL.len());
        for category in QueueCategory::ALL {
            statuses.push(self.get_counts(category).await?);
        }
        Ok(statuses)
    }

    pub async fn find_job(&self, category: QueueCategory, id: &str) -> Result<Option<Job>> {
        self.queues.queue(category).find_by_id(&id.to_string()).await
    }

    /// Categories whose handler has been built so far
    pub fn instantiated_handlers(&self) -> Vec<QueueCategory> {
        self.handlers.instantiated()
    }

    /// Start one worker pool per category
    pub fn start_workers(&self, settings: PoolSettings) -> WorkerPools {
        WorkerPools::start(&self.queues, Arc::clone(&self.handlers), settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handler::StandardHandlerFactory;
    use crate::domain::{PerCategory, QueueConfig};
    use crate::port::id_provider::UuidProvider;
    use crate::port::processed_store::mocks::InMemoryProcessedStore;
    use crate::port::time_provider::SystemTimeProvider;
    use crate::port::{InMemoryGroupedQueue, ProcessedStore};
    use crate::AppError;
    use serde_json::json;
    use std::time::Duration;

    fn service(store: Arc<InMemoryProcessedStore>) -> DispatchService {
        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let bindings = PerCategory::from_fn(|c| {
            let config = QueueConfig::default_for(c);
            let queue = InMemoryGroupedQueue::new(&config, Arc::clone(&time), Arc::new(UuidProvider));
            QueueBinding::new(config, Arc::new(queue))
        });
        let queues = Arc::new(QueueRegistry::new(bindings).unwrap());
        let factory = StandardHandlerFactory::new(store, Arc::clone(&time), "host-test", Duration::ZERO);
        let handlers = Arc::new(HandlerRegistry::new(Arc::new(factory)));
        DispatchService::new(queues, handlers, time)
    }

    #[tokio::test]
    async fn test_status_reports_every_category_with_config() {
        let svc = service(Arc::new(InMemoryProcessedStore::new()));
        svc.submit_job(
            QueueCategory::Import,
            json!({"instanceId": "i1", "importType": "csv"}),
            SubmitOptions {
                delay_ms: Some(60_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let all = svc.get_all_counts().await.unwrap();
        let categories: Vec<_> = all.iter().map(|s| s.category).collect();
        assert_eq!(categories, QueueCategory::ALL.to_vec());
        assert_eq!(all[0].concurrency, 5);
        assert_eq!(all[1].counts.delayed, 1);
        assert_eq!(all[1].display_name, "Importations Queue");
    }

    #[tokio::test]
    async fn test_missing_group_rejected_at_submission() {
        let svc = service(Arc::new(InMemoryProcessedStore::new()));
        let err = svc
            .submit_job(QueueCategory::Message, json!({"message": {}}), SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_submission_error());
        assert!(matches!(err, AppError::MissingGroupId { .. }));
        let status = svc.get_counts(QueueCategory::Message).await.unwrap();
        assert_eq!(status.counts.waiting, 0);
    }

    #[tokio::test]
    async fn test_out_of_order_submissions_processed_in_order_key_order() {
        let store = Arc::new(InMemoryProcessedStore::new());
        let svc = service(Arc::clone(&store));

        let mut ids = Vec::new();
        for (order_key, text) in [(300, "third"), (100, "first"), (200, "second")] {
            let job = svc
                .submit_job(
                    QueueCategory::Message,
                    json!({"instanceId": "i1", "customerId": "c1", "message": {"type": "text", "text": text}}),
                    SubmitOptions {
                        order_key: Some(order_key),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            ids.push(job.id);
        }

        let pools = svc.start_workers(PoolSettings {
            poll_interval: Duration::from_millis(5),
            error_backoff: Duration::from_millis(5),
        });
        while svc.get_counts(QueueCategory::Message).await.unwrap().counts.completed < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let reports = pools.close(Duration::from_secs(1)).await;
        assert!(reports.iter().all(|r| r.is_clean()));

        let texts: Vec<_> = store
            .list_by_group("i1:c1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.details["text"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(svc.instantiated_handlers(), vec![QueueCategory::Message]);

        let job = svc.find_job(QueueCategory::Message, &ids[0]).await.unwrap().unwrap();
        assert_eq!(job.order_key, 300);
    }
}
