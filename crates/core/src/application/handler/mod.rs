// Job Handlers and the lazy per-category Handler Registry

mod export;
mod import;
mod message;

pub use export::ExportHandler;
pub use import::ImportHandler;
pub use message::MessageHandler;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use crate::domain::{Job, PerCategory, QueueCategory};
use crate::error::{AppError, Result};
use crate::port::{ProcessedStore, TimeProvider};

/// Processes one job of its category. Holds no per-job mutable state.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn category(&self) -> QueueCategory;

    async fn process(&self, job: &Job) -> Result<()>;
}

/// Closed set of built-in handlers
pub enum Handler {
    Message(MessageHandler),
    Import(ImportHandler),
    Export(ExportHandler),
}

#[async_trait]
impl JobHandler for Handler {
    fn category(&self) -> QueueCategory {
        match self {
            Handler::Message(_) => QueueCategory::Message,
            Handler::Import(_) => QueueCategory::Import,
            Handler::Export(_) => QueueCategory::Export,
        }
    }

    async fn process(&self, job: &Job) -> Result<()> {
        match self {
            Handler::Message(h) => h.process(job).await,
            Handler::Import(h) => h.process(job).await,
            Handler::Export(h) => h.process(job).await,
        }
    }
}

/// Builds the handler for a category (called at most once per category by the registry)
#[async_trait]
pub trait HandlerFactory: Send + Sync {
    async fn build(&self, category: QueueCategory) -> Result<Arc<dyn JobHandler>>;
}

/// Factory for the built-in handlers
pub struct StandardHandlerFactory {
    store: Arc<dyn ProcessedStore>,
    time_provider: Arc<dyn TimeProvider>,
    host_id: String,
    work_duration: Duration,
}

impl StandardHandlerFactory {
    pub fn new(
        store: Arc<dyn ProcessedStore>,
        time_provider: Arc<dyn TimeProvider>,
        host_id: impl Into<String>,
        work_duration: Duration,
    ) -> Self {
        Self {
            store,
            time_provider,
            host_id: host_id.into(),
            work_duration,
        }
    }
}

#[async_trait]
impl HandlerFactory for StandardHandlerFactory {
    async fn build(&self, category: QueueCategory) -> Result<Arc<dyn JobHandler>> {
        let handler = match category {
            QueueCategory::Message => {
                if self.host_id.trim().is_empty() {
                    return Err(AppError::HandlerConstruction {
                        category,
                        reason: "process host id must not be empty".to_string(),
                    });
                }
                Handler::Message(MessageHandler::new(
                    Arc::clone(&self.store),
                    Arc::clone(&self.time_provider),
                    self.host_id.clone(),
                    self.work_duration,
                ))
            }
            QueueCategory::Import => Handler::Import(ImportHandler::new(self.work_duration)),
            QueueCategory::Export => Handler::Export(ExportHandler::new(self.work_duration)),
        };
        Ok(Arc::new(handler))
    }
}

/// Category -> handler, each built on first use and reused afterwards.
///
/// A failed construction leaves the slot empty so the next job retries it.
pub struct HandlerRegistry {
    factory: Arc<dyn HandlerFactory>,
    slots: PerCategory<OnceCell<Arc<dyn JobHandler>>>,
}

impl HandlerRegistry {
    pub fn new(factory: Arc<dyn HandlerFactory>) -> Self {
        Self {
            factory,
            slots: PerCategory::from_fn(|_| OnceCell::new()),
        }
    }

    pub async fn get(&self, category: QueueCategory) -> Result<Arc<dyn JobHandler>> {
        let handler = self
            .slots
            .get(category)
            .get_or_try_init(|| async {
                let handler = self.factory.build(category).await.map_err(|e| match e {
                    AppError::HandlerConstruction { .. } => e,
                    other => AppError::HandlerConstruction {
                        category,
                        reason: other.to_string(),
                    },
                })?;
                info!(category = %category, "Handler instantiated");
                Ok::<_, AppError>(handler)
            })
            .await?;
        Ok(Arc::clone(handler))
    }

    /// Categories whose handler has been constructed so far
    pub fn instantiated(&self) -> Vec<QueueCategory> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(category, _)| category)
            .collect()
    }
}
