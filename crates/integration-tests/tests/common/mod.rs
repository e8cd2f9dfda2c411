//! Shared fixture: SQLite-backed engine wired like the daemon

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use groupq_core::application::{
    DispatchService, HandlerFactory, HandlerRegistry, PoolSettings, QueueBinding, QueueRegistry,
    StandardHandlerFactory,
};
use groupq_core::domain::{PerCategory, QueueCategory, QueueConfig};
use groupq_core::port::id_provider::UuidProvider;
use groupq_core::port::time_provider::SystemTimeProvider;
use groupq_core::port::TimeProvider;
use groupq_infra_sqlite::{
    create_pool, run_migrations, SqliteGroupedQueue, SqlitePool, SqliteProcessedStore,
};

pub async fn memory_pool() -> SqlitePool {
    let pool = create_pool(":memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

pub fn sqlite_queues(
    pool: &SqlitePool,
    concurrency: impl Fn(QueueCategory) -> usize,
    time_provider: Arc<dyn TimeProvider>,
) -> Arc<QueueRegistry> {
    let bindings = PerCategory::from_fn(|category| {
        let config = QueueConfig::new(category, concurrency(category));
        let queue = SqliteGroupedQueue::new(
            pool.clone(),
            &config,
            Arc::clone(&time_provider),
            Arc::new(UuidProvider),
        );
        QueueBinding::new(config, Arc::new(queue))
    });
    Arc::new(QueueRegistry::new(bindings).unwrap())
}

pub struct Engine {
    pub pool: SqlitePool,
    pub store: Arc<SqliteProcessedStore>,
    pub dispatch: Arc<DispatchService>,
}

/// Engine with the built-in handlers (no simulated work)
pub async fn standard_engine(concurrency: impl Fn(QueueCategory) -> usize) -> Engine {
    let pool = memory_pool().await;
    let store = Arc::new(SqliteProcessedStore::new(pool.clone()));
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let factory = StandardHandlerFactory::new(
        store.clone(),
        Arc::clone(&time),
        "host-it",
        Duration::ZERO,
    );
    let dispatch = dispatch_with(&pool, concurrency, Arc::new(factory));
    Engine {
        pool,
        store,
        dispatch,
    }
}

pub fn dispatch_with(
    pool: &SqlitePool,
    concurrency: impl Fn(QueueCategory) -> usize,
    factory: Arc<dyn HandlerFactory>,
) -> Arc<DispatchService> {
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let queues = sqlite_queues(pool, concurrency, Arc::clone(&time));
    let handlers = Arc::new(HandlerRegistry::new(factory));
    Arc::new(DispatchService::new(queues, handlers, time))
}

pub fn fast_settings() -> PoolSettings {
    PoolSettings {
        poll_interval: Duration::from_millis(10),
        error_backoff: Duration::from_millis(50),
    }
}

/// Poll until `expected` jobs of the category have finished
pub async fn wait_finished(dispatch: &DispatchService, category: QueueCategory, expected: u64) {
    let wait = async {
        loop {
            let counts = dispatch.get_counts(category).await.unwrap().counts;
            if counts.completed + counts.failed >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(30), wait)
        .await
        .expect("jobs did not finish in time");
}
