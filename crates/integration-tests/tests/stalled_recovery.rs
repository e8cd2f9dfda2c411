//! Stalled job recovery across a daemon restart (file-backed SQLite)

use std::collections::HashSet;
use std::sync::Arc;

use groupq_core::application::recovery::STALLED_REASON;
use groupq_core::application::{QueueBinding, QueueRegistry, RecoveryService};
use groupq_core::domain::{JobPayload, JobState, PerCategory, QueueCategory, QueueConfig};
use groupq_core::port::id_provider::UuidProvider;
use groupq_core::port::time_provider::mocks::ManualTimeProvider;
use groupq_core::port::{EnqueueRecord, GroupedQueue};
use groupq_infra_sqlite::{
    create_pool, database_url, run_migrations, SqliteGroupedQueue, SqlitePool,
};
use serde_json::json;

const MINUTE_MS: i64 = 60 * 1000;

async fn open(path: &std::path::Path) -> SqlitePool {
    let pool = create_pool(&database_url(path)).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

fn registry(pool: &SqlitePool, clock: &Arc<ManualTimeProvider>) -> Arc<QueueRegistry> {
    let bindings = PerCategory::from_fn(|category| {
        let config = QueueConfig::default_for(category);
        let queue = SqliteGroupedQueue::new(
            pool.clone(),
            &config,
            clock.clone(),
            Arc::new(UuidProvider),
        );
        QueueBinding::new(config, Arc::new(queue))
    });
    Arc::new(QueueRegistry::new(bindings).unwrap())
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
async fn test_restart_fails_stalled_job_and_unblocks_group() {
    let path = std::env::temp_dir().join(format!("groupq_recovery_{}.db", uuid::Uuid::new_v4()));
    let clock = Arc::new(ManualTimeProvider::new(1_000_000));

    // First process: a job is claimed, then the process dies
    let (stalled_id, follower_id) = {
        let pool = open(&path).await;
        let queues = registry(&pool, &clock);
        let export = queues.queue(QueueCategory::Export);

        let stalled = export.enqueue(record("g", 1)).await.unwrap();
        let follower = export.enqueue(record("g", 2)).await.unwrap();
        export.enqueue(record("h", 3)).await.unwrap();

        let claimed = export.next_eligible().await.unwrap().unwrap();
        assert_eq!(claimed.id, stalled.id);
        pool.close().await;
        (stalled.id, follower.id)
    };

    // Second process, ten minutes later
    clock.advance(10 * MINUTE_MS);
    let pool = open(&path).await;
    let queues = registry(&pool, &clock);
    let export = Arc::clone(queues.queue(QueueCategory::Export));

    let recovery = RecoveryService::new(Arc::clone(&queues), clock.clone(), None);
    assert_eq!(recovery.recover_stalled_jobs().await.unwrap(), 1);

    let stalled = export.find_by_id(&stalled_id).await.unwrap().unwrap();
    assert_eq!(stalled.state, JobState::Failed);
    assert_eq!(stalled.failure_reason.as_deref(), Some(STALLED_REASON));

    let mut dispatched = HashSet::new();
    let mut ids = HashSet::new();
    while let Some(job) = export.next_eligible().await.unwrap() {
        dispatched.insert(job.group_id.clone());
        ids.insert(job.id);
    }
    assert_eq!(dispatched, HashSet::from(["g".to_string(), "h".to_string()]));
    assert!(ids.contains(&follower_id));

    // Nothing left to recover once the new jobs are fresh
    assert_eq!(recovery.recover_stalled_jobs().await.unwrap(), 0);

    pool.close().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_recent_active_job_survives_recovery() {
    let pool = create_pool(":memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let clock = Arc::new(ManualTimeProvider::new(5_000_000));
    let queues = registry(&pool, &clock);
    let message = queues.queue(QueueCategory::Message);

    message.enqueue(record("busy", 1)).await.unwrap();
    let active = message.next_eligible().await.unwrap().unwrap();

    clock.advance(MINUTE_MS);
    let recovery = RecoveryService::new(Arc::clone(&queues), clock.clone(), None);
    assert_eq!(recovery.recover_stalled_jobs().await.unwrap(), 0);

    let job = message.find_by_id(&active.id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Active);
    assert_eq!(message.counts().await.unwrap().active, 1);
}
