//! Group exclusivity under concurrent load, SQLite broker

mod common;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use groupq_core::application::{HandlerFactory, JobHandler, SubmitOptions};
use groupq_core::domain::{Job, QueueCategory};
use groupq_core::Result;
use serde_json::json;

use common::{dispatch_with, fast_settings, memory_pool, wait_finished};

#[derive(Default)]
struct Observed {
    running: HashSet<(QueueCategory, String)>,
    max_running: usize,
    overlaps: Vec<String>,
    order: HashMap<String, Vec<i64>>,
}

struct ObservingHandler {
    category: QueueCategory,
    observed: Arc<Mutex<Observed>>,
}

#[async_trait]
impl JobHandler for ObservingHandler {
    fn category(&self) -> QueueCategory {
        self.category
    }

    async fn process(&self, job: &Job) -> Result<()> {
        let key = (job.category, job.group_id.clone());
        {
            let mut observed = self.observed.lock().unwrap();
            if !observed.running.insert(key.clone()) {
                observed.overlaps.push(job.group_id.clone());
            }
            let running = observed
                .running
                .iter()
                .filter(|(c, _)| *c == job.category)
                .count();
            observed.max_running = observed.max_running.max(running);
            observed
                .order
                .entry(format!("{}/{}", job.category, job.group_id))
                .or_default()
                .push(job.order_key);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.observed.lock().unwrap().running.remove(&key);
        Ok(())
    }
}

struct ObservingFactory {
    observed: Arc<Mutex<Observed>>,
}

#[async_trait]
impl HandlerFactory for ObservingFactory {
    async fn build(&self, category: QueueCategory) -> Result<Arc<dyn JobHandler>> {
        Ok(Arc::new(ObservingHandler {
            category,
            observed: Arc::clone(&self.observed),
        }))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_group_runs_twice_under_concurrent_submission() {
    let pool = memory_pool().await;
    let observed = Arc::new(Mutex::new(Observed::default()));
    let factory = Arc::new(ObservingFactory {
        observed: Arc::clone(&observed),
    });
    let dispatch = dispatch_with(&pool, |_| 4, factory);

    // Workers run while submissions are still arriving
    let pools = dispatch.start_workers(fast_settings());

    const GROUPS: i64 = 6;
    const PER_GROUP: i64 = 8;
    let mut submitters = Vec::new();
    for g in 0..GROUPS {
        let dispatch = Arc::clone(&dispatch);
        submitters.push(tokio::spawn(async move {
            for n in 0..PER_GROUP {
                dispatch
                    .submit_job(
                        QueueCategory::Message,
                        json!({"instanceId": format!("inst-{g}"), "message": {"type": "text"}}),
                        SubmitOptions {
                            order_key: Some(n),
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in submitters {
        handle.await.unwrap();
    }

    wait_finished(&dispatch, QueueCategory::Message, (GROUPS * PER_GROUP) as u64).await;
    pools.close(Duration::from_secs(5)).await;

    let observed = observed.lock().unwrap();
    assert!(observed.overlaps.is_empty(), "overlapping groups: {:?}", observed.overlaps);
    assert!(observed.max_running <= 4);
    for g in 0..GROUPS {
        let order = &observed.order[&format!("message/inst-{g}")];
        let expected: Vec<i64> = (0..PER_GROUP).collect();
        assert_eq!(order, &expected, "group inst-{g} ran out of order");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_categories_dispatch_same_group_independently() {
    let pool = memory_pool().await;
    let observed = Arc::new(Mutex::new(Observed::default()));
    let factory = Arc::new(ObservingFactory {
        observed: Arc::clone(&observed),
    });
    let dispatch = dispatch_with(&pool, |_| 2, factory);

    for category in [QueueCategory::Import, QueueCategory::Export] {
        for n in 0..3 {
            dispatch
                .submit_job(
                    category,
                    json!({"instanceId": "shared"}),
                    SubmitOptions {
                        order_key: Some(n),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
    }

    let pools = dispatch.start_workers(fast_settings());
    wait_finished(&dispatch, QueueCategory::Import, 3).await;
    wait_finished(&dispatch, QueueCategory::Export, 3).await;
    pools.close(Duration::from_secs(5)).await;

    let observed = observed.lock().unwrap();
    assert!(observed.overlaps.is_empty());
    assert_eq!(observed.order["import/shared"], vec![0, 1, 2]);
    assert_eq!(observed.order["export/shared"], vec![0, 1, 2]);
}
