//! GroupQ Daemon - Main Entry Point
//! Composition root: broker, handlers, worker pools and the JSON-RPC server

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{BrokerKind, DaemonConfig, LogFormat};
use groupq_api_rpc::RpcServer;
use groupq_core::application::{
    DispatchService, HandlerRegistry, QueueBinding, QueueRegistry, RecoveryService,
    StandardHandlerFactory,
};
use groupq_core::domain::{PerCategory, QueueCategory};
use groupq_core::port::id_provider::UuidProvider;
use groupq_core::port::processed_store::mocks::InMemoryProcessedStore;
use groupq_core::port::time_provider::SystemTimeProvider;
use groupq_core::port::{IdProvider, InMemoryGroupedQueue, ProcessedStore, TimeProvider};
use groupq_infra_sqlite::{
    create_pool, database_url, run_migrations, SqliteGroupedQueue, SqliteProcessedStore,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration (logging depends on it)
    let config = DaemonConfig::from_env().context("Invalid configuration")?;

    // 2. Logging
    init_logging(config.log_format)?;
    info!("GroupQ daemon v{} starting...", VERSION);
    if telemetry::otlp_endpoint().is_some() && !cfg!(feature = "telemetry") {
        warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
    }

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);

    // 3. Broker and audit store
    let (bindings, store) = build_broker(&config, &time_provider, &id_provider).await?;
    let queues = Arc::new(QueueRegistry::new(bindings)?);

    // 4. Stalled job recovery (before any worker claims jobs)
    let recovery = RecoveryService::new(
        Arc::clone(&queues),
        Arc::clone(&time_provider),
        Some(config.stalled_window_ms),
    );
    match recovery.recover_stalled_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Stalled job recovery completed"),
        Err(e) => error!(error = %e, "Stalled job recovery failed"),
    }

    // 5. Handlers (built lazily on first job) and dispatch
    let factory = StandardHandlerFactory::new(
        store,
        Arc::clone(&time_provider),
        config.host_id.clone(),
        config.handler_work,
    );
    let handlers = Arc::new(HandlerRegistry::new(Arc::new(factory)));
    let dispatch = Arc::new(DispatchService::new(
        queues,
        handlers,
        Arc::clone(&time_provider),
    ));

    // 6. Worker pools
    let pools = dispatch.start_workers(config.pool);
    for category in QueueCategory::ALL {
        let queue = config.queue(category);
        info!(
            category = %category,
            concurrency = queue.concurrency,
            keep_completed = queue.keep_completed,
            keep_failed = queue.keep_failed,
            "Worker pool started"
        );
    }

    // 7. JSON-RPC server
    let rpc_server = RpcServer::new(config.rpc.clone(), Arc::clone(&dispatch), time_provider);
    let (rpc_addr, rpc_handle) = rpc_server
        .start()
        .await
        .context("RPC server start failed")?;

    info!(rpc_addr = %rpc_addr, host_id = %config.host_id, "System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown: stop intake first, then drain the pools
    if rpc_handle.stop().is_ok() {
        rpc_handle.stopped().await;
    }

    let reports = pools.close(config.shutdown_grace).await;
    for report in &reports {
        if report.is_clean() {
            info!(
                category = %report.category,
                finished_slots = report.finished_slots,
                "Worker pool closed"
            );
        } else {
            warn!(
                category = %report.category,
                finished_slots = report.finished_slots,
                abandoned_slots = report.abandoned_slots,
                grace_ms = config.shutdown_grace.as_millis() as u64,
                "Worker pool did not close within grace period"
            );
        }
    }

    telemetry::shutdown();
    info!("Shutdown complete.");

    Ok(())
}

fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("groupq=info"))
        .context("Failed to create env filter")?;
    let otel = telemetry::otel_layer().context("OpenTelemetry setup failed")?;

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(otel)
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(otel)
            .with(env_filter)
            .with(fmt::layer().pretty())
            .try_init()?,
    }
    Ok(())
}

async fn build_broker(
    config: &DaemonConfig,
    time_provider: &Arc<dyn TimeProvider>,
    id_provider: &Arc<dyn IdProvider>,
) -> Result<(PerCategory<QueueBinding>, Arc<dyn ProcessedStore>)> {
    match config.broker {
        BrokerKind::Memory => {
            warn!("Using in-memory broker: jobs do not survive a restart");
            let bindings = PerCategory::from_fn(|category| {
                let queue_config = config.queue(category).clone();
                let queue = InMemoryGroupedQueue::new(
                    &queue_config,
                    Arc::clone(time_provider),
                    Arc::clone(id_provider),
                );
                QueueBinding::new(queue_config, Arc::new(queue))
            });
            Ok((bindings, Arc::new(InMemoryProcessedStore::new())))
        }
        BrokerKind::Sqlite => {
            if let Some(parent) = config.db_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Cannot create {}", parent.display()))?;
            }
            info!(db_path = %config.db_path.display(), "Initializing database...");

            let pool = create_pool(&database_url(&config.db_path))
                .await
                .context("DB pool creation failed")?;
            run_migrations(&pool).await.context("Migration failed")?;

            let bindings = PerCategory::from_fn(|category| {
                let queue_config = config.queue(category).clone();
                let queue = SqliteGroupedQueue::new(
                    pool.clone(),
                    &queue_config,
                    Arc::clone(time_provider),
                    Arc::clone(id_provider),
                );
                QueueBinding::new(queue_config, Arc::new(queue))
            });
            Ok((bindings, Arc::new(SqliteProcessedStore::new(pool))))
        }
    }
}
