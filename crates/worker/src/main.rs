use std::sync::Arc;
use std::time::Duration;

use beacon_common::config::AppConfig;
use beacon_engine::RetentionSweep;
use beacon_engine::store::postgres::{PgStore, create_pool};
use beacon_engine::store::queue::RedisJobQueue;
use beacon_notifier::fcm::FcmClient;
use beacon_worker::build_orchestrator;
use beacon_worker::gate::ExecutionGate;
use beacon_worker::listener::RequestListener;
use beacon_worker::queue::QueueConsumer;
use beacon_worker::sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "beacon_worker=info,beacon_engine=info,beacon_notifier=info".into()
            }),
        )
        .json()
        .init();

    tracing::info!("Beacon worker starting...");

    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let store = Arc::new(PgStore::new(pool.clone()));
    let queue = RedisJobQueue::connect(&config.redis_url).await?;
    let push = Arc::new(FcmClient::new(config.push.clone())?);

    let orchestrator = Arc::new(build_orchestrator(
        &config,
        store.clone(),
        store.clone(),
        Arc::new(queue.clone()),
        push,
    ));

    let gate = ExecutionGate::new(
        config.max_concurrent_executions,
        Duration::from_secs(config.execution_timeout_secs),
    );
    tracing::info!(
        max_concurrent = config.max_concurrent_executions,
        timeout_secs = config.execution_timeout_secs,
        "Execution limits configured"
    );

    let listener = RequestListener::new(pool, orchestrator.clone(), gate.clone());
    let consumer = QueueConsumer::new(queue, orchestrator, gate);
    let sweep = RetentionSweep::new(store, config.location_retention_days);
    let sweep_every = Duration::from_secs(config.retention_sweep_interval_hours.max(1) * 3600);

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = listener.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Request listener exited with error");
                return Err(e);
            }
        }
        result = consumer.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Job consumer exited with error");
                return Err(e);
            }
        }
        result = sweeper::run(sweep, sweep_every) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Retention sweeper exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Beacon worker stopped.");
    Ok(())
}
