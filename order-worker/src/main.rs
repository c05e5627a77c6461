use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use order_worker::{
    AmqpBroker, OrderStatusStore, PgOrderStatusStore, ShutdownCoordinator, Worker, WorkerConfig,
    cleanup_old_logs, init_logger_with_file, kitchen,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = WorkerConfig::from_env().context("invalid worker configuration")?;

    init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;
    if let Some(dir) = &config.log_dir
        && let Err(e) = cleanup_old_logs(Path::new(dir))
    {
        tracing::warn!(error = %e, "Initial log cleanup failed");
    }

    tracing::info!(
        environment = %config.environment,
        broker = %config.broker_url,
        database = %config.database_url_redacted(),
        queue = %config.queue,
        "🍳 Order worker configured"
    );

    let store: Arc<dyn OrderStatusStore> = Arc::new(
        PgOrderStatusStore::connect_lazy(&config.database_url, config.db_max_connections)
            .context("invalid DATABASE_URL")?,
    );
    let kitchen = kitchen::from_config(&config);

    let shutdown = ShutdownCoordinator::new();
    let signals = shutdown.listen_for_signals();

    let worker = Worker::from_config(
        &config,
        Arc::new(AmqpBroker::default()),
        kitchen,
        store,
        shutdown.token(),
    );
    worker.run().await;

    signals.abort();
    Ok(())
}
