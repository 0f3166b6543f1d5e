//! Application wiring and lifecycle.
//!
//! One process hosts five cooperative tasks: the HTTP read API, the metrics
//! listener, the ingest consumer, the DLQ reprocessor and the cache
//! sweeper. A single `watch` channel fans the shutdown signal out to all of
//! them; the first task failure or a SIGINT/SIGTERM flips it.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::LruCache;
use crate::config::{Config, MetricsConfig};
use crate::database::{self, TransactionManager};
use crate::errors::{OrderError, Result};
use crate::messaging::{Dlq, DlqReprocessor, OrderConsumer};
use crate::metrics;
use crate::models::Order;
use crate::service::OrderService;
use crate::store::PgOrderStore;
use crate::web;
use uuid::Uuid;

/// Run the order service until a shutdown signal or a task failure.
pub async fn run(config: Config) -> Result<()> {
    metrics::init_metrics();

    let pool = database::connect(&config.postgres).await?;
    let tx_manager = TransactionManager::new(pool.clone())?;

    let cache: Arc<LruCache<Uuid, Order>> =
        Arc::new(LruCache::new(config.cache.capacity, "order")?);
    cache.start_cleanup(Duration::from_secs(config.cache.cleanup_interval_secs));

    let store = Arc::new(PgOrderStore::new(pool.clone(), tx_manager));
    let service = OrderService::new(
        store,
        Arc::clone(&cache),
        Duration::from_secs(config.cache.ttl_secs),
    );

    if let Err(err) = service.restore_cache().await {
        tracing::error!(error = %err, "failed to restore cache from database");
    }

    let dlq = Arc::new(Dlq::new(&config.dlq)?);
    let consumer = OrderConsumer::new(&config.kafka, Arc::clone(&dlq), service.clone())?;
    let reprocessor = DlqReprocessor::new(&config.dlq, Arc::clone(&dlq), service.clone())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut http_task = spawn_named("http", {
        let http_config = config.http.clone();
        let service = service.clone();
        let shutdown = shutdown_rx.clone();
        async move { web::serve(&http_config, service, shutdown).await }
    });
    let mut metrics_task = spawn_named("metrics", {
        let metrics_config = config.metrics.clone();
        let shutdown = shutdown_rx.clone();
        async move { serve_metrics(&metrics_config, shutdown).await }
    });
    let mut consumer_task = spawn_named("consumer", {
        let shutdown = shutdown_rx.clone();
        async move { consumer.run(shutdown).await }
    });
    let mut reprocessor_task = spawn_named("dlq-reprocessor", {
        let shutdown = shutdown_rx.clone();
        async move { reprocessor.run(shutdown).await }
    });

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, initiating graceful shutdown");
        }
        outcome = &mut http_task => report_early_exit("http", outcome),
        outcome = &mut metrics_task => report_early_exit("metrics", outcome),
        outcome = &mut consumer_task => report_early_exit("consumer", outcome),
        outcome = &mut reprocessor_task => report_early_exit("dlq-reprocessor", outcome),
    }

    let _ = shutdown_tx.send(true);

    for (name, task) in [
        ("http", http_task),
        ("metrics", metrics_task),
        ("consumer", consumer_task),
        ("dlq-reprocessor", reprocessor_task),
    ] {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) if err != OrderError::Cancelled => {
                tracing::error!(task = name, error = %err, "task exited with error");
            }
            Ok(Err(_)) => {}
            Err(join_err) if !join_err.is_cancelled() => {
                tracing::error!(task = name, error = %join_err, "task panicked");
            }
            Err(_) => {}
        }
    }

    cache.stop_cleanup();
    if let Err(err) = dlq.flush(Duration::from_secs(5)) {
        tracing::warn!(error = %err, "dlq producer flush failed during shutdown");
    }
    pool.close().await;
    tracing::info!("shutdown complete");

    Ok(())
}

fn spawn_named(
    name: &'static str,
    task: impl std::future::Future<Output = Result<()>> + Send + 'static,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        tracing::debug!(task = name, "task started");
        task.await
    })
}

fn report_early_exit(name: &str, outcome: std::result::Result<Result<()>, tokio::task::JoinError>) {
    match outcome {
        Ok(Ok(())) => tracing::warn!(task = name, "task exited early"),
        Ok(Err(err)) => tracing::error!(task = name, error = %err, "task failed"),
        Err(join_err) => tracing::error!(task = name, error = %join_err, "task panicked"),
    }
}

/// Serve the Prometheus exposition on its own listener.
async fn serve_metrics(config: &MetricsConfig, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| OrderError::Internal(format!("bind metrics listener {addr}: {e}")))?;

    tracing::info!(addr = %addr, "metrics server listening");

    axum::serve(listener, metrics::metrics_router())
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .map_err(|e| OrderError::Internal(format!("metrics server: {e}")))
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c"),
        _ = terminate => tracing::info!("received sigterm"),
    }
}
