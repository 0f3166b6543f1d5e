use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::HttpConfig;
use crate::errors::{OrderError, Result};
use crate::service::OrderService;
use crate::store::OrderStore;
use crate::web::routes::create_router;

/// Serve the read API until shutdown. In-flight requests get the
/// configured grace window to drain; the listener is then abandoned.
pub async fn serve<S: OrderStore + 'static>(
    config: &HttpConfig,
    service: OrderService<S>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| OrderError::Internal(format!("bind {addr}: {e}")))?;

    tracing::info!(addr = %addr, "http server listening");

    let router = create_router(service);
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    let mut drain_signal = shutdown.clone();
    let mut grace_signal = shutdown;

    let server = async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = drain_signal.changed().await;
            })
            .await
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| OrderError::Internal(format!("http server: {e}")))
        }
        _ = async {
            let _ = grace_signal.changed().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "shutdown grace window elapsed, abandoning open connections"
            );
            Ok(())
        }
    }
}
