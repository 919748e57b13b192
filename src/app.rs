use crate::collector::Collector;
use crate::config::Config;
use crate::http::ClientPool;
use crate::metrics::SnapshotStore;
use crate::server;
use anyhow::Context;
use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// How long the HTTP server may take to drain after a shutdown signal.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Bind the configured address and serve until SIGINT/SIGTERM.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", addr))?;
    serve(cfg, listener, shutdown_signal()).await
}

/// Start the poller and the scrape endpoint on `listener`, then wait for
/// `signal`. On signal the poller is cancelled and the server gets
/// [`SHUTDOWN_GRACE`] to finish open connections.
pub async fn serve<F>(cfg: Config, listener: TcpListener, signal: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send,
{
    info!("Loaded configuration with {} users", cfg.users.len());
    info!("Listen address: {}", cfg.listen_addr);
    info!("Metrics path: {}", cfg.metrics_path);
    info!("Poll interval: {} seconds", cfg.poll_interval);

    let store = Arc::new(SnapshotStore::new().context("failed to register metrics")?);
    let pool = ClientPool::new(&cfg.users, &cfg.api).context("failed to build GitHub clients")?;
    info!(
        "Tracking accounts: {}",
        pool.accounts().collect::<Vec<_>>().join(", ")
    );
    let collector = Arc::new(Collector::new(pool, store.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller = {
        let collector = collector.clone();
        let rx = shutdown_rx.clone();
        let interval = Duration::from_secs(cfg.poll_interval);
        tokio::spawn(async move { collector.run(interval, rx).await })
    };

    let app = server::router(store, &cfg.metrics_path);
    info!("Starting HTTP server on {}", listener.local_addr()?);
    let mut server_rx = shutdown_rx;
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                while !*server_rx.borrow_and_update() {
                    if server_rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await
    });

    tokio::select! {
        _ = signal => {}
        res = &mut server => {
            let _ = shutdown_tx.send(true);
            let _ = poller.await;
            return match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e).context("HTTP server error"),
                Err(e) => Err(e).context("HTTP server task failed"),
            };
        }
    }

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("HTTP server shutdown error: {}", e),
        Ok(Err(e)) => warn!("HTTP server task failed: {}", e),
        Err(_) => {
            warn!(
                "HTTP server did not shut down within {}s, closing remaining connections",
                SHUTDOWN_GRACE.as_secs()
            );
            server.abort();
        }
    }

    // An in-flight pass runs to completion.
    if let Err(e) = poller.await {
        warn!("Poller task failed: {}", e);
    }
    info!("Exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
