use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pubsub_bridge::{
    api::{build_router, AppState},
    banner::{self, BannerInfo},
    broker,
    config::{Cli, Settings},
    error::log_error,
    lifecycle::SubscriptionManager,
    logging,
};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::from_cli(&cli).context("loading settings")?;

    let log_handle = logging::init_logging(settings.logging.clone())
        .map_err(|err| anyhow::anyhow!("initializing logging: {err}"))?;

    let result = run(settings).await;
    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "Bridge stopped with an error");
    }

    log_handle.shutdown();
    result
}

async fn run(settings: Settings) -> Result<()> {
    let addr = settings.http.socket_addr()?;

    let broker = broker::connect(&settings.broker)
        .await
        .context("connecting to the broker")?;

    let manager = Arc::new(SubscriptionManager::from_settings(
        broker.clone(),
        &settings.lifecycle,
    ));
    let state = AppState::new(broker.clone(), manager.clone(), &settings);
    let app = build_router(state, &settings);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    banner::print_banner(&BannerInfo {
        listen: &settings.http.listen_address,
        backend: broker.backend_name(),
        servers: &broker.servers(),
        ttl_secs: settings.lifecycle.subscription_ttl_secs,
    });
    banner::print_startup_log();
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("HTTP server stopped, expiring pending subscriptions");
    manager.shutdown().await;

    if let Err(err) = broker.drain().await {
        log_error("Broker drain failed", &err);
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received"),
        _ = terminate => info!("SIGTERM received"),
    }
}
