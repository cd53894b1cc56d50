mod dispatch;
mod http;
mod metrics;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use animedl_core::{
    load_config, validate_config, Aggregator, AniListClient, Aria2Client,
    DownloadLifecycleManager, NyaaScraper, SanitizedConfig, SelectionCache, SelectionFlow,
    TelegramMessenger, TokioScheduler,
};

use dispatch::Dispatcher;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pause after a failed getUpdates call
const UPDATE_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("ANIMEDL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!(version = VERSION, "Configuration loaded successfully");
    match serde_json::to_string(&SanitizedConfig::from(&config)) {
        Ok(sanitized) => info!(config = %sanitized, "Effective configuration"),
        Err(e) => warn!(error = %e, "Could not serialize configuration"),
    }

    let messenger = Arc::new(
        TelegramMessenger::new(config.telegram.clone())
            .context("Failed to create Telegram client")?,
    );
    let index = Arc::new(
        NyaaScraper::new(config.index.clone()).context("Failed to create index scraper")?,
    );
    let catalog = Arc::new(
        AniListClient::new(config.catalog.clone()).context("Failed to create catalog client")?,
    );
    let agent = Arc::new(
        Aria2Client::new(config.agent.clone()).context("Failed to create aria2 client")?,
    );
    info!(url = %config.agent.url, "Using aria2 download agent");

    let scheduler = Arc::new(TokioScheduler::new());
    let downloads = DownloadLifecycleManager::new(
        agent,
        messenger.clone(),
        scheduler.clone(),
        config.lifecycle.clone(),
    );

    let flow = Arc::new(SelectionFlow::new(
        Aggregator::new(index),
        Arc::new(SelectionCache::new()),
        catalog,
    ));
    let dispatcher = Arc::new(Dispatcher::new(messenger.clone(), flow, downloads.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Health and metrics server
    let server = if config.http.enabled {
        let addr = SocketAddr::new(config.http.host, config.http.port);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("Serving health and metrics on {}", addr);

        let app = http::create_router(downloads.clone());
        let mut rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.changed().await;
                })
                .await
        }))
    } else {
        info!("HTTP endpoint disabled in config");
        None
    };

    let updates = tokio::spawn(update_loop(messenger, dispatcher, shutdown_rx));

    shutdown_signal().await;
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = updates.await {
        warn!(error = %e, "Update loop ended abnormally");
    }

    if let Some(server) = server {
        server
            .await
            .context("HTTP server task panicked")?
            .context("HTTP server error")?;
    }

    let active = downloads.active_count().await;
    if active > 0 {
        warn!(active = active, "Abandoning downloads still in progress");
    }
    scheduler.shutdown();
    info!("Shutdown complete");

    Ok(())
}

/// Long-poll the chat service and hand each update to its own task.
async fn update_loop(
    messenger: Arc<TelegramMessenger>,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut offset = 0i64;
    info!("Listening for updates");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let result = tokio::select! {
            _ = shutdown.changed() => break,
            result = messenger.get_updates(offset) => result,
        };

        let updates = match result {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Failed to fetch updates");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(UPDATE_RETRY_DELAY) => continue,
                }
            }
        };

        for (update_id, incoming) in updates {
            offset = offset.max(update_id + 1);
            let Some(incoming) = incoming else {
                debug!(update_id = update_id, "Ignoring unsupported update");
                metrics::UPDATES_TOTAL.with_label_values(&["ignored"]).inc();
                continue;
            };

            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher.handle(incoming).await;
            });
        }
    }

    info!("Update loop stopped");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
