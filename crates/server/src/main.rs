use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keycheck_core::{
    load_config, validate_config, FsMailbox, Janitor, MailboxWatcher, VerificationService,
};
use keycheck_server::api::create_router;
use keycheck_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

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
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("keycheck {} starting", VERSION);

    // Determine config path
    let config_path = std::env::var("KEYCHECK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Mailbox directory: {:?}", config.mailbox.dir);
    info!(
        "Verdict timeout: {} ms, poll interval: {} ms",
        config.mailbox.timeout_ms, config.mailbox.poll_interval_ms
    );

    // Open mailbox
    let mailbox = Arc::new(
        FsMailbox::open(&config.mailbox)
            .await
            .context("Failed to open mailbox")?,
    );

    let mut verifier = VerificationService::new(Arc::clone(&mailbox), &config.mailbox);

    // Event-driven wake-ups; polling keeps working without them
    let watcher = if config.mailbox.watch {
        match MailboxWatcher::spawn(mailbox.dir()) {
            Ok(watcher) => {
                verifier = verifier.with_wake(watcher.wake());
                Some(watcher)
            }
            Err(e) => {
                warn!("Mailbox watcher unavailable, falling back to polling: {}", e);
                None
            }
        }
    } else {
        info!("Mailbox watching disabled; polling only");
        None
    };

    // Start janitor if enabled
    let janitor = if config.janitor.enabled {
        let janitor = Janitor::new(Arc::clone(&mailbox), config.janitor.clone());
        janitor.start();
        Some(janitor)
    } else {
        info!("Janitor disabled in config; orphaned records will not be swept");
        None
    };

    // Create app state
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, verifier));

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");

    if let Some(ref janitor) = janitor {
        janitor.stop();
    }
    drop(watcher);

    Ok(())
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
