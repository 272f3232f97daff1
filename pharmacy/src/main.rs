//! Rx Dispatch HTTP server.

use metrics_exporter_prometheus::PrometheusBuilder;
use rx_dispatch_core::environment::SystemClock;
use rx_dispatch_pharmacy::{
    PharmacyService, PostgresStore,
    config::Config,
    metrics::register_workflow_metrics,
    server::{AppState, build_router},
    workflow::{UuidGenerator, WorkflowEnvironment},
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; real deployments set variables directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,rx_dispatch_pharmacy=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rx Dispatch");

    let config = Config::from_env();
    info!(
        bind = %config.server.bind_address(),
        max_connections = config.database.max_connections,
        metrics_port = ?config.server.metrics_port,
        "Configuration loaded"
    );

    if let Some(port) = config.server.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(%addr, "Prometheus exporter listening");
    }
    register_workflow_metrics();

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.connect_timeout())
        .connect(&config.database.url)
        .await?;
    let store = Arc::new(PostgresStore::new(pool));
    info!("Database connected");

    if config.database.run_migrations {
        store.migrate().await?;
        info!("Migrations applied");
    }

    let env = WorkflowEnvironment::new(Arc::new(SystemClock), Arc::new(UuidGenerator));
    let service = PharmacyService::new(store.clone(), env);
    let state = AppState::new(service, store);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    // In-flight requests get `shutdown_timeout` to finish after the signal
    let (stopping_tx, stopping_rx) = oneshot::channel();
    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = stopping_tx.send(());
            })
            .into_future(),
    );

    tokio::select! {
        result = &mut server => {
            result??;
            info!("Server stopped");
            return Ok(());
        },
        _ = stopping_rx => {},
    }

    let grace = config.server.shutdown_timeout();
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result??,
        Err(_) => warn!(grace_secs = grace.as_secs(), "Grace period elapsed, dropping open connections"),
    }

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
