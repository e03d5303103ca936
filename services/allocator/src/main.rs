//! Mentorship allocator service.
//!
//! Serves the allocation API over Postgres. Allocation decisions run
//! synchronously inside each request; there are no background workers.

use std::sync::Arc;

use anyhow::{Context, Result};
use mentorship_allocator::{
    api, config::Config, db::Database, engine::AllocationEngine, state::AppState,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_addr = %config.listen_addr,
        capacity_limit = config.engine.capacity_limit.get(),
        max_attempts = config.engine.max_attempts.get(),
        dev_mode = config.dev_mode,
        "Starting mentorship allocator"
    );

    let db = Database::connect(&config.database)
        .await
        .context("connecting to Postgres")?;

    if config.dev_mode {
        db.run_migrations()
            .await
            .context("applying migrations in dev mode")?;
    }

    let engine = AllocationEngine::new(
        Arc::new(db.allocation_store()),
        Arc::new(db.roster()),
        config.engine,
    );
    let app = api::create_router(AppState::with_database(engine, db));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Allocator stopped");
    Ok(())
}

/// JSON logs. `RUST_LOG` wins over `ALLOC_LOG_LEVEL`.
fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received; draining connections");
}
