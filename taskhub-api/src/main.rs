//! # TaskHub API Server
//!
//! Multi-tenant task management API: users, projects with members, tasks and
//! comments, gated by a two-tier role model, with idempotent POSTs.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) DATABASE_URL=postgres://localhost/taskhub \
//!     cargo run -p taskhub-api
//!
//! # No database: everything lives in process memory
//! JWT_SECRET=$(openssl rand -hex 32) STORAGE_BACKEND=memory cargo run -p taskhub-api
//! ```

use std::sync::Arc;

use anyhow::Context;
use taskhub_api::{
    app::{build_router, AppState},
    config::{Config, LogFormat, StorageBackend},
};
use taskhub_shared::{
    db::{
        migrations::{ensure_database_exists, get_migration_status, run_migrations},
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    store::{MemoryStore, PgStore, Store},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskhub_api=debug,taskhub_shared=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing(LogFormat::from_env());

    tracing::info!("TaskHub API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    let mut pg_pool = None;
    let store: Arc<dyn Store> = match config.database.backend {
        StorageBackend::Postgres => {
            ensure_database_exists(&config.database.url)
                .await
                .context("Failed to create database")?;

            let pool = create_pool(DatabaseConfig {
                url: config.database.url.clone(),
                max_connections: config.database.max_connections,
                ..DatabaseConfig::default()
            })
            .await
            .context("Failed to connect to database")?;

            if config.database.run_migrations {
                run_migrations(&pool).await.context("Failed to run migrations")?;
                let status = get_migration_status(&pool).await?;
                tracing::info!(
                    applied = status.applied_migrations,
                    pending = status.pending_migrations,
                    latest = ?status.latest_version,
                    "Database migrations complete"
                );
            }

            pg_pool = Some(pool.clone());
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pg_pool {
        close_pool(pool).await;
    }

    tracing::info!("Server stopped");

    Ok(())
}
