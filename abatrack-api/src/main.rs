//! abatrack-api - durable session data-collection service
//!
//! Owns the SQLite event store and exposes it over HTTP: clients,
//! behaviors and skills, session lifecycle, batched event intake,
//! review, per-date analysis, and BCBA-gated deletion.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use abatrack_api::{build_router, AppState};
use abatrack_common::config::{ensure_data_dir, resolve_data_dir};
use abatrack_common::db::init_database;

#[derive(Parser, Debug)]
#[command(name = "abatrack-api", version, about = "ABA session data service")]
struct Args {
    /// Data directory holding the SQLite database
    #[arg(long, env = "ABATRACK_DATA")]
    data_dir: Option<PathBuf>,

    /// Listen port
    #[arg(long, env = "ABATRACK_PORT", default_value_t = 8001)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting abatrack-api v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = resolve_data_dir(args.data_dir.as_deref());
    let db_path = ensure_data_dir(&data_dir)?;
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("Database initialized");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new(pool);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    info!("abatrack-api listening on http://127.0.0.1:{}", args.port);
    info!(
        "Health check: http://127.0.0.1:{}/api/health",
        args.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
