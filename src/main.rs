use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audit_trail::api::{self, AppState};
use audit_trail::audit::AlertSink;
use audit_trail::config::AppConfig;
use audit_trail::database::Database;

/// Audit trail review service
#[derive(Parser, Debug)]
#[command(name = "audit-trail", version)]
struct Args {
    /// TOML configuration file; falls back to AUDIT_CONFIG
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audit_trail=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting audit trail service");

    // Load configuration
    let config = match args.config {
        Some(path) => AppConfig::load_from(Some(&path))?,
        None => AppConfig::load()?,
    };
    info!("Configuration loaded");

    // Initialize database
    let database = Database::new(&config.database, config.writer.store_timeout()).await?;
    database.run_migrations().await?;
    info!("Database migrations completed");

    let redelivery_interval = config.writer.redelivery_interval();
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(config, database, AlertSink::default());

    // Background redelivery of entries queued while the store was unavailable
    state.writer.spawn_redelivery(redelivery_interval);
    info!("Audit redelivery task started");

    let app = api::router(state);

    info!("Audit trail listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
