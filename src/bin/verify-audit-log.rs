use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use audit_trail::audit::verify_store;
use audit_trail::config::{AppConfig, DatabaseConfig};
use audit_trail::database::Database;

/// Verify audit log integrity: content hashes and retraction links
#[derive(Parser, Debug)]
#[command(name = "verify-audit-log", version)]
struct Args {
    /// Database URL; defaults to the configured audit store
    #[arg(short, long)]
    database_url: Option<String>,

    /// Print every problem found
    #[arg(short, long)]
    verbose: bool,

    /// Suppress output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.quiet {
        tracing::Level::ERROR
    } else if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // An explicit URL needs no service credentials
    let config = match &args.database_url {
        Some(_) => AppConfig::default(),
        None => AppConfig::load()?,
    };
    let database_config = DatabaseConfig {
        url: args.database_url.unwrap_or_else(|| config.database.url.clone()),
        ..config.database.clone()
    };

    info!("Verifying audit log at {}", database_config.url);
    let database = Database::new(&database_config, config.writer.store_timeout()).await?;
    let result = verify_store(&database).await?;
    database.close().await;

    if !result.is_valid() {
        for problem in &result.problems {
            error!("{}", problem);
        }
        error!(
            "Audit log verification failed with {} problems",
            result.problems.len()
        );
        std::process::exit(1);
    }

    if !args.quiet {
        println!(
            "✓ Audit log verified: {} entries, {} retractions",
            result.entry_count, result.retraction_count
        );
    }

    Ok(())
}
