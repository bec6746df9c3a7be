//! b2b-wipe: one-time administrative data wipe.
//!
//! Empties the named collections and clears the local snapshot. Blob
//! storage is left untouched.

use std::path::PathBuf;

use anyhow::Context;
use b2b_db::{
    defaults, parse_collections, redact_url, wipe, PgWipeTarget, PoolConfig, SecondaryStore,
    SnapshotFile,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "b2b-wipe")]
#[command(author, version, about = "Delete every record in the given bid2build collections")]
struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Comma-separated collection names
    #[arg(long, env = "COLLECTIONS", default_value = defaults::WIPE_COLLECTIONS)]
    collections: String,

    /// Rows deleted per round trip
    #[arg(long, default_value_t = defaults::WIPE_BATCH_SIZE)]
    batch_size: i64,

    /// Local snapshot file to clear afterwards
    #[arg(long, env = "B2B_LOCAL_CACHE")]
    local_cache: Option<PathBuf>,

    /// Required; the wipe cannot be undone
    #[arg(long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors
    //   RUST_LOG    - standard env filter (default: "b2b_db=info,b2b_wipe=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "b2b_db=info,b2b_wipe=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("b2b-wipe.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    let cli = Cli::parse();
    let collections = parse_collections(&cli.collections);
    info!(collections = %collections.join(", "), "Collections to wipe");

    if !cli.yes {
        anyhow::bail!("refusing to wipe without --yes");
    }

    let pool = b2b_db::create_pool_with_config(&cli.database_url, PoolConfig::for_wipe())
        .await
        .with_context(|| format!("connecting to {}", redact_url(&cli.database_url)))?;
    let target = PgWipeTarget::new(pool);

    let snapshot = cli.local_cache.map(SnapshotFile::new);
    if snapshot.is_none() {
        warn!("B2B_LOCAL_CACHE not set; no local snapshot will be cleared");
    }
    let secondary = snapshot.as_ref().map(|s| s as &dyn SecondaryStore);

    let report = wipe(&target, &collections, cli.batch_size, secondary)
        .await
        .context("wipe failed")?;

    for entry in &report.collections {
        if entry.skipped {
            info!(collection = %entry.collection, "skipped (not present)");
        } else {
            info!(collection = %entry.collection, deleted = entry.deleted, "done");
        }
    }
    info!(
        total_deleted = report.total_deleted(),
        "All done. Blob storage was not modified."
    );
    Ok(())
}
