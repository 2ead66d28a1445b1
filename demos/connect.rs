//! Connects to the cluster described by a TOML file and holds the client
//! until Ctrl-C, then runs the shutdown hooks.
//!
//! ```bash
//! # Info level (JSON output, default)
//! cargo run --example connect -- app.toml
//!
//! # Pretty format for human-readable output
//! QUARRY_LOG_FORMAT=pretty QUARRY_LOG_LEVEL=debug cargo run --example connect -- app.toml
//! ```

use std::time::Duration;

use quarry::mongodb::{Graceful, provider};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let level = std::env::var("QUARRY_LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let format = std::env::var("QUARRY_LOG_FORMAT").unwrap_or_else(|_| "json".into());

    let filter = EnvFilter::try_new(format!("quarry={},quarry_mongodb={},connect={}", level, level, level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    match format.as_str() {
        "pretty" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .pretty()
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = std::env::args().nth(1).unwrap_or_else(|| "app.toml".into());
    let settings: toml::Table = toml::from_str(&std::fs::read_to_string(&path)?)?;

    let config = provider::new_config(&settings)?;
    let manager = provider::new(&config, Graceful::global()).await;

    let collections = manager.default_database()?.list_collection_names(None).await?;
    info!(database = %manager.database_name(), ?collections, "connected");

    tokio::signal::ctrl_c().await?;

    for err in Graceful::global().shutdown(Duration::from_secs(10)).await {
        warn!(error = %err, "shutdown hook failed");
    }
    Ok(())
}
