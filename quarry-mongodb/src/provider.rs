//! Constructors for composing the manager at an application's entry point.
//!
//! [`new_config`] reads the `[mongo]` section of an already loaded settings
//! table. [`new`] builds a connected [`Manager`] and, unlike
//! [`Manager::new`], refuses to let the process continue without one: on
//! failure it logs the error and exits.
//!
//! ```rust,ignore
//! let settings: toml::Table = toml::from_str(&std::fs::read_to_string("app.toml")?)?;
//! let config = quarry_mongodb::provider::new_config(&settings)?;
//! let manager = quarry_mongodb::provider::new(&config, Graceful::global()).await;
//! ```

use std::sync::Arc;

use tracing::error;

use crate::config::MongoConfig;
use crate::error::MongoResult;
use crate::graceful::ShutdownRegistry;
use crate::manager::Manager;

/// Exit code used when the manager cannot be constructed.
pub const EXIT_CODE: i32 = 1;

/// Read the `[mongo]` section from a settings table.
pub fn new_config(settings: &toml::Table) -> MongoResult<MongoConfig> {
    MongoConfig::from_table(settings)
}

/// Build the manager, terminating the process if that fails.
pub async fn new(config: &MongoConfig, registry: &dyn ShutdownRegistry) -> Arc<Manager> {
    match Manager::new(config, registry).await {
        Ok(manager) => manager,
        Err(err) => {
            error!(error = %err, hosts = ?config.hosts, "mongodb manager error");
            std::process::exit(EXIT_CODE);
        }
    }
}
