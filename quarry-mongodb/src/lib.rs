//! # quarry-mongodb
//!
//! A managed MongoDB client for services that are configured declaratively.
//!
//! This crate provides:
//! - Translation of a `[mongo]` configuration section into driver client options
//!   (hosts, replica set, read preference, credentials, pool bounds, timeouts)
//! - A [`Manager`] that connects, verifies the cluster answers, and registers
//!   itself for graceful shutdown
//! - A [`DocumentCodec`] that encodes serde types into BSON documents, with
//!   adapters for protobuf well-known types
//!
//! ## Example
//!
//! ```rust,ignore
//! use quarry_mongodb::{Graceful, Manager, MongoConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MongoConfig::from_file("app.toml")?;
//!     let manager = Manager::new(&config, Graceful::global()).await?;
//!
//!     let orders = manager.collection_doc("orders")?;
//!     orders.insert_one(manager.transform_document(&order)?, None).await?;
//!
//!     Graceful::global().shutdown(std::time::Duration::from_secs(10)).await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod graceful;
pub mod manager;
pub mod options;
pub mod provider;

pub use bson::oid::ObjectId;
pub use bson::{Bson, Document, doc};
pub use codec::DocumentCodec;
pub use config::{AuthConfig, CONFIG_SECTION, MongoConfig, ReadMode, ReadPreferenceConfig};
pub use error::{MongoError, MongoResult};
pub use graceful::{BoxError, Closer, Graceful, ShutdownRegistry};
pub use manager::{Manager, ManagerBuilder};
pub use options::client_options;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::codec::DocumentCodec;
    pub use crate::config::{MongoConfig, ReadMode};
    pub use crate::error::{MongoError, MongoResult};
    pub use crate::graceful::{Closer, Graceful, ShutdownRegistry};
    pub use crate::manager::{Manager, ManagerBuilder};
    pub use bson::oid::ObjectId;
    pub use bson::{Bson, Document, doc};
}
