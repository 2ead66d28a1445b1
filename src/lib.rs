//! # Quarry
//!
//! A managed handle to a MongoDB cluster, configured from a TOML section.
//!
//! Quarry provides:
//! - Declarative connection, pooling, credential and read preference settings
//! - Startup reachability checks that tolerate a member being briefly down
//! - Registration of the client for graceful shutdown
//! - BSON document encoding for serde and protobuf types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quarry::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), MongoError> {
//!     let config = MongoConfig::from_file("app.toml")?;
//!     let manager = Manager::new(&config, Graceful::global()).await?;
//!
//!     let users = manager.collection_doc("users")?;
//!     let count = users.count_documents(None, None).await?;
//!
//!     Graceful::global().shutdown(std::time::Duration::from_secs(10)).await;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// MongoDB configuration, client manager and document codec.
pub mod mongodb {
    pub use quarry_mongodb::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use quarry_mongodb::prelude::*;
}

// Re-export key types at the crate root
pub use quarry_mongodb::{DocumentCodec, Graceful, Manager, MongoConfig, MongoError, MongoResult};
