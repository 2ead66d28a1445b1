//! Error types for MongoDB operations.

use std::time::Duration;

use thiserror::Error;

/// Result type for MongoDB operations.
pub type MongoResult<T> = Result<T, MongoError>;

/// Errors that can occur while configuring, connecting or using the
/// managed client.
#[derive(Error, Debug)]
pub enum MongoError {
    /// Configuration could not be loaded or translated.
    #[error("configuration error: {0}")]
    Config(String),

    /// The driver rejected the client options.
    #[error("connection error: {0}")]
    Connection(#[source] mongodb::error::Error),

    /// No cluster member answered before server selection gave up.
    #[error("cluster unreachable: {0}")]
    Unreachable(#[source] mongodb::error::Error),

    /// The caller's deadline elapsed before any cluster member answered.
    #[error("cluster unreachable: no member answered within {0:?}")]
    DeadlineExceeded(Duration),

    /// BSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    /// BSON deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),

    /// Disconnect did not finish cleanly. The handle is released regardless.
    #[error("disconnect error: {0}")]
    Disconnect(String),

    /// The manager was already closed.
    #[error("mongodb manager already closed")]
    Closed,

    /// Any other driver error.
    #[error("mongodb error: {0}")]
    Driver(#[from] mongodb::error::Error),
}

impl MongoError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a disconnect error.
    pub fn disconnect(message: impl Into<String>) -> Self {
        Self::Disconnect(message.into())
    }

    /// Check if this is a configuration error.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if no cluster member could be reached, either within the
    /// driver's server selection timeout or within the caller's deadline.
    pub fn is_reachability_error(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::DeadlineExceeded(_))
    }

    /// Check if this is a serialization or deserialization error.
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Self::Serialization(_) | Self::Deserialization(_))
    }

    /// Check if the manager was used after close.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
