//! Shutdown hooks.
//!
//! Components that hold external resources register a [`Closer`] with a
//! [`ShutdownRegistry`]. The process-wide [`Graceful`] registry runs them
//! when the application stops:
//!
//! ```rust,ignore
//! use quarry_mongodb::{Graceful, Manager};
//!
//! let manager = Manager::new(&config, Graceful::global()).await?;
//! // ...
//! tokio::signal::ctrl_c().await?;
//! for err in Graceful::global().shutdown(Duration::from_secs(10)).await {
//!     tracing::warn!(error = %err, "shutdown hook failed");
//! }
//! ```

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Error type returned by closers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A resource that must be released at shutdown.
#[async_trait]
pub trait Closer: Send + Sync {
    /// Release the resource, giving up once `deadline` has elapsed.
    async fn close(&self, deadline: Duration) -> Result<(), BoxError>;
}

/// Something closers can be registered with.
pub trait ShutdownRegistry: Send + Sync {
    /// Register a closer to run at shutdown.
    fn add_closer(&self, closer: Arc<dyn Closer>);
}

static GLOBAL: LazyLock<Graceful> = LazyLock::new(Graceful::new);

/// Ordered list of closers, run last-registered first.
#[derive(Default)]
pub struct Graceful {
    closers: Mutex<Vec<Arc<dyn Closer>>>,
}

impl Graceful {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Graceful {
        &GLOBAL
    }

    /// Number of registered closers.
    pub fn len(&self) -> usize {
        self.closers.lock().len()
    }

    /// Whether no closers are registered.
    pub fn is_empty(&self) -> bool {
        self.closers.lock().is_empty()
    }

    /// Run every registered closer in reverse registration order.
    ///
    /// `deadline` bounds the whole run; each closer gets what is left of it.
    /// Closers are removed before they run, so a second call only runs
    /// closers registered in between. Errors are collected, not fatal.
    pub async fn shutdown(&self, deadline: Duration) -> Vec<BoxError> {
        let closers = std::mem::take(&mut *self.closers.lock());
        let end = Instant::now() + deadline;

        info!(closers = closers.len(), ?deadline, "running shutdown hooks");

        let mut errors = Vec::new();
        for closer in closers.into_iter().rev() {
            let remaining = end.saturating_duration_since(Instant::now());
            if let Err(err) = closer.close(remaining).await {
                warn!(error = %err, "shutdown hook failed");
                errors.push(err);
            }
        }

        debug!(failed = errors.len(), "shutdown hooks finished");
        errors
    }
}

impl ShutdownRegistry for Graceful {
    fn add_closer(&self, closer: Arc<dyn Closer>) {
        self.closers.lock().push(closer);
    }
}

impl std::fmt::Debug for Graceful {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graceful")
            .field("closers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl Closer for Recorder {
        async fn close(&self, _deadline: Duration) -> Result<(), BoxError> {
            self.log.lock().push(self.name);
            if self.fail {
                return Err(format!("{} failed", self.name).into());
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> Arc<dyn Closer> {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
            fail,
        })
    }

    #[tokio::test]
    async fn test_runs_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let graceful = Graceful::new();
        graceful.add_closer(recorder("database", &log, false));
        graceful.add_closer(recorder("cache", &log, false));
        assert_eq!(graceful.len(), 2);

        let errors = graceful.shutdown(Duration::from_secs(1)).await;
        assert!(errors.is_empty());
        assert_eq!(*log.lock(), vec!["cache", "database"]);
        assert!(graceful.is_empty());
    }

    #[tokio::test]
    async fn test_collects_errors_and_keeps_going() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let graceful = Graceful::new();
        graceful.add_closer(recorder("first", &log, false));
        graceful.add_closer(recorder("second", &log, true));

        let errors = graceful.shutdown(Duration::from_secs(1)).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "second failed");
        assert_eq!(*log.lock(), vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_second_shutdown_is_empty() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let graceful = Graceful::new();
        graceful.add_closer(recorder("only", &log, false));

        graceful.shutdown(Duration::from_secs(1)).await;
        graceful.shutdown(Duration::from_secs(1)).await;
        assert_eq!(*log.lock(), vec!["only"]);
    }
}
