//! Managed MongoDB client.
//!
//! A [`Manager`] owns one driver [`Client`] for the lifetime of the process.
//! Construction translates the configuration, creates the client, checks that
//! at least one cluster member answers and registers the manager with a
//! [`ShutdownRegistry`]. After [`Manager::close`] every accessor fails with
//! [`MongoError::Closed`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::{Document, doc};
use mongodb::error::ErrorKind;
use mongodb::options::{ReadPreference, ReadPreferenceOptions, SelectionCriteria};
use mongodb::{Client, Collection, Database};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::DocumentCodec;
use crate::config::MongoConfig;
use crate::error::{MongoError, MongoResult};
use crate::graceful::{BoxError, Closer, Graceful, ShutdownRegistry};
use crate::options::client_options;

/// A MongoDB client bound to a default database.
///
/// The driver pools connections internally; the manager only guards the
/// handle itself so that use after close is reported instead of silently
/// reconnecting.
pub struct Manager {
    client: RwLock<Option<Client>>,
    database: String,
    codec: Arc<DocumentCodec>,
}

impl Manager {
    /// Connect using `config` and register with `registry`.
    ///
    /// Waits for the driver's server selection timeout at most. Use
    /// [`Manager::builder`] to set a shorter deadline or a custom codec.
    pub async fn new(
        config: &MongoConfig,
        registry: &dyn ShutdownRegistry,
    ) -> MongoResult<Arc<Self>> {
        Self::builder(config).shutdown(registry).connect().await
    }

    /// Create a builder for the manager.
    pub fn builder(config: &MongoConfig) -> ManagerBuilder<'_> {
        ManagerBuilder::new(config)
    }

    pub(crate) fn from_parts(client: Client, database: String, codec: Arc<DocumentCodec>) -> Self {
        Self {
            client: RwLock::new(Some(client)),
            database,
            codec,
        }
    }

    fn handle(&self) -> MongoResult<Client> {
        self.client.read().clone().ok_or(MongoError::Closed)
    }

    /// Get the underlying driver client.
    pub fn client(&self) -> MongoResult<Client> {
        self.handle()
    }

    /// Name of the default database.
    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// Get a database by name.
    pub fn database(&self, name: &str) -> MongoResult<Database> {
        Ok(self.handle()?.database(name))
    }

    /// Get the default database.
    pub fn default_database(&self) -> MongoResult<Database> {
        self.database(&self.database)
    }

    /// Get a typed collection in the default database.
    pub fn collection<T>(&self, name: &str) -> MongoResult<Collection<T>>
    where
        T: Send + Sync,
    {
        Ok(self.default_database()?.collection(name))
    }

    /// Get a collection of raw documents in the default database.
    pub fn collection_doc(&self, name: &str) -> MongoResult<Collection<Document>> {
        self.collection(name)
    }

    /// The codec used by [`Manager::transform_document`].
    pub fn codec(&self) -> &DocumentCodec {
        &self.codec
    }

    /// Encode a value into a document with the manager's codec.
    pub fn transform_document<T>(&self, value: &T) -> MongoResult<Document>
    where
        T: Serialize + ?Sized,
    {
        self.codec.transform(value)
    }

    /// Ping the cluster using the client's read preference.
    pub async fn ping(&self) -> MongoResult<()> {
        self.handle()?
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    /// Whether [`Manager::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.client.read().is_none()
    }

    /// Disconnect the client.
    ///
    /// The handle is released before disconnecting, so the manager is closed
    /// even when the disconnect does not finish within `deadline`. Closing
    /// twice returns [`MongoError::Closed`].
    pub async fn close(&self, deadline: Duration) -> MongoResult<()> {
        let client = self.client.write().take().ok_or(MongoError::Closed)?;

        match tokio::time::timeout(deadline, client.shutdown()).await {
            Ok(()) => {
                info!(database = %self.database, "MongoDB client closed");
                Ok(())
            }
            Err(_) => {
                warn!(database = %self.database, ?deadline, "MongoDB client shutdown timed out");
                Err(MongoError::disconnect(format!(
                    "shutdown did not finish within {:?}",
                    deadline
                )))
            }
        }
    }
}

#[async_trait]
impl Closer for Manager {
    async fn close(&self, deadline: Duration) -> Result<(), BoxError> {
        Manager::close(self, deadline).await.map_err(Into::into)
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("database", &self.database)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for [`Manager`].
pub struct ManagerBuilder<'a> {
    config: &'a MongoConfig,
    codec: Option<Arc<DocumentCodec>>,
    deadline: Option<Duration>,
    registry: Option<&'a dyn ShutdownRegistry>,
}

impl<'a> ManagerBuilder<'a> {
    /// Create a new builder.
    pub fn new(config: &'a MongoConfig) -> Self {
        Self {
            config,
            codec: None,
            deadline: None,
            registry: None,
        }
    }

    /// Use a shared codec instead of a default one.
    pub fn codec(mut self, codec: Arc<DocumentCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Give up on the reachability check after `deadline`.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Register with `registry` instead of [`Graceful::global`].
    pub fn shutdown(mut self, registry: &'a dyn ShutdownRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Create the client, verify reachability and register the manager.
    ///
    /// Nothing is registered when any step fails.
    pub async fn connect(self) -> MongoResult<Arc<Manager>> {
        let options = client_options(self.config)?;
        let client = Client::with_options(options).map_err(MongoError::Connection)?;

        info!(
            hosts = ?self.config.hosts,
            database = %self.config.database,
            "MongoDB client created"
        );

        verify_reachable(&client, self.deadline).await?;

        let manager = Arc::new(Manager::from_parts(
            client,
            self.config.database.clone(),
            self.codec.unwrap_or_default(),
        ));

        let closer: Arc<dyn Closer> = manager.clone();
        match self.registry {
            Some(registry) => registry.add_closer(closer),
            None => Graceful::global().add_closer(closer),
        }

        info!(database = %manager.database, "MongoDB cluster reachable");
        Ok(manager)
    }
}

/// Ping with primary-preferred selection: the primary when it is up,
/// otherwise any member that answers. Fails only when no member answers.
async fn verify_reachable(client: &Client, deadline: Option<Duration>) -> MongoResult<()> {
    let criteria = SelectionCriteria::ReadPreference(ReadPreference::PrimaryPreferred {
        options: ReadPreferenceOptions::default(),
    });
    let admin = client.database("admin");
    let ping = admin.run_command(doc! { "ping": 1 }, criteria);

    let result = match deadline {
        Some(deadline) => tokio::time::timeout(deadline, ping)
            .await
            .map_err(|_| MongoError::DeadlineExceeded(deadline))?,
        None => ping.await,
    };

    match result {
        Ok(_) => Ok(()),
        Err(err) if matches!(*err.kind, ErrorKind::ServerSelection { .. }) => {
            debug!(error = %err, "no MongoDB member selectable");
            Err(MongoError::Unreachable(err))
        }
        Err(err) => Err(MongoError::Driver(err)),
    }
}
