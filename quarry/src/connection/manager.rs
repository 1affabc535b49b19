use crate::common::{atomic, classify, Atomic, Document, ReadExecutor, WriteExecutor};
use crate::connection::{CollectionHandle, ConnectionBuilder, ConnectionConfig};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::record::{Model, Schema};
use crate::store::{OperationContext, StoreClient};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The connection manager.
///
/// A `Connection` owns at most one client of its document store, opened
/// lazily on first use, and caches one [CollectionHandle] per collection
/// name. It also keeps the [Schema]s registered through
/// [Connection::model] so that referenced documents materialize as
/// records of the right model.
///
/// Connections are cheap to clone; clones share the client, the caches
/// and the cancellation state. There is no automatic reconnection: after a
/// hard disconnect call [Connection::configure] to start over.
///
/// # Examples
///
/// ```rust
/// use quarry::{doc, Connection, Schema};
///
/// let connection = Connection::builder()
///     .configure("memory://connection-doc", "app")
///     .build();
///
/// let users = connection.collection("users").unwrap();
/// users.insert(&doc! { name: "ada" }).unwrap();
/// assert!(connection.is_connected());
///
/// connection.drop_collection("users").unwrap();
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    config: Atomic<ConnectionConfig>,
    client: Atomic<Option<StoreClient>>,
    collections: DashMap<String, CollectionHandle>,
    schemas: DashMap<String, Arc<Schema>>,
    cancelled: Arc<AtomicBool>,
}

impl Connection {
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    pub(crate) fn new(config: ConnectionConfig) -> Self {
        Connection {
            inner: Arc::new(ConnectionInner {
                config: atomic(config),
                client: atomic(None),
                collections: DashMap::new(),
                schemas: DashMap::new(),
                cancelled: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    pub fn config(&self) -> ConnectionConfig {
        self.inner.config.read_with(|config| config.clone())
    }

    pub fn address(&self) -> String {
        self.inner.config.read_with(|config| config.address().to_string())
    }

    pub fn database(&self) -> String {
        self.inner.config.read_with(|config| config.database().to_string())
    }

    /// Points the connection at another address and database.
    ///
    /// No I/O happens here. The current client, the collection cache and a
    /// pending cancellation are discarded; the next collection access
    /// connects again.
    pub fn configure(&self, address: &str, database: &str) {
        self.inner
            .config
            .write_with(|config| config.set_target(address, database));
        self.inner.client.write_with(|client| *client = None);
        self.inner.collections.clear();
        self.inner.cancelled.store(false, Ordering::Release);
        log::debug!("Connection configured for {} database {}", address, database);
    }

    /// Whether the client has been established.
    pub fn is_connected(&self) -> bool {
        self.inner.client.read_with(|client| client.is_some())
    }

    /// Returns the handle of a collection, connecting first if needed.
    pub fn collection(&self, name: &str) -> QuarryResult<CollectionHandle> {
        if name.trim().is_empty() {
            log::error!("Collection name cannot be empty");
            return Err(QuarryError::new(
                "Could not select a collection with an empty name",
                ErrorKind::ConnectionError,
            ));
        }

        if let Some(handle) = self.inner.collections.get(name) {
            return Ok(handle.value().clone());
        }

        let client = self.client()?;
        let timeout = self.config().operation_timeout();
        let handle = self
            .inner
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                CollectionHandle::new(name, client, timeout, self.inner.cancelled.clone())
            })
            .value()
            .clone();
        Ok(handle)
    }

    /// Drops a collection. A refusal from the store is a `DataError`.
    pub fn drop_collection(&self, name: &str) -> QuarryResult<()> {
        let handle = self.collection(name)?;
        self.inner.collections.remove(name);
        handle.drop()
    }

    /// Runs a database command and returns the raw reply.
    pub fn run_command(&self, command: &Document) -> QuarryResult<Document> {
        let client = self.client()?;
        client.command(command, &self.context())
    }

    /// Fails pending and later round trips with `Cancelled` until
    /// [Connection::resume] or [Connection::configure] is called.
    pub fn cancel(&self) {
        log::info!("Cancelling round trips on {}", self.address());
        self.inner.cancelled.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.inner.cancelled.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Registers `schema` under its collection name and returns its model.
    pub fn model(&self, schema: Schema) -> Model {
        let schema = Arc::new(schema);
        self.inner
            .schemas
            .insert(schema.collection().to_string(), schema.clone());
        Model::new(self.clone(), schema)
    }

    /// The schema registered for `collection`, or a bare schema named after
    /// the collection.
    pub fn schema_for(&self, collection: &str) -> Arc<Schema> {
        if let Some(schema) = self.inner.schemas.get(collection) {
            return schema.value().clone();
        }
        Arc::new(
            Schema::builder(&classify(collection))
                .collection(collection)
                .build(),
        )
    }

    fn context(&self) -> OperationContext {
        OperationContext::new(self.config().operation_timeout(), self.inner.cancelled.clone())
    }

    fn client(&self) -> QuarryResult<StoreClient> {
        if let Some(client) = self.inner.client.read_with(|client| client.clone()) {
            return Ok(client);
        }

        self.inner.client.write_with(|slot| {
            // another thread may have connected while we waited
            if let Some(client) = slot.as_ref() {
                return Ok(client.clone());
            }

            let config = self.config();
            if !config.is_configured() {
                log::error!("Connection is not configured");
                return Err(QuarryError::new(
                    "Connection is not configured with an address and a database",
                    ErrorKind::ConnectionError,
                ));
            }

            let client = config.driver().connect(
                config.address(),
                config.database(),
                config.connect_timeout(),
            )?;
            log::info!("Connected to {} database {}", config.address(), config.database());
            *slot = Some(client.clone());
            Ok(client)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::store::memory::InMemoryDriver;
    use crate::store::{FindOptions, StoreDriver};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct CountingDriver {
        memory: InMemoryDriver,
        connects: Arc<AtomicUsize>,
    }

    impl StoreDriver for CountingDriver {
        fn connect(
            &self,
            address: &str,
            database: &str,
            connect_timeout: Option<Duration>,
        ) -> QuarryResult<StoreClient> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.memory.connect(address, database, connect_timeout)
        }
    }

    fn connection(driver: CountingDriver) -> Connection {
        Connection::builder()
            .driver(driver)
            .configure("memory://connection-test", "db")
            .build()
    }

    #[test]
    fn test_single_lazy_client_and_handle_cache() {
        let driver = CountingDriver::default();
        let connection = connection(driver.clone());
        assert!(!connection.is_connected());
        assert_eq!(driver.connects.load(Ordering::SeqCst), 0);

        let first = connection.collection("posts").unwrap();
        let second = connection.collection("posts").unwrap();
        connection.collection("users").unwrap();

        assert!(connection.is_connected());
        assert_eq!(driver.connects.load(Ordering::SeqCst), 1);
        assert_eq!(first.name(), second.name());
        assert_eq!(connection.inner.collections.len(), 2);
    }

    #[test]
    fn test_unreachable_server_is_connection_error() {
        let driver = CountingDriver::default();
        driver.memory.server("connection-test").shutdown();
        let connection = connection(driver);

        let err = connection.collection("posts").err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ConnectionError);
        assert!(!connection.is_connected());
    }

    #[test]
    fn test_unconfigured_connection() {
        let connection = Connection::builder().driver(InMemoryDriver::new()).build();
        let err = connection.collection("posts").err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ConnectionError);
        assert!(connection.collection(" ").is_err());
    }

    #[test]
    fn test_configure_discards_client_and_cache() {
        let driver = CountingDriver::default();
        let connection = connection(driver.clone());
        connection.collection("posts").unwrap();
        connection.cancel();

        connection.configure("memory://connection-test-2", "other");
        assert!(!connection.is_connected());
        assert!(!connection.is_cancelled());
        assert_eq!(connection.address(), "memory://connection-test-2");
        assert_eq!(connection.database(), "other");

        connection.collection("posts").unwrap();
        assert_eq!(driver.connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancel_and_resume() {
        let connection = connection(CountingDriver::default());
        let posts = connection.collection("posts").unwrap();

        connection.cancel();
        let err = posts.find(&doc! {}, &FindOptions::new()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Cancelled);

        connection.resume();
        assert!(posts.find(&doc! {}, &FindOptions::new()).is_ok());
    }

    #[test]
    fn test_drop_collection() {
        let connection = connection(CountingDriver::default());
        let posts = connection.collection("drop_me").unwrap();
        posts.insert(&doc! { a: 1 }).unwrap();

        assert!(connection.drop_collection("drop_me").is_ok());
        let err = connection.drop_collection("drop_me").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DataError);
    }

    #[test]
    fn test_run_command() {
        let connection = connection(CountingDriver::default());
        connection.collection("counted").unwrap().insert(&doc! { a: 1 }).unwrap();
        let reply = connection.run_command(&doc! { count: "counted" }).unwrap();
        assert_eq!(reply.get("n").and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn test_schema_registry() {
        let connection = connection(CountingDriver::default());
        let fallback = connection.schema_for("blog_posts");
        assert_eq!(fallback.name(), "BlogPost");
        assert_eq!(fallback.collection(), "blog_posts");

        let model = connection.model(Schema::builder("Person").build());
        assert_eq!(model.collection_name(), "people");
        let registered = connection.schema_for("people");
        assert!(Arc::ptr_eq(&registered, model.schema()));
    }
}
