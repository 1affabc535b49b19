use crate::connection::{Connection, ConnectionConfig};
use crate::store::{Driver, StoreDriver};
use std::time::Duration;

/// Builder for a [Connection].
///
/// Building performs no I/O: the store is first contacted when a
/// collection is used.
///
/// # Examples
///
/// ```rust
/// use quarry::Connection;
/// use std::time::Duration;
///
/// let connection = Connection::builder()
///     .configure("memory://shop", "shop")
///     .connect_timeout(Duration::from_secs(2))
///     .operation_timeout(Duration::from_secs(5))
///     .build();
/// assert!(!connection.is_connected());
/// ```
#[derive(Default)]
pub struct ConnectionBuilder {
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        ConnectionBuilder::default()
    }

    /// Sets the store address (`memory://<name>` for the in-memory driver)
    /// and the database name.
    pub fn configure(mut self, address: &str, database: &str) -> Self {
        self.config.set_target(address, database);
        self
    }

    /// Uses `driver` instead of the process-wide in-memory driver.
    pub fn driver<T: StoreDriver + 'static>(mut self, driver: T) -> Self {
        self.config.driver = Driver::new(driver);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Connection {
        Connection::new(self.config)
    }
}
