use crate::store::memory::InMemoryDriver;
use crate::store::Driver;
use std::time::Duration;

/// Where and how a [crate::Connection] reaches its document store.
///
/// A configuration names the store address and database, the [Driver]
/// that opens clients for that address, and the timeouts applied to the
/// handshake and to every later round trip. `None` means no deadline.
///
/// The default configuration uses the process-wide [InMemoryDriver] and
/// has no address, so a connection built from it fails with
/// `ConnectionError` on first use until it is configured.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub(crate) address: String,
    pub(crate) database: String,
    pub(crate) driver: Driver,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) operation_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            address: String::new(),
            database: String::new(),
            driver: Driver::new(InMemoryDriver::global()),
            connect_timeout: None,
            operation_timeout: None,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        ConnectionConfig::default()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    /// Whether an address and a database have been set.
    pub fn is_configured(&self) -> bool {
        !self.address.trim().is_empty() && !self.database.trim().is_empty()
    }

    pub(crate) fn set_target(&mut self, address: &str, database: &str) {
        self.address = address.to_string();
        self.database = database.to_string();
    }
}
