use crate::common::MEMORY_SCHEME;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::store::memory::{InMemoryClient, InMemoryServer};
use crate::store::{OperationContext, StoreClient, StoreDriver};
use dashmap::DashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static GLOBAL_DRIVER: LazyLock<InMemoryDriver> = LazyLock::new(InMemoryDriver::new);

/// A [StoreDriver] for in-process servers addressed as `memory://<name>`.
///
/// Servers are created on first connect and live as long as the driver.
/// Connections built without an explicit driver share the process-wide
/// [InMemoryDriver::global] instance, so two connections to the same
/// address see the same data.
///
/// # Examples
///
/// ```rust
/// use quarry::store::memory::InMemoryDriver;
///
/// let driver = InMemoryDriver::new();
/// let server = driver.server("test");
/// server.set_read_only(true);
/// assert!(driver.server("test").is_read_only());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryDriver {
    inner: Arc<InMemoryDriverInner>,
}

#[derive(Default)]
struct InMemoryDriverInner {
    servers: DashMap<String, InMemoryServer>,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        InMemoryDriver::default()
    }

    /// The process-wide driver.
    pub fn global() -> Self {
        GLOBAL_DRIVER.clone()
    }

    /// Returns the server with the given name, creating it if needed.
    pub fn server(&self, name: &str) -> InMemoryServer {
        self.inner
            .servers
            .entry(name.to_string())
            .or_insert_with(|| InMemoryServer::new(name))
            .value()
            .clone()
    }

    /// Returns the server an address points at.
    pub fn server_for(&self, address: &str) -> QuarryResult<InMemoryServer> {
        let name = parse_address(address)?;
        Ok(self.server(&name))
    }
}

/// Extracts the server name from a `memory://<name>` address.
pub fn parse_address(address: &str) -> QuarryResult<String> {
    let prefix = format!("{}://", MEMORY_SCHEME);
    match address.strip_prefix(&prefix) {
        Some(rest) if !rest.trim_end_matches('/').is_empty() => {
            Ok(rest.trim_end_matches('/').to_string())
        }
        _ => {
            log::error!("Unsupported store address {:?}", address);
            Err(QuarryError::new(
                &format!(
                    "Unsupported store address {:?}, expected {}://<name>",
                    address, MEMORY_SCHEME
                ),
                ErrorKind::ConnectionError,
            ))
        }
    }
}

impl StoreDriver for InMemoryDriver {
    fn connect(
        &self,
        address: &str,
        database: &str,
        connect_timeout: Option<Duration>,
    ) -> QuarryResult<StoreClient> {
        let server = self.server_for(address)?;

        if database.trim().is_empty() {
            log::error!("Could not select an empty database name on {}", address);
            return Err(QuarryError::new(
                &format!("Could not select database {:?} on {}", database, address),
                ErrorKind::ConnectionError,
            ));
        }

        // the handshake is one round trip bounded by the connect timeout
        let handshake = OperationContext::new(connect_timeout, Arc::new(AtomicBool::new(false)));
        if let Err(err) = server.round_trip(&handshake) {
            log::error!("Could not connect to {}: {}", address, err);
            return Err(QuarryError::new_with_cause(
                &format!("Could not connect to {}", address),
                ErrorKind::ConnectionError,
                err,
            ));
        }

        log::debug!("Connected to {} database {}", address, database);
        Ok(StoreClient::new(InMemoryClient::new(server, database)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Document;
    use crate::doc;
    use crate::store::FindOptions;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("memory://blog").unwrap(), "blog");
        assert_eq!(parse_address("memory://blog/").unwrap(), "blog");
        assert_eq!(
            parse_address("mongodb://localhost").unwrap_err().kind(),
            &ErrorKind::ConnectionError
        );
        assert!(parse_address("memory://").is_err());
    }

    #[test]
    fn test_clients_of_same_address_share_data() {
        let driver = InMemoryDriver::new();
        let context = OperationContext::unbounded();
        let first = driver.connect("memory://shared", "db", None).unwrap();
        let second = driver.connect("memory://shared", "db", None).unwrap();

        first.insert("posts", &doc! { a: 1 }, &context).unwrap();
        let found: Vec<Document> = second
            .find("posts", &doc! {}, &FindOptions::new(), &context)
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_databases_do_not_share_data() {
        let driver = InMemoryDriver::new();
        let context = OperationContext::unbounded();
        let a = driver.connect("memory://dbs", "a", None).unwrap();
        let b = driver.connect("memory://dbs", "b", None).unwrap();

        a.insert("posts", &doc! { a: 1 }, &context).unwrap();
        assert!(b
            .find("posts", &doc! {}, &FindOptions::new(), &context)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_connect_to_stopped_server_fails() {
        let driver = InMemoryDriver::new();
        driver.server("down").shutdown();
        let err = driver.connect("memory://down", "db", None).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ConnectionError);
        assert!(err.cause().is_some());
    }

    #[test]
    fn test_connect_timeout_is_connection_error() {
        let driver = InMemoryDriver::new();
        driver.server("slow").set_latency(Some(Duration::from_millis(200)));
        let err = driver
            .connect("memory://slow", "db", Some(Duration::from_millis(5)))
            .err()
            .unwrap();
        assert_eq!(err.kind(), &ErrorKind::ConnectionError);
        assert_eq!(err.cause().map(|c| c.kind().clone()), Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_empty_database_name_fails() {
        let driver = InMemoryDriver::new();
        let err = driver.connect("memory://x", " ", None).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ConnectionError);
    }

    #[test]
    fn test_global_driver_is_shared() {
        let name = "global-driver-test";
        InMemoryDriver::global().server(name).set_read_only(true);
        assert!(InMemoryDriver::global().server(name).is_read_only());
    }
}
