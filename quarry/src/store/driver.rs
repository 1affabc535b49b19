use crate::errors::QuarryResult;
use crate::store::StoreClient;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

/// Opens [StoreClient]s for a server address and database name.
///
/// A driver is the only component that knows how to reach a store. The
/// connection calls [StoreDriver::connect] once, lazily, and reuses the
/// returned client until it is reconfigured.
pub trait StoreDriver: Send + Sync {
    /// Connects to `address` and selects `database`.
    ///
    /// Fails with a connection error when the server cannot be reached or
    /// the database cannot be selected.
    fn connect(
        &self,
        address: &str,
        database: &str,
        connect_timeout: Option<Duration>,
    ) -> QuarryResult<StoreClient>;
}

/// A shared handle to a [StoreDriver].
#[derive(Clone)]
pub struct Driver {
    inner: Arc<dyn StoreDriver>,
}

impl Driver {
    pub fn new<T: StoreDriver + 'static>(inner: T) -> Self {
        Driver {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Driver {
    type Target = Arc<dyn StoreDriver>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
