use crate::common::{atomic, Atomic, Document, ReadExecutor, Value, WriteExecutor};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::store::memory::{Emitter, FilterMatcher, FunctionRegistry};
use crate::store::OperationContext;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// One database of an [InMemoryServer]: a set of named collections.
#[derive(Default)]
pub(crate) struct InMemoryDatabase {
    collections: DashMap<String, Atomic<Vec<Document>>>,
}

impl InMemoryDatabase {
    /// Returns the collection, creating it on first use.
    pub(crate) fn collection(&self, name: &str) -> Atomic<Vec<Document>> {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| atomic(Vec::new()))
            .value()
            .clone()
    }

    /// A copy of the documents of a collection; empty if it does not exist.
    pub(crate) fn snapshot(&self, name: &str) -> Vec<Document> {
        match self.collections.get(name) {
            Some(entry) => entry.value().read_with(|docs| docs.clone()),
            None => Vec::new(),
        }
    }

    pub(crate) fn replace_collection(&self, name: &str, documents: Vec<Document>) {
        self.collections.insert(name.to_string(), atomic(documents));
    }

    pub(crate) fn drop_collection(&self, name: &str) -> bool {
        self.collections.remove(name).is_some()
    }

    pub(crate) fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

/// An in-process document server.
///
/// A server holds any number of databases and can be shut down, made
/// read-only or slowed down to exercise the failure paths of a
/// connection. Map, reduce, finalize and `$where` code bodies are resolved
/// through the server's [FunctionRegistry].
///
/// Clones share the same server.
#[derive(Clone)]
pub struct InMemoryServer {
    inner: Arc<InMemoryServerInner>,
}

struct InMemoryServerInner {
    name: String,
    databases: DashMap<String, Arc<InMemoryDatabase>>,
    functions: FunctionRegistry,
    matcher: FilterMatcher,
    running: AtomicBool,
    read_only: AtomicBool,
    latency: Atomic<Option<Duration>>,
    write_count: AtomicU64,
}

impl InMemoryServer {
    pub fn new(name: &str) -> Self {
        let functions = FunctionRegistry::new();
        InMemoryServer {
            inner: Arc::new(InMemoryServerInner {
                name: name.to_string(),
                databases: DashMap::new(),
                matcher: FilterMatcher::new(functions.clone()),
                functions,
                running: AtomicBool::new(true),
                read_only: AtomicBool::new(false),
                latency: atomic(None),
                write_count: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.inner.functions
    }

    pub fn register_map<F>(&self, code: &str, function: F)
    where
        F: Fn(&Document, &Document, &mut Emitter) + Send + Sync + 'static,
    {
        self.inner.functions.register_map(code, function)
    }

    pub fn register_reduce<F>(&self, code: &str, function: F)
    where
        F: Fn(&Value, &[Value], &Document) -> Value + Send + Sync + 'static,
    {
        self.inner.functions.register_reduce(code, function)
    }

    pub fn register_finalize<F>(&self, code: &str, function: F)
    where
        F: Fn(&Value, Value, &Document) -> Value + Send + Sync + 'static,
    {
        self.inner.functions.register_finalize(code, function)
    }

    pub fn register_predicate<F>(&self, code: &str, function: F)
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        self.inner.functions.register_predicate(code, function)
    }

    /// Makes the server unreachable. Data is kept.
    pub fn shutdown(&self) {
        log::info!("Shutting down in-memory server {}", self.inner.name);
        self.inner.running.store(false, Ordering::Release);
    }

    pub fn start(&self) {
        log::info!("Starting in-memory server {}", self.inner.name);
        self.inner.running.store(true, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// A read-only server refuses every write without failing the round
    /// trip: writes come back unacknowledged.
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.read_only.store(read_only, Ordering::Release);
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only.load(Ordering::Acquire)
    }

    /// Delays every round trip by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.inner.latency.write_with(|it| *it = latency);
    }

    /// Number of acknowledged inserts, updates and removes.
    pub fn write_count(&self) -> u64 {
        self.inner.write_count.load(Ordering::Acquire)
    }

    pub fn collection_names(&self, database: &str) -> Vec<String> {
        match self.inner.databases.get(database) {
            Some(db) => db.value().collection_names(),
            None => Vec::new(),
        }
    }

    /// A copy of the stored documents of a collection.
    pub fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        match self.inner.databases.get(database) {
            Some(db) => db.value().snapshot(collection),
            None => Vec::new(),
        }
    }

    pub(crate) fn database(&self, name: &str) -> Arc<InMemoryDatabase> {
        self.inner
            .databases
            .entry(name.to_string())
            .or_default()
            .value()
            .clone()
    }

    pub(crate) fn matcher(&self) -> &FilterMatcher {
        &self.inner.matcher
    }

    pub(crate) fn record_write(&self) {
        self.inner.write_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn ensure_running(&self) -> QuarryResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            log::error!("In-memory server {} is not reachable", self.inner.name);
            Err(QuarryError::new(
                &format!("Server memory://{} is not reachable", self.inner.name),
                ErrorKind::ConnectionError,
            ))
        }
    }

    /// Simulates the network part of a round trip: reachability, the
    /// configured latency and the context's deadline and cancellation.
    pub(crate) fn round_trip(&self, context: &OperationContext) -> QuarryResult<()> {
        self.ensure_running()?;
        context.check()?;

        let latency = self.inner.latency.read_with(|it| *it);
        if let Some(latency) = latency {
            let until = Instant::now() + latency;
            loop {
                let now = Instant::now();
                if now >= until {
                    break;
                }
                std::thread::sleep((until - now).min(POLL_INTERVAL));
                context.check()?;
            }
        }
        self.ensure_running()
    }
}
