use crate::common::{Document, Value};
use dashmap::DashMap;
use std::sync::Arc;

/// Collects the key/value pairs a map function emits.
#[derive(Debug, Default)]
pub struct Emitter {
    emitted: Vec<(Value, Value)>,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter {
            emitted: Vec::new(),
        }
    }

    pub fn emit<K: Into<Value>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.emitted.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }

    pub(crate) fn into_pairs(self) -> Vec<(Value, Value)> {
        self.emitted
    }
}

/// Map body: `(document, scope, emitter)`.
pub type MapFunction = Arc<dyn Fn(&Document, &Document, &mut Emitter) + Send + Sync>;
/// Reduce body: `(key, values, scope) -> reduced`.
pub type ReduceFunction = Arc<dyn Fn(&Value, &[Value], &Document) -> Value + Send + Sync>;
/// Finalize body: `(key, reduced, scope) -> final value`.
pub type FinalizeFunction = Arc<dyn Fn(&Value, Value, &Document) -> Value + Send + Sync>;
/// `$where` body: `document -> matches`.
pub type PredicateFunction = Arc<dyn Fn(&Document) -> bool + Send + Sync>;

/// Native implementations of the opaque code bodies an in-memory server
/// evaluates.
///
/// The mapper sends map, reduce, finalize and `$where` bodies as code
/// text it never interprets. The in-memory server looks each body up here
/// by its text, ignoring surrounding whitespace.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    inner: Arc<FunctionRegistryInner>,
}

#[derive(Default)]
struct FunctionRegistryInner {
    maps: DashMap<String, MapFunction>,
    reduces: DashMap<String, ReduceFunction>,
    finalizers: DashMap<String, FinalizeFunction>,
    predicates: DashMap<String, PredicateFunction>,
}

fn code_key(code: &str) -> String {
    code.trim().to_string()
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    pub fn register_map<F>(&self, code: &str, function: F)
    where
        F: Fn(&Document, &Document, &mut Emitter) + Send + Sync + 'static,
    {
        self.inner.maps.insert(code_key(code), Arc::new(function));
    }

    pub fn register_reduce<F>(&self, code: &str, function: F)
    where
        F: Fn(&Value, &[Value], &Document) -> Value + Send + Sync + 'static,
    {
        self.inner.reduces.insert(code_key(code), Arc::new(function));
    }

    pub fn register_finalize<F>(&self, code: &str, function: F)
    where
        F: Fn(&Value, Value, &Document) -> Value + Send + Sync + 'static,
    {
        self.inner.finalizers.insert(code_key(code), Arc::new(function));
    }

    pub fn register_predicate<F>(&self, code: &str, function: F)
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        self.inner.predicates.insert(code_key(code), Arc::new(function));
    }

    pub fn map(&self, code: &str) -> Option<MapFunction> {
        self.inner.maps.get(&code_key(code)).map(|f| f.value().clone())
    }

    pub fn reduce(&self, code: &str) -> Option<ReduceFunction> {
        self.inner.reduces.get(&code_key(code)).map(|f| f.value().clone())
    }

    pub fn finalize(&self, code: &str) -> Option<FinalizeFunction> {
        self.inner.finalizers.get(&code_key(code)).map(|f| f.value().clone())
    }

    pub fn predicate(&self, code: &str) -> Option<PredicateFunction> {
        self.inner.predicates.get(&code_key(code)).map(|f| f.value().clone())
    }
}
