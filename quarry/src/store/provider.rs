use crate::common::Document;
use crate::errors::QuarryResult;
use crate::store::{FindOptions, OperationContext, WriteAck};
use std::ops::Deref;
use std::sync::Arc;

/// The document-store protocol quarry speaks.
///
/// A provider is bound to one database. Filters, projections and commands
/// use the operator vocabulary of [crate::common] (`$gt`, `$in`, `$where`,
/// `count`, `mapreduce`, `drop`, ...). Every call receives the
/// [OperationContext] of its round trip and must honor its deadline and
/// cancellation flag.
///
/// Transport failures are returned as errors. A write the store refused is
/// an `Ok` [WriteAck] that is not acknowledged, and a failed command is an
/// `Ok` reply with `ok: 0` and an `errmsg`.
pub trait StoreProvider: Send + Sync {
    fn find(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
        context: &OperationContext,
    ) -> QuarryResult<Vec<Document>>;

    fn insert(
        &self,
        collection: &str,
        document: &Document,
        context: &OperationContext,
    ) -> QuarryResult<WriteAck>;

    /// Replaces the first document matching `selector`.
    fn update(
        &self,
        collection: &str,
        selector: &Document,
        document: &Document,
        context: &OperationContext,
    ) -> QuarryResult<WriteAck>;

    fn remove(
        &self,
        collection: &str,
        selector: &Document,
        just_one: bool,
        context: &OperationContext,
    ) -> QuarryResult<WriteAck>;

    fn command(&self, command: &Document, context: &OperationContext) -> QuarryResult<Document>;
}

/// A shared handle to a connected [StoreProvider].
#[derive(Clone)]
pub struct StoreClient {
    inner: Arc<dyn StoreProvider>,
}

impl StoreClient {
    pub fn new<T: StoreProvider + 'static>(inner: T) -> Self {
        StoreClient {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for StoreClient {
    type Target = Arc<dyn StoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl StoreProvider for CountingProvider {
        fn find(
            &self,
            _collection: &str,
            _filter: &Document,
            _options: &FindOptions,
            _context: &OperationContext,
        ) -> QuarryResult<Vec<Document>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![doc! { a: 1 }])
        }

        fn insert(
            &self,
            _collection: &str,
            _document: &Document,
            _context: &OperationContext,
        ) -> QuarryResult<WriteAck> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(WriteAck::acknowledged(1))
        }

        fn update(
            &self,
            _collection: &str,
            _selector: &Document,
            _document: &Document,
            _context: &OperationContext,
        ) -> QuarryResult<WriteAck> {
            Ok(WriteAck::acknowledged(0))
        }

        fn remove(
            &self,
            _collection: &str,
            _selector: &Document,
            _just_one: bool,
            _context: &OperationContext,
        ) -> QuarryResult<WriteAck> {
            Ok(WriteAck::unacknowledged(None))
        }

        fn command(&self, _command: &Document, _context: &OperationContext) -> QuarryResult<Document> {
            Ok(doc! { ok: 1 })
        }
    }

    #[test]
    fn test_client_dispatches_to_provider() {
        let client = StoreClient::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let context = OperationContext::unbounded();

        let docs = client
            .find("posts", &doc! {}, &FindOptions::new(), &context)
            .unwrap();
        assert_eq!(docs, vec![doc! { a: 1 }]);

        let shared = client.clone();
        assert!(shared.insert("posts", &doc! {}, &context).unwrap().is_acknowledged());
        assert!(!client.remove("posts", &doc! {}, true, &context).unwrap().is_acknowledged());
        assert_eq!(client.command(&doc! { ping: 1 }, &context).unwrap(), doc! { ok: 1 });
    }
}
