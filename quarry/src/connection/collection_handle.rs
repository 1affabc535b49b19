use crate::common::{Document, Value, CMD_COUNT, CMD_DROP, CMD_ERRMSG, CMD_N, CMD_OK};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::store::{FindOptions, OperationContext, StoreClient, WriteAck};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Whether a command reply reports success (`ok: 1`).
pub(crate) fn is_ok_reply(reply: &Document) -> bool {
    reply.get(CMD_OK).and_then(|v| v.as_f64()) == Some(1.0)
}

/// The error message of a failed command reply.
pub(crate) fn reply_error(reply: &Document) -> String {
    reply
        .get(CMD_ERRMSG)
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
        .to_string()
}

/// A cached handle to one collection of a connected database.
///
/// Every call is a single blocking round trip bounded by the connection's
/// operation timeout and cancellation flag.
#[derive(Clone)]
pub struct CollectionHandle {
    inner: Arc<CollectionHandleInner>,
}

struct CollectionHandleInner {
    name: String,
    client: StoreClient,
    operation_timeout: Option<Duration>,
    cancelled: Arc<AtomicBool>,
}

impl CollectionHandle {
    pub(crate) fn new(
        name: &str,
        client: StoreClient,
        operation_timeout: Option<Duration>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        CollectionHandle {
            inner: Arc::new(CollectionHandleInner {
                name: name.to_string(),
                client,
                operation_timeout,
                cancelled,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn context(&self) -> OperationContext {
        OperationContext::new(self.inner.operation_timeout, self.inner.cancelled.clone())
    }

    pub fn find(&self, filter: &Document, options: &FindOptions) -> QuarryResult<Vec<Document>> {
        self.inner
            .client
            .find(&self.inner.name, filter, options, &self.context())
    }

    pub fn find_one(&self, filter: &Document) -> QuarryResult<Option<Document>> {
        let mut found = self.find(filter, &FindOptions::new().limit(1))?;
        Ok(if found.is_empty() { None } else { Some(found.swap_remove(0)) })
    }

    pub fn insert(&self, document: &Document) -> QuarryResult<WriteAck> {
        self.inner
            .client
            .insert(&self.inner.name, document, &self.context())
    }

    pub fn update(&self, selector: &Document, document: &Document) -> QuarryResult<WriteAck> {
        self.inner
            .client
            .update(&self.inner.name, selector, document, &self.context())
    }

    pub fn remove(&self, selector: &Document, just_one: bool) -> QuarryResult<WriteAck> {
        self.inner
            .client
            .remove(&self.inner.name, selector, just_one, &self.context())
    }

    /// Counts the documents matching `filter`, honoring `skip` and `limit`
    /// when given.
    pub fn count(
        &self,
        filter: &Document,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> QuarryResult<u64> {
        let mut command = Document::new();
        command.put(CMD_COUNT, self.inner.name.as_str());
        command.put("query", filter.clone());
        if let Some(skip) = skip {
            command.put("skip", skip);
        }
        if let Some(limit) = limit {
            command.put("limit", limit);
        }

        let reply = self.inner.client.command(&command, &self.context())?;
        if !is_ok_reply(&reply) {
            let message = reply_error(&reply);
            log::error!("Count on {} failed: {}", self.inner.name, message);
            return Err(QuarryError::new(
                &format!("Could not count {}: {}", self.inner.name, message),
                ErrorKind::InvalidQuery,
            ));
        }

        match reply.get(CMD_N).and_then(Value::as_i64) {
            Some(n) if n >= 0 => Ok(n as u64),
            _ => {
                log::error!("Count reply for {} carries no count: {}", self.inner.name, reply);
                Err(QuarryError::new(
                    &format!("Invalid count reply {}", reply),
                    ErrorKind::InternalError,
                ))
            }
        }
    }

    /// Runs a database command through this handle's client.
    pub fn command(&self, command: &Document) -> QuarryResult<Document> {
        self.inner.client.command(command, &self.context())
    }

    /// Drops the collection. A reply with an error status is a `DataError`.
    pub fn drop(&self) -> QuarryResult<()> {
        let mut command = Document::new();
        command.put(CMD_DROP, self.inner.name.as_str());

        let reply = self.command(&command)?;
        if is_ok_reply(&reply) {
            log::debug!("Dropped collection {}", self.inner.name);
            Ok(())
        } else {
            let message = reply_error(&reply);
            log::error!("Could not drop collection {}: {}", self.inner.name, message);
            Err(QuarryError::new(
                &format!("Could not drop collection {}: {}", self.inner.name, message),
                ErrorKind::DataError,
            ))
        }
    }
}


impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.inner.name)
            .finish()
    }
}
