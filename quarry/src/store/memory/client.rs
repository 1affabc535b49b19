use crate::common::{Document, ObjectId, WriteExecutor, DOC_ID};
use crate::errors::QuarryResult;
use crate::store::memory::commands::run_command;
use crate::store::memory::cursor::finish;
use crate::store::memory::server::InMemoryDatabase;
use crate::store::memory::InMemoryServer;
use crate::store::{FindOptions, OperationContext, StoreProvider, WriteAck};
use std::sync::Arc;

const READ_ONLY: &str = "server is read only";

/// A [StoreProvider] bound to one database of an [InMemoryServer].
pub struct InMemoryClient {
    server: InMemoryServer,
    database_name: String,
    database: Arc<InMemoryDatabase>,
}

impl InMemoryClient {
    pub fn new(server: InMemoryServer, database: &str) -> Self {
        InMemoryClient {
            database: server.database(database),
            database_name: database.to_string(),
            server,
        }
    }

    pub fn server(&self) -> &InMemoryServer {
        &self.server
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    // index of every document matching the selector
    fn positions(
        &self,
        documents: &[Document],
        selector: &Document,
        just_one: bool,
    ) -> QuarryResult<Vec<usize>> {
        let mut positions = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            if self.server.matcher().matches(document, selector)? {
                positions.push(index);
                if just_one {
                    break;
                }
            }
        }
        Ok(positions)
    }
}

impl StoreProvider for InMemoryClient {
    fn find(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
        context: &OperationContext,
    ) -> QuarryResult<Vec<Document>> {
        self.server.round_trip(context)?;

        let mut matched = Vec::new();
        for document in self.database.snapshot(collection) {
            if self.server.matcher().matches(&document, filter)? {
                matched.push(document);
            }
        }
        log::debug!(
            "find {}.{} {} matched {} documents",
            self.database_name,
            collection,
            filter,
            matched.len()
        );
        finish(matched, filter, options)
    }

    fn insert(
        &self,
        collection: &str,
        document: &Document,
        context: &OperationContext,
    ) -> QuarryResult<WriteAck> {
        self.server.round_trip(context)?;
        if self.server.is_read_only() {
            return Ok(WriteAck::unacknowledged(Some(READ_ONLY)));
        }

        let mut document = document.clone();
        let id = match document.id() {
            Some(id) => id,
            None => {
                let id = ObjectId::new();
                document.put(DOC_ID, id);
                id
            }
        };

        let ack = self.database.collection(collection).write_with(|documents| {
            if documents.iter().any(|existing| existing.id() == Some(id)) {
                WriteAck::unacknowledged(Some(&format!(
                    "duplicate key error: {}.{} _id {}",
                    self.database_name, collection, id
                )))
            } else {
                documents.push(document);
                WriteAck::acknowledged(1)
            }
        });

        if ack.is_acknowledged() {
            self.server.record_write();
        }
        log::debug!("insert {}.{} {:?}", self.database_name, collection, ack);
        Ok(ack)
    }

    fn update(
        &self,
        collection: &str,
        selector: &Document,
        document: &Document,
        context: &OperationContext,
    ) -> QuarryResult<WriteAck> {
        self.server.round_trip(context)?;
        if self.server.is_read_only() {
            return Ok(WriteAck::unacknowledged(Some(READ_ONLY)));
        }

        let target = self.database.collection(collection);
        let ack = target.write_with(|documents| -> QuarryResult<WriteAck> {
            let positions = self.positions(documents, selector, true)?;
            match positions.first() {
                Some(&index) => {
                    let mut replacement = document.clone();
                    if let (None, Some(id)) = (replacement.id(), documents[index].id()) {
                        replacement.put(DOC_ID, id);
                    }
                    documents[index] = replacement;
                    Ok(WriteAck::acknowledged(1))
                }
                None => Ok(WriteAck::acknowledged(0)),
            }
        })?;

        if ack.n() > 0 {
            self.server.record_write();
        }
        log::debug!("update {}.{} {} {:?}", self.database_name, collection, selector, ack);
        Ok(ack)
    }

    fn remove(
        &self,
        collection: &str,
        selector: &Document,
        just_one: bool,
        context: &OperationContext,
    ) -> QuarryResult<WriteAck> {
        self.server.round_trip(context)?;
        if self.server.is_read_only() {
            return Ok(WriteAck::unacknowledged(Some(READ_ONLY)));
        }

        let target = self.database.collection(collection);
        let ack = target.write_with(|documents| -> QuarryResult<WriteAck> {
            let positions = self.positions(documents, selector, just_one)?;
            for index in positions.iter().rev() {
                documents.remove(*index);
            }
            Ok(WriteAck::acknowledged(positions.len() as u64))
        })?;

        if ack.n() > 0 {
            self.server.record_write();
        }
        log::debug!("remove {}.{} {} {:?}", self.database_name, collection, selector, ack);
        Ok(ack)
    }

    fn command(&self, command: &Document, context: &OperationContext) -> QuarryResult<Document> {
        self.server.round_trip(context)?;
        let reply = run_command(&self.server, &self.database, command);
        log::debug!("command {} {} -> {}", self.database_name, command, reply);
        Ok(reply)
    }
}
