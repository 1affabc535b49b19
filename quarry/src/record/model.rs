use crate::aggregation::MapReduce;
use crate::common::{Document, Value, DOC_ID};
use crate::connection::{CollectionHandle, Connection};
use crate::errors::QuarryResult;
use crate::query::Query;
use crate::record::{Record, Schema};
use std::sync::Arc;

/// A [Schema] bound to a [Connection]: the home of record factories and
/// of the query and map-reduce builders of one collection.
///
/// Obtain a model with [Connection::model]. Models are cheap to clone.
#[derive(Clone)]
pub struct Model {
    connection: Connection,
    schema: Arc<Schema>,
}

impl Model {
    pub(crate) fn new(connection: Connection, schema: Arc<Schema>) -> Self {
        Model { connection, schema }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn collection_name(&self) -> &str {
        self.schema.collection()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn collection(&self) -> QuarryResult<CollectionHandle> {
        self.connection.collection(self.collection_name())
    }

    /// An empty new record, dirty until its first save.
    pub fn new_record(&self) -> Record {
        Record::new(self.connection.clone(), self.schema.clone())
    }

    /// A new record with every field of `fields` written through
    /// [Record::set].
    pub fn create(&self, fields: Document) -> QuarryResult<Record> {
        let mut record = self.new_record();
        for (field, value) in fields {
            record.set(&field, value)?;
        }
        Ok(record)
    }

    /// A saved record wrapping a document read from the store.
    pub fn from_stored(&self, document: Document) -> Record {
        Record::from_stored(self.connection.clone(), self.schema.clone(), document)
    }

    pub fn find(&self) -> Query {
        Query::new(self.clone())
    }

    /// A query that selects at most one record.
    pub fn find_one(&self) -> Query {
        Query::new(self.clone()).single()
    }

    pub fn find_by_id<T: Into<Value>>(&self, id: T) -> Query {
        self.find_one().is(DOC_ID, id.into())
    }

    pub fn find_by_ids<T: Into<Value>>(&self, ids: Vec<T>) -> Query {
        self.find()
            .in_values(DOC_ID, ids.into_iter().map(Into::into).collect::<Vec<Value>>())
    }

    /// Same as [Model::find].
    pub fn query(&self) -> Query {
        self.find()
    }

    pub fn map_reduce(&self) -> MapReduce {
        MapReduce::new(self.clone())
    }
}
