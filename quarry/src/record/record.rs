use crate::common::{
    Document, DocRef, ObjectId, Timestamp, Value, CREATED_AT, DOC_ID, ID_ALIAS, TIMESTAMP_FIELDS,
    UPDATED_AT,
};
use crate::connection::Connection;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::record::{Container, FieldValue, LifecycleEvent, Schema};
use crate::store::WriteAck;
use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// One document of a collection, held in memory.
///
/// A record tracks two flags. It is *new* until its first successful
/// create, and *dirty* while it carries changes that were not written yet.
/// Records built with [crate::Model::new_record] or [crate::Model::create]
/// start new and dirty, even when empty; records loaded from the store start
/// saved.
///
/// Reading a field that holds a reference loads the referenced document
/// with one extra round trip and keeps the loaded record in place of the
/// reference. Saving a record first saves the records embedded in its
/// fields and stores references to them instead.
///
/// # Examples
///
/// ```rust
/// use quarry::{doc, Connection, Schema};
///
/// let connection = Connection::builder()
///     .configure("memory://record-doc", "blog")
///     .build();
/// let posts = connection.model(Schema::builder("Post").build());
///
/// let mut post = posts.create(doc! { title: "Hello" }).unwrap();
/// assert!(post.is_new_record());
/// assert!(!post.is_saved());
///
/// post.save().unwrap();
/// assert!(!post.is_new_record());
/// assert!(post.is_saved());
///
/// post.set("title", "Hello, world").unwrap();
/// assert!(!post.is_saved());
/// ```
#[derive(Clone)]
pub struct Record {
    connection: Connection,
    schema: Arc<Schema>,
    fields: IndexMap<String, FieldValue>,
    dirty: bool,
    new: bool,
}

fn canonical(field: &str) -> &str {
    if field == ID_ALIAS {
        DOC_ID
    } else {
        field
    }
}

fn is_identity(field: &str) -> bool {
    field == DOC_ID || field == ID_ALIAS
}

fn to_object_id(value: &FieldValue) -> QuarryResult<ObjectId> {
    match value {
        FieldValue::Value(Value::Id(id)) => Ok(*id),
        FieldValue::Value(Value::String(text)) => ObjectId::parse_str(text),
        other => {
            log::error!("Cannot use {:?} as a record identity", other);
            Err(QuarryError::new(
                &format!("Cannot use {:?} as a record identity", other),
                ErrorKind::InvalidId,
            ))
        }
    }
}

fn to_timestamp(field: &str, value: &FieldValue) -> QuarryResult<Timestamp> {
    let timestamp = match value {
        FieldValue::Value(Value::Timestamp(timestamp)) => *timestamp,
        FieldValue::Value(Value::DateTime(date_time)) => Timestamp::from_datetime(date_time),
        FieldValue::Value(Value::I64(seconds)) => Timestamp::from_seconds(*seconds),
        other => {
            log::error!("Cannot store {:?} in timestamp field {}", other, field);
            return Err(QuarryError::new(
                &format!("Field {} expects a date/time or timestamp, found {:?}", field, other),
                ErrorKind::InvalidDataType,
            ));
        }
    };

    if !timestamp.is_representable() {
        log::error!("Timestamp {:?} for field {} is out of range", timestamp, field);
        return Err(QuarryError::new(
            &format!("Field {} cannot hold {:?}: out of the date/time range", field, timestamp),
            ErrorKind::InvalidDataType,
        ));
    }
    Ok(timestamp)
}

// stored timestamps read as date/time values, recursively
fn plain(value: &Value) -> Value {
    match value {
        Value::Timestamp(timestamp) => Value::DateTime(timestamp.to_datetime()),
        Value::Array(items) => Value::Array(items.iter().map(plain).collect()),
        Value::Document(document) => Value::Document(
            document
                .iter()
                .map(|(key, value)| (key.clone(), plain(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

impl Record {
    pub(crate) fn new(connection: Connection, schema: Arc<Schema>) -> Self {
        Record {
            connection,
            schema,
            fields: IndexMap::new(),
            dirty: true,
            new: true,
        }
    }

    /// Wraps a document read from the store. The record is neither new nor
    /// dirty.
    pub(crate) fn from_stored(
        connection: Connection,
        schema: Arc<Schema>,
        document: Document,
    ) -> Self {
        let fields = document
            .into_iter()
            .map(|(key, value)| {
                let slot = if value.is_array() || value.is_document() {
                    FieldValue::Container(Container::new(value))
                } else {
                    FieldValue::Value(value)
                };
                (key, slot)
            })
            .collect();

        Record {
            connection,
            schema,
            fields,
            dirty: false,
            new: false,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn collection_name(&self) -> &str {
        self.schema.collection()
    }

    pub fn is_new_record(&self) -> bool {
        self.new
    }

    /// Whether the record carries no unwritten changes.
    pub fn is_saved(&self) -> bool {
        !self.dirty
    }

    /// Reads a field.
    ///
    /// `id` reads as the hex text of the identity and `_id` as the
    /// identity itself; both generate an identity when there is none yet.
    /// Timestamps read as UTC date/time values, references are resolved,
    /// and absent fields read as `Value::Null`. A getter override of the
    /// schema sees the value last.
    pub fn get(&mut self, field: &str) -> QuarryResult<FieldValue> {
        let value = self.read_field(field)?;
        let schema = self.schema.clone();
        match schema.getter(field) {
            Some(getter) => getter(value),
            None => Ok(value),
        }
    }

    /// Writes a field and marks the record dirty.
    ///
    /// A setter override of the schema sees the value first. Identity
    /// fields accept an object id or its hex text and cannot change once
    /// assigned. `created_at` and `updated_at` accept date/time values,
    /// timestamps and integer seconds. Other date/time values are stored as
    /// timestamps and arrays and documents are wrapped in a [Container].
    pub fn set<T: Into<FieldValue>>(&mut self, field: &str, value: T) -> QuarryResult<()> {
        let mut value = value.into();
        let schema = self.schema.clone();
        if let Some(setter) = schema.setter(field) {
            value = setter(value)?;
        }

        if is_identity(field) {
            let id = to_object_id(&value)?;
            if let Some(existing) = self.stored_id() {
                if existing != id {
                    log::error!("Cannot change identity of {} to {}", self, id);
                    return Err(QuarryError::new(
                        &format!("Cannot change identity of {} to {}", self, id),
                        ErrorKind::InvalidId,
                    ));
                }
            }
            self.fields
                .insert(DOC_ID.to_string(), FieldValue::Value(Value::Id(id)));
            self.dirty = true;
            return Ok(());
        }

        let slot = if TIMESTAMP_FIELDS.contains(&field) {
            FieldValue::Value(Value::Timestamp(to_timestamp(field, &value)?))
        } else {
            match value {
                FieldValue::Value(Value::DateTime(date_time)) => {
                    FieldValue::Value(Value::Timestamp(Timestamp::from_datetime(&date_time)))
                }
                FieldValue::Value(value) if value.is_array() || value.is_document() => {
                    FieldValue::Container(Container::new(value))
                }
                other => other,
            }
        };

        self.fields.insert(field.to_string(), slot);
        self.dirty = true;
        Ok(())
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(canonical(field))
    }

    /// Removes a field and marks the record dirty. Returns whether the
    /// field was present. The identity cannot be removed.
    pub fn unset(&mut self, field: &str) -> QuarryResult<bool> {
        if is_identity(field) {
            log::error!("Cannot remove the identity of {}", self);
            return Err(QuarryError::new(
                &format!("Cannot remove the identity of {}", self),
                ErrorKind::InvalidOperation,
            ));
        }
        self.dirty = true;
        Ok(self.fields.shift_remove(field).is_some())
    }

    pub fn fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// The identity, generated on first use. Generating one marks the
    /// record dirty.
    pub fn id(&mut self) -> ObjectId {
        match self.stored_id() {
            Some(id) => id,
            None => {
                let id = ObjectId::new();
                self.fields
                    .insert(DOC_ID.to_string(), FieldValue::Value(Value::Id(id)));
                self.dirty = true;
                id
            }
        }
    }

    /// The identity if one was assigned or generated already.
    pub fn stored_id(&self) -> Option<ObjectId> {
        match self.fields.get(DOC_ID) {
            Some(FieldValue::Value(Value::Id(id))) => Some(*id),
            _ => None,
        }
    }

    /// A reference to this record.
    pub fn reference(&mut self) -> DocRef {
        let id = self.id();
        DocRef::new(self.collection_name(), id)
    }

    /// Writes pending changes.
    ///
    /// Does nothing when the record is saved. Otherwise embedded records
    /// are saved and replaced by references, and the record is created or
    /// updated depending on whether it is new.
    pub fn save(&mut self) -> QuarryResult<()> {
        if !self.dirty {
            log::debug!("{} has no pending changes", self);
            return Ok(());
        }

        let schema = self.schema.clone();
        schema.run_hooks(LifecycleEvent::BeforeSave, self)?;
        self.save_embedded()?;
        if self.new {
            self.create()?;
        } else {
            self.update()?;
        }
        schema.run_hooks(LifecycleEvent::AfterSave, self)
    }

    /// Removes the stored document.
    ///
    /// On success the record is reset to an empty new record. The
    /// `after_delete` hooks run whether or not a document was removed.
    pub fn delete(&mut self) -> QuarryResult<bool> {
        let schema = self.schema.clone();
        schema.run_hooks(LifecycleEvent::BeforeDelete, self)?;

        let deleted = match self.stored_id() {
            Some(id) => {
                let mut selector = Document::new();
                selector.put(DOC_ID, id);
                let ack = self
                    .connection
                    .collection(self.collection_name())?
                    .remove(&selector, true)?;
                ack.is_acknowledged() && ack.n() > 0
            }
            None => false,
        };

        if deleted {
            log::debug!("Deleted {}", self);
            self.fields.clear();
            self.new = true;
            self.dirty = false;
        }

        schema.run_hooks(LifecycleEvent::AfterDelete, self)?;
        Ok(deleted)
    }

    /// The record as a plain document.
    ///
    /// The identity appears as `id` hex text and timestamps as date/time
    /// values. References are loaded and expanded one level deep when
    /// `resolve_references` is set and left as their text encoding
    /// otherwise. Getter overrides are not applied.
    pub fn to_array(&mut self, resolve_references: bool) -> QuarryResult<Document> {
        let mut result = Document::new();
        for key in self.fields() {
            if key == DOC_ID {
                if let Some(id) = self.stored_id() {
                    result.put(ID_ALIAS, id.to_hex());
                }
                continue;
            }

            let is_reference = matches!(
                self.fields.get(&key),
                Some(FieldValue::Value(Value::Reference(_)))
            );
            if is_reference && resolve_references {
                self.read_field(&key)?;
            }

            let value = match self.fields.get_mut(&key) {
                Some(FieldValue::Value(Value::Reference(reference))) => {
                    Value::String(reference.to_string())
                }
                Some(FieldValue::Value(value)) => plain(value),
                Some(FieldValue::Container(container)) => plain(container.value()),
                Some(FieldValue::Record(record)) => Value::Document(record.to_array(false)?),
                None => continue,
            };
            result.put(&key, value);
        }
        Ok(result)
    }

    fn read_field(&mut self, field: &str) -> QuarryResult<FieldValue> {
        if is_identity(field) {
            let id = self.id();
            return Ok(if field == ID_ALIAS {
                FieldValue::from(id.to_hex())
            } else {
                FieldValue::from(id)
            });
        }

        let reference = match self.fields.get(field) {
            None => return Ok(FieldValue::default()),
            Some(FieldValue::Value(Value::Reference(reference))) => reference.clone(),
            Some(FieldValue::Value(Value::Timestamp(timestamp))) => {
                return Ok(FieldValue::from(timestamp.to_datetime()));
            }
            Some(other) => return Ok(other.clone()),
        };

        let resolved = self.resolve(&reference)?;
        self.fields.insert(
            field.to_string(),
            FieldValue::Record(Box::new(resolved.clone())),
        );
        Ok(FieldValue::Record(Box::new(resolved)))
    }

    fn resolve(&self, reference: &DocRef) -> QuarryResult<Record> {
        let mut filter = Document::new();
        filter.put(DOC_ID, reference.id());

        let handle = self.connection.collection(reference.collection())?;
        match handle.find_one(&filter)? {
            Some(document) => {
                let schema = self.connection.schema_for(reference.collection());
                Ok(Record::from_stored(self.connection.clone(), schema, document))
            }
            None => {
                log::error!("Reference {} of {} points at no document", reference, self);
                Err(QuarryError::new(
                    &format!("Could not resolve {}: no such document", reference),
                    ErrorKind::ReferenceResolutionError,
                ))
            }
        }
    }

    // the first field holding a record that has not been written
    fn unsaved_embedded(&self) -> Option<&str> {
        self.fields.iter().find_map(|(key, value)| match value {
            FieldValue::Record(record) if record.new || record.dirty => Some(key.as_str()),
            _ => None,
        })
    }

    fn save_embedded(&mut self) -> QuarryResult<()> {
        let embedded: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, value)| matches!(value, FieldValue::Record(_)))
            .map(|(key, _)| key.clone())
            .collect();

        for field in embedded {
            let reference = match self.fields.get_mut(&field) {
                Some(FieldValue::Record(record)) => {
                    if let Some(nested) = record.unsaved_embedded() {
                        let message = format!(
                            "Cannot save {}: field {} of embedded {} holds an unsaved record in {}",
                            self.schema.name(),
                            field,
                            record,
                            nested
                        );
                        log::error!("{}", message);
                        return Err(QuarryError::new(&message, ErrorKind::InvalidOperation));
                    }
                    // a new record is created even without pending changes
                    if record.new {
                        record.dirty = true;
                    }
                    record.save()?;
                    record.reference()
                }
                _ => continue,
            };
            self.fields
                .insert(field, FieldValue::Value(Value::Reference(reference)));
        }
        Ok(())
    }

    fn create(&mut self) -> QuarryResult<()> {
        let schema = self.schema.clone();
        schema.run_hooks(LifecycleEvent::BeforeCreate, self)?;

        let now = Timestamp::now();
        self.fields
            .insert(CREATED_AT.to_string(), FieldValue::Value(Value::Timestamp(now)));
        self.fields
            .insert(UPDATED_AT.to_string(), FieldValue::Value(Value::Timestamp(now)));
        self.id();

        let document = self.to_document()?;
        let ack = self
            .connection
            .collection(self.collection_name())?
            .insert(&document)?;
        self.check_acknowledged("create", &ack)?;

        log::debug!("Created {}", self);
        self.new = false;
        self.dirty = false;
        schema.run_hooks(LifecycleEvent::AfterCreate, self)
    }

    fn update(&mut self) -> QuarryResult<()> {
        let schema = self.schema.clone();
        schema.run_hooks(LifecycleEvent::BeforeUpdate, self)?;

        self.fields.insert(
            UPDATED_AT.to_string(),
            FieldValue::Value(Value::Timestamp(Timestamp::now())),
        );
        let mut selector = Document::new();
        selector.put(DOC_ID, self.id());

        let document = self.to_document()?;
        let ack = self
            .connection
            .collection(self.collection_name())?
            .update(&selector, &document)?;
        self.check_acknowledged("update", &ack)?;

        log::debug!("Updated {}", self);
        self.dirty = false;
        schema.run_hooks(LifecycleEvent::AfterUpdate, self)
    }

    fn check_acknowledged(&self, operation: &str, ack: &WriteAck) -> QuarryResult<()> {
        if ack.is_acknowledged() {
            return Ok(());
        }
        let reason = ack.error().unwrap_or("write not acknowledged");
        log::error!("Could not {} {}: {}", operation, self, reason);
        Err(QuarryError::new(
            &format!("Could not {} {}: {}", operation, self, reason),
            ErrorKind::PersistenceError,
        ))
    }

    // the stored form: containers unwrapped, embedded records as references
    fn to_document(&self) -> QuarryResult<Document> {
        let mut document = Document::new();
        for (key, value) in self.fields.iter() {
            let stored = match value {
                FieldValue::Value(value) => value.clone(),
                FieldValue::Container(container) => container.value().clone(),
                FieldValue::Record(record) => match record.stored_id() {
                    Some(id) => Value::Reference(DocRef::new(record.collection_name(), id)),
                    None => {
                        log::error!("Embedded record in {} of {} has no identity", key, self);
                        return Err(QuarryError::new(
                            &format!("Embedded record in field {} has no identity", key),
                            ErrorKind::InvalidOperation,
                        ));
                    }
                },
            };
            document.put(key, stored);
        }
        Ok(document)
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let id = self.stored_id().map(|id| id.to_hex()).unwrap_or_default();
        write!(f, "DBRef(\"{}\", \"{}\")", self.collection_name(), id)
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record({}, fields: [{}], new: {}, dirty: {})",
            self,
            self.fields.keys().join(", "),
            self.new,
            self.dirty
        )
    }
}
