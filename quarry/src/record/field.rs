use crate::common::{Document, DocRef, ObjectId, RegexPattern, Timestamp, Value};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::record::Record;
use chrono::{DateTime, Utc};

/// A uniform wrapper around an array or an embedded document stored in a
/// record field.
///
/// Containers are unwrapped back into plain values when the record is
/// written.
#[derive(Clone, Debug, PartialEq)]
pub struct Container {
    value: Value,
}

impl Container {
    pub fn new(value: Value) -> Self {
        Container { value }
    }

    pub fn is_array(&self) -> bool {
        self.value.is_array()
    }

    pub fn is_document(&self) -> bool {
        self.value.is_document()
    }

    /// Keyed access. Arrays accept the decimal index as key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match &self.value {
            Value::Document(document) => document.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Indexed access into an array container.
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.value.as_array().and_then(|items| items.get(index))
    }

    /// Sets a key of a document container.
    pub fn set<T: Into<Value>>(&mut self, key: &str, value: T) -> QuarryResult<()> {
        match self.value.as_document_mut() {
            Some(document) => {
                document.put(key, value);
                Ok(())
            }
            None => Err(not_a(self.value.type_name(), "document")),
        }
    }

    /// Appends to an array container.
    pub fn push<T: Into<Value>>(&mut self, value: T) -> QuarryResult<()> {
        match self.value.as_array_mut() {
            Some(items) => {
                items.push(value.into());
                Ok(())
            }
            None => Err(not_a(self.value.type_name(), "array")),
        }
    }

    pub fn len(&self) -> usize {
        match &self.value {
            Value::Document(document) => document.len(),
            Value::Array(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

fn not_a(actual: &str, expected: &str) -> QuarryError {
    log::error!("Container holds {} but {} access was requested", actual, expected);
    QuarryError::new(
        &format!("Container holds {}, not {}", actual, expected),
        ErrorKind::InvalidDataType,
    )
}

/// The content of one record field.
#[derive(Clone, Debug)]
pub enum FieldValue {
    /// A plain value.
    Value(Value),
    /// An array or embedded document.
    Container(Container),
    /// An embedded record, either assigned or produced by resolving a
    /// reference.
    Record(Box<Record>),
}

impl FieldValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::Value(value) => Some(value),
            FieldValue::Container(container) => Some(container.value()),
            FieldValue::Record(_) => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            FieldValue::Container(container) => Some(container),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            FieldValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            FieldValue::Record(record) => Some(*record),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Value(Value::Null))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.as_value().and_then(Value::as_datetime)
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Value(Value::Null)
    }
}

impl PartialEq<Value> for FieldValue {
    fn eq(&self, other: &Value) -> bool {
        self.as_value() == Some(other)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<Container> for FieldValue {
    fn from(container: Container) -> Self {
        FieldValue::Container(container)
    }
}

impl From<Record> for FieldValue {
    fn from(record: Record) -> Self {
        FieldValue::Record(Box::new(record))
    }
}

impl From<&Record> for FieldValue {
    fn from(record: &Record) -> Self {
        FieldValue::Record(Box::new(record.clone()))
    }
}

impl<T: Into<Value>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::Value(Value::from(items))
    }
}

macro_rules! field_value_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Value(Value::from(value))
                }
            }
        )*
    };
}

field_value_from!(
    bool,
    i32,
    u32,
    i64,
    u64,
    usize,
    f32,
    f64,
    String,
    &str,
    Document,
    ObjectId,
    Timestamp,
    DateTime<Utc>,
    DocRef,
    RegexPattern,
);
