use crate::common::{DocRef, Document, ObjectId, Timestamp};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

/// Compare two floats with NaN sorted after every other number.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// A regular expression as it travels inside a filter document.
///
/// `pattern` is kept uncompiled; the store compiles it when the filter is
/// evaluated. `options` holds single-letter flags (`i`, `m`, `s`, `x`).
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, serde::Deserialize, serde::Serialize)]
pub struct RegexPattern {
    pattern: String,
    options: String,
}

impl RegexPattern {
    pub fn new(pattern: &str, options: &str) -> Self {
        RegexPattern {
            pattern: pattern.to_string(),
            options: options.to_string(),
        }
    }

    /// Parses either a bare pattern or the delimited `/pattern/flags` form.
    pub fn parse(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix('/') {
            if let Some(end) = rest.rfind('/') {
                return RegexPattern::new(&rest[..end], &rest[end + 1..]);
            }
        }
        RegexPattern::new(text, "")
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.options.contains('i')
    }
}

impl Debug for RegexPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.options)
    }
}

impl Display for RegexPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.options)
    }
}

/// A tagged value stored in a [Document].
///
/// Besides the JSON-like variants, a value can be one of the store types
/// the mapper relies on: an [ObjectId] identity, a store-native
/// [Timestamp], a [DocRef] reference, a [RegexPattern] used in filters, or
/// opaque server-side `Code`.
///
/// `DateTime` is the caller-facing form of a timestamp. Records convert it
/// to a `Timestamp` on write and back to a `DateTime` on read.
///
/// Integers and floats compare numerically with each other; values of
/// different kinds order by a fixed type rank, so any two values can be
/// sorted.
#[derive(Clone, Default, serde::Deserialize, serde::Serialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Array(Vec<Value>),
    Document(Document),
    Id(ObjectId),
    Timestamp(Timestamp),
    DateTime(DateTime<Utc>),
    Reference(DocRef),
    Regex(RegexPattern),
    /// Opaque code evaluated by the store (predicates and map-reduce bodies).
    Code(String),
}

impl Value {
    pub fn from<T: Into<Value>>(value: T) -> Value {
        value.into()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::F64(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<ObjectId> {
        match self {
            Value::Id(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&DocRef> {
        match self {
            Value::Reference(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_regex(&self) -> Option<&RegexPattern> {
        match self {
            Value::Regex(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<&str> {
        match self {
            Value::Code(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::I64(_) | Value::F64(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Reference(_))
    }

    /// Whether the value is array- or object-like.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Document(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
            Value::Id(_) => "object id",
            Value::Timestamp(_) => "timestamp",
            Value::DateTime(_) => "date time",
            Value::Reference(_) => "reference",
            Value::Regex(_) => "regex",
            Value::Code(_) => "code",
        }
    }

    pub fn take(&mut self) -> Value {
        std::mem::take(self)
    }

    // relative order of value kinds when sorting mixed values
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::I64(_) | Value::F64(_) => 1,
            Value::String(_) => 2,
            Value::Document(_) => 3,
            Value::Array(_) => 4,
            Value::Reference(_) => 5,
            Value::Id(_) => 6,
            Value::Bool(_) => 7,
            Value::Timestamp(_) | Value::DateTime(_) => 8,
            Value::Regex(_) => 9,
            Value::Code(_) => 10,
        }
    }

    // timestamps and date times share one time line
    fn as_epoch_micros(&self) -> Option<i128> {
        match self {
            Value::Timestamp(ts) => Some(ts.seconds() as i128 * 1_000_000 + ts.micros() as i128),
            Value::DateTime(dt) => Some(dt.timestamp_micros() as i128),
            _ => None,
        }
    }

    fn write_json(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Array(v) => {
                write!(f, "[")?;
                for (i, value) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    value.write_json(f)?;
                }
                write!(f, "]")
            }
            Value::Document(v) => write!(f, "{}", v),
            Value::Id(v) => write!(f, "ObjectId(\"{}\")", v),
            Value::Timestamp(v) => write!(f, "{:?}", v),
            Value::DateTime(v) => write!(f, "{:?}", v.to_rfc3339()),
            Value::Reference(v) => write!(f, "{}", v),
            Value::Regex(v) => write!(f, "{}", v),
            Value::Code(v) => write!(f, "Code({:?})", v),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.write_json(f)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.write_json(f)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        if let (Value::I64(a), Value::I64(b)) = (self, other) {
            return a.cmp(b);
        }

        if self.is_number() && other.is_number() {
            if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
                return num_cmp_float(a, b);
            }
        }

        if let (Some(a), Some(b)) = (self.as_epoch_micros(), other.as_epoch_micros()) {
            return a.cmp(&b);
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Code(a), Value::Code(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.cmp(b),
            (Value::Id(a), Value::Id(b)) => a.cmp(b),
            (Value::Reference(a), Value::Reference(b)) => a.cmp(b),
            (Value::Regex(a), Value::Regex(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            // integral floats hash like the equal integer
            Value::I64(v) => (*v as f64).to_bits().hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::String(v) | Value::Code(v) => v.hash(state),
            Value::Array(v) => v.hash(state),
            Value::Document(v) => v.hash(state),
            Value::Id(v) => v.hash(state),
            Value::Timestamp(_) | Value::DateTime(_) => self.as_epoch_micros().hash(state),
            Value::Reference(v) => v.hash(state),
            Value::Regex(v) => v.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I64(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::I64(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u64> for Value {
    // values past i64::MAX saturate
    fn from(value: u64) -> Self {
        Value::I64(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Value {
    // values past i64::MAX saturate
    fn from(value: usize) -> Self {
        Value::I64(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F64(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::Id(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<DocRef> for Value {
    fn from(value: DocRef) -> Self {
        Value::Reference(value)
    }
}

impl From<RegexPattern> for Value {
    fn from(value: RegexPattern) -> Self {
        Value::Regex(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(|v| v.into()).collect())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

/// Creates a [Value] from any expression convertible into one.
///
/// ```rust
/// use quarry::common::Value;
/// use quarry::val;
///
/// assert_eq!(val!(42), Value::I64(42));
/// assert_eq!(val!("hello"), Value::String("hello".to_string()));
/// ```
#[macro_export]
macro_rules! val {
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
