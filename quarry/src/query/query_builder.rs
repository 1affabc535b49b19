use crate::common::{
    Document, DocRef, ObjectId, RegexPattern, SortOrder, Value, DOC_ID, ID_ALIAS, OP_ALL,
    OP_EXISTS, OP_GT, OP_GTE, OP_IN, OP_LT, OP_LTE, OP_MAX_DISTANCE, OP_MOD, OP_NE, OP_NEAR,
    OP_NIN, OP_NOT, OP_SIZE, OP_SLICE, OP_WHERE,
};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::query::{RecordIter, Selection};
use crate::record::{FieldValue, Model, Record};
use crate::store::FindOptions;

fn field_key(field: &str) -> String {
    if field == ID_ALIAS {
        DOC_ID.to_string()
    } else {
        field.to_string()
    }
}

fn is_operator_map(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

fn normalize_id(value: Value) -> QuarryResult<Value> {
    match value {
        Value::String(text) => ObjectId::parse_str(&text).map(Value::Id),
        Value::Array(items) => Ok(Value::Array(
            items
                .into_iter()
                .map(normalize_id)
                .collect::<QuarryResult<Vec<Value>>>()?,
        )),
        other => Ok(other),
    }
}

/// A chainable, lazily executed query over the collection of a [Model].
///
/// Operator calls only accumulate the filter; nothing reaches the store
/// until [Query::execute], [Query::count], [Query::select] (or one of its
/// shortcuts) or [Query::remove] is called. Calls for the same field
/// compose into one operator map, and repeating an operator on a field
/// replaces its previous argument.
///
/// Invalid arguments, such as malformed identity text, do not fail the
/// chain: the error is kept and returned by the next executing call.
///
/// # Examples
///
/// ```rust
/// use quarry::{doc, Connection, Schema};
///
/// let connection = Connection::builder()
///     .configure("memory://query-doc", "people")
///     .build();
/// let people = connection.model(Schema::builder("Person").build());
/// for (name, age) in [("ann", 12), ("bob", 18), ("cyd", 25)] {
///     people.create(doc! { name: name, age: age }).unwrap().save().unwrap();
/// }
///
/// let mut teens = people.find().gt("age", 10).lt("age", 20).sort("age", false);
/// assert_eq!(teens.filter().get("age"), Some(&quarry::val!(doc! { "$gt": 10, "$lt": 20 })));
/// assert_eq!(teens.count().unwrap(), 2);
///
/// let names: Vec<String> = teens
///     .iter()
///     .unwrap()
///     .map(|mut person| person.get("name").unwrap().as_str().unwrap().to_string())
///     .collect();
/// assert_eq!(names, vec!["bob", "ann"]);
/// ```
#[derive(Clone)]
pub struct Query {
    model: Model,
    filter: Document,
    projection: Document,
    sort: Option<(String, SortOrder)>,
    limit: Option<u64>,
    skip: Option<u64>,
    single: bool,
    count: Option<u64>,
    error: Option<QuarryError>,
}

impl Query {
    pub(crate) fn new(model: Model) -> Self {
        Query {
            model,
            filter: Document::new(),
            projection: Document::new(),
            sort: None,
            limit: None,
            skip: None,
            single: false,
            count: None,
            error: None,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn filter(&self) -> &Document {
        &self.filter
    }

    pub fn projection(&self) -> &Document {
        &self.projection
    }

    pub fn sort_spec(&self) -> Option<&(String, SortOrder)> {
        self.sort.as_ref()
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn skip_value(&self) -> Option<u64> {
        self.skip
    }

    pub fn is_single(&self) -> bool {
        self.single
    }

    /// The count computed by the last execution.
    pub fn cached_count(&self) -> Option<u64> {
        self.count
    }

    /// The first error recorded while composing the query.
    pub fn error(&self) -> Option<&QuarryError> {
        self.error.as_ref()
    }

    fn defer(&mut self, error: QuarryError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    // converts an equality or operator argument into its stored form
    fn target(&mut self, key: &str, value: FieldValue) -> Value {
        let value = match value {
            FieldValue::Value(value) => value,
            FieldValue::Container(container) => container.into_value(),
            FieldValue::Record(record) => match record.stored_id() {
                Some(id) => Value::Reference(DocRef::new(record.collection_name(), id)),
                None => {
                    log::error!("Cannot query {} by a record without identity", key);
                    self.defer(QuarryError::new(
                        &format!("Cannot query {} by {}: it has no identity", key, record),
                        ErrorKind::InvalidOperation,
                    ));
                    Value::Null
                }
            },
        };

        if key != DOC_ID {
            return value;
        }
        match normalize_id(value) {
            Ok(value) => value,
            Err(err) => {
                self.defer(err);
                Value::Null
            }
        }
    }

    fn operator(mut self, field: &str, operator: &str, value: Value) -> Self {
        let key = field_key(field);
        match self.filter.get_mut(&key) {
            Some(Value::Document(operators)) if is_operator_map(operators) => {
                operators.put(operator, value);
            }
            _ => {
                let mut operators = Document::new();
                operators.put(operator, value);
                self.filter.put(&key, operators);
            }
        }
        self.count = None;
        self
    }

    fn operator_with<T: Into<FieldValue>>(mut self, field: &str, operator: &str, value: T) -> Self {
        let key = field_key(field);
        let value = self.target(&key, value.into());
        self.operator(&key, operator, value)
    }

    fn operator_with_all<I>(mut self, field: &str, operator: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldValue>,
    {
        let key = field_key(field);
        let values: Vec<Value> = values
            .into_iter()
            .map(|value| self.target(&key, value.into()))
            .collect();
        self.operator(&key, operator, Value::Array(values))
    }

    /// Equality. A record argument matches the reference to that record.
    pub fn is<T: Into<FieldValue>>(mut self, field: &str, value: T) -> Self {
        let key = field_key(field);
        let value = self.target(&key, value.into());
        self.filter.put(&key, value);
        self.count = None;
        self
    }

    /// Negation: a regex, an operator map or a literal the field must not
    /// match.
    pub fn not<T: Into<FieldValue>>(self, field: &str, value: T) -> Self {
        self.operator_with(field, OP_NOT, value)
    }

    pub fn not_equal<T: Into<FieldValue>>(self, field: &str, value: T) -> Self {
        self.operator_with(field, OP_NE, value)
    }

    pub fn in_values<I>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldValue>,
    {
        self.operator_with_all(field, OP_IN, values)
    }

    pub fn not_in<I>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldValue>,
    {
        self.operator_with_all(field, OP_NIN, values)
    }

    pub fn gt<T: Into<FieldValue>>(self, field: &str, value: T) -> Self {
        self.operator_with(field, OP_GT, value)
    }

    pub fn gte<T: Into<FieldValue>>(self, field: &str, value: T) -> Self {
        self.operator_with(field, OP_GTE, value)
    }

    pub fn lt<T: Into<FieldValue>>(self, field: &str, value: T) -> Self {
        self.operator_with(field, OP_LT, value)
    }

    pub fn lte<T: Into<FieldValue>>(self, field: &str, value: T) -> Self {
        self.operator_with(field, OP_LTE, value)
    }

    /// Exclusive range: `gt(start)` and `lt(end)`.
    pub fn range<S, E>(self, field: &str, start: S, end: E) -> Self
    where
        S: Into<FieldValue>,
        E: Into<FieldValue>,
    {
        self.gt(field, start).lt(field, end)
    }

    /// Matches a regular expression given bare or as `/pattern/flags`.
    pub fn regex(mut self, field: &str, pattern: &str) -> Self {
        self.filter
            .put(&field_key(field), Value::Regex(RegexPattern::parse(pattern)));
        self.count = None;
        self
    }

    /// Case-insensitive substring match. The substring is matched
    /// literally.
    pub fn like(mut self, field: &str, substring: &str) -> Self {
        let pattern = RegexPattern::new(&regex::escape(substring), "i");
        self.filter.put(&field_key(field), Value::Regex(pattern));
        self.count = None;
        self
    }

    pub fn size(self, field: &str, size: usize) -> Self {
        self.operator(field, OP_SIZE, Value::from(size))
    }

    pub fn exists(self, field: &str, exists: bool) -> Self {
        self.operator(field, OP_EXISTS, Value::Bool(exists))
    }

    pub fn all<I>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldValue>,
    {
        self.operator_with_all(field, OP_ALL, values)
    }

    pub fn modulo(self, field: &str, divisor: i64, remainder: i64) -> Self {
        self.operator(
            field,
            OP_MOD,
            Value::Array(vec![Value::I64(divisor), Value::I64(remainder)]),
        )
    }

    /// Proximity to a point, nearest first, optionally bounded.
    pub fn near(self, field: &str, lat: f64, lng: f64, max_distance: Option<f64>) -> Self {
        let query = self.operator(
            field,
            OP_NEAR,
            Value::Array(vec![Value::F64(lat), Value::F64(lng)]),
        );
        match max_distance {
            Some(max_distance) => query.operator(field, OP_MAX_DISTANCE, Value::F64(max_distance)),
            None => query,
        }
    }

    /// A boolean predicate evaluated by the store.
    pub fn jsfunc(mut self, expression: &str) -> Self {
        self.filter
            .put(OP_WHERE, Value::Code(expression.to_string()));
        self.count = None;
        self
    }

    /// Equality with a reference to `id` in `collection`.
    pub fn reference<T: Into<Value>>(mut self, field: &str, collection: &str, id: T) -> Self {
        match normalize_id(id.into()) {
            Ok(Value::Id(id)) => self.is(field, DocRef::new(collection, id)),
            Ok(other) => {
                log::error!("Cannot build a reference to {} from {}", collection, other);
                self.defer(QuarryError::new(
                    &format!("Cannot build a reference to {} from {}", collection, other),
                    ErrorKind::InvalidId,
                ));
                self
            }
            Err(err) => {
                self.defer(err);
                self
            }
        }
    }

    /// Leaves `field` out of the results.
    pub fn exclude(mut self, field: &str) -> Self {
        self.projection.put(&field_key(field), 0);
        self
    }

    /// Keeps part of an array field: `n` first elements, `-n` last
    /// elements or `[skip, take]`.
    pub fn slice<T: Into<Value>>(mut self, field: &str, spec: T) -> Self {
        let mut slice = Document::new();
        slice.put(OP_SLICE, spec);
        self.projection.put(&field_key(field), slice);
        self
    }

    /// Orders the results by one field, replacing any previous order.
    pub fn sort(mut self, field: &str, ascending: bool) -> Self {
        self.sort = Some((field_key(field), SortOrder::from_ascending(ascending)));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self.count = None;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self.count = None;
        self
    }

    /// Makes [Query::select] return at most one record.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    fn find_options(&self) -> FindOptions {
        let mut options = FindOptions::new().projection(self.projection.clone());
        if let Some((field, order)) = &self.sort {
            options = options.sort_by(field, *order);
        }
        if let Some(skip) = self.skip {
            options = options.skip(skip);
        }
        let limit = if self.single { Some(1) } else { self.limit };
        if let Some(limit) = limit {
            options = options.limit(limit);
        }
        options
    }

    fn check_error(&self) -> QuarryResult<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Counts the matching documents and caches the count. Skip and limit
    /// are honored only when one of them is set.
    pub fn execute(&mut self) -> QuarryResult<&mut Self> {
        self.check_error()?;
        let handle = self.model.collection()?;
        // unset skip and limit leave the count unbounded
        let count = handle.count(&self.filter, self.skip, self.limit)?;
        log::debug!(
            "Query on {} {} counted {}",
            self.model.collection_name(),
            self.filter,
            count
        );
        self.count = Some(count);
        Ok(self)
    }

    pub fn count(&mut self) -> QuarryResult<u64> {
        let query = self.execute()?;
        Ok(query.count.unwrap_or(0))
    }

    /// Runs the query and materializes the results as saved records.
    pub fn select(&mut self) -> QuarryResult<Selection> {
        self.execute()?;
        let handle = self.model.collection()?;
        let documents = handle.find(&self.filter, &self.find_options())?;

        let records: Vec<Record> = documents
            .into_iter()
            .map(|document| self.model.from_stored(document))
            .collect();
        if self.single {
            Ok(Selection::Single(records.into_iter().next()))
        } else {
            Ok(Selection::Many(records))
        }
    }

    pub fn fetch(&mut self) -> QuarryResult<Vec<Record>> {
        Ok(self.select()?.into_vec())
    }

    pub fn fetch_one(&mut self) -> QuarryResult<Option<Record>> {
        let single = self.single;
        self.single = true;
        let selection = self.select();
        self.single = single;
        Ok(selection?.into_single())
    }

    /// Runs the query again and iterates over the results.
    pub fn iter(&mut self) -> QuarryResult<RecordIter> {
        Ok(self.select()?.into_iter())
    }

    /// Deletes the matching documents without loading them. Lifecycle
    /// hooks do not run. Returns the number of removed documents.
    pub fn remove(&mut self, just_one: bool) -> QuarryResult<u64> {
        self.check_error()?;
        let handle = self.model.collection()?;
        let ack = handle.remove(&self.filter, just_one)?;
        if !ack.is_acknowledged() {
            let reason = ack.error().unwrap_or("write not acknowledged");
            log::error!("Could not remove from {}: {}", self.model.collection_name(), reason);
            return Err(QuarryError::new(
                &format!(
                    "Could not remove from {}: {}",
                    self.model.collection_name(),
                    reason
                ),
                ErrorKind::PersistenceError,
            ));
        }
        self.count = None;
        Ok(ack.n())
    }
}
