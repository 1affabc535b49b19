use crate::common::{
    Document, RegexPattern, Value, OP_ALL, OP_EXISTS, OP_GT, OP_GTE, OP_IN, OP_LT, OP_LTE,
    OP_MAX_DISTANCE, OP_MOD, OP_NE, OP_NEAR, OP_NIN, OP_NOT, OP_SIZE, OP_WHERE,
};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::store::memory::FunctionRegistry;
use lru::LruCache;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use std::mem::discriminant;
use std::num::NonZeroUsize;

const REGEX_CACHE_SIZE: usize = 128;

/// Evaluates filter documents against stored documents.
///
/// A filter maps field paths to either a literal, which must equal the
/// field (or one element of an array field), or an operator map such as
/// `{"$gt": 10, "$lt": 20}` whose operators must all hold. The top-level
/// `$where` key names a predicate from the [FunctionRegistry].
///
/// Compiled regular expressions are kept in a small LRU cache.
pub struct FilterMatcher {
    functions: FunctionRegistry,
    regex_cache: Mutex<LruCache<RegexPattern, Regex>>,
}

fn invalid_query(message: &str) -> QuarryError {
    log::error!("{}", message);
    QuarryError::new(message, ErrorKind::InvalidQuery)
}

fn is_operator_map(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

fn expect_array<'a>(operator: &str, argument: &'a Value) -> QuarryResult<&'a Vec<Value>> {
    argument
        .as_array()
        .ok_or_else(|| invalid_query(&format!("{} expects an array, found {}", operator, argument)))
}

fn expect_i64(operator: &str, argument: &Value) -> QuarryResult<i64> {
    argument
        .as_i64()
        .ok_or_else(|| invalid_query(&format!("{} expects an integer, found {}", operator, argument)))
}

fn is_time(value: &Value) -> bool {
    matches!(value, Value::Timestamp(_) | Value::DateTime(_))
}

// range operators only compare values of the same kind
fn comparable(a: &Value, b: &Value) -> bool {
    (a.is_number() && b.is_number())
        || (is_time(a) && is_time(b))
        || discriminant(a) == discriminant(b)
}

/// Reads a `[x, y]` coordinate pair.
pub(crate) fn as_point(value: &Value) -> Option<(f64, f64)> {
    let items = value.as_array()?;
    if items.len() != 2 {
        return None;
    }
    Some((items[0].as_f64()?, items[1].as_f64()?))
}

pub(crate) fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

impl FilterMatcher {
    pub fn new(functions: FunctionRegistry) -> Self {
        let capacity = NonZeroUsize::new(REGEX_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        FilterMatcher {
            functions,
            regex_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Whether `document` satisfies every clause of `filter`.
    ///
    /// An empty filter matches every document. Malformed clauses fail with
    /// [ErrorKind::InvalidQuery].
    pub fn matches(&self, document: &Document, filter: &Document) -> QuarryResult<bool> {
        for (field, condition) in filter.iter() {
            let matched = if field == OP_WHERE {
                self.matches_predicate(document, condition)?
            } else {
                self.matches_field(document.get_path(field), condition)?
            };

            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Compiles a pattern through the cache.
    pub fn compile(&self, pattern: &RegexPattern) -> QuarryResult<Regex> {
        let mut cache = self.regex_cache.lock();
        if let Some(regex) = cache.get(pattern) {
            return Ok(regex.clone());
        }

        let options = pattern.options();
        let regex = RegexBuilder::new(pattern.pattern())
            .case_insensitive(options.contains('i'))
            .multi_line(options.contains('m'))
            .dot_matches_new_line(options.contains('s'))
            .ignore_whitespace(options.contains('x'))
            .build()
            .map_err(|err| {
                log::error!("Invalid regex pattern {}: {}", pattern, err);
                QuarryError::from(err)
            })?;
        cache.put(pattern.clone(), regex.clone());
        Ok(regex)
    }

    fn matches_predicate(&self, document: &Document, condition: &Value) -> QuarryResult<bool> {
        let code = match condition {
            Value::Code(code) | Value::String(code) => code,
            other => {
                return Err(invalid_query(&format!(
                    "{} expects code, found {}",
                    OP_WHERE, other
                )))
            }
        };

        match self.functions.predicate(code) {
            Some(predicate) => Ok(predicate(document)),
            None => Err(invalid_query(&format!("Unknown {} predicate {:?}", OP_WHERE, code))),
        }
    }

    fn matches_field(&self, field: Option<&Value>, condition: &Value) -> QuarryResult<bool> {
        match condition {
            Value::Document(operators) if is_operator_map(operators) => {
                self.matches_operators(field, operators)
            }
            _ => self.matches_literal(field, condition),
        }
    }

    fn matches_literal(&self, field: Option<&Value>, expected: &Value) -> QuarryResult<bool> {
        match expected {
            Value::Regex(pattern) => self.matches_regex(field, pattern),
            Value::Null => Ok(field.map_or(true, |value| value.is_null())),
            _ => Ok(match field {
                None => false,
                Some(Value::Array(items)) if !expected.is_array() => {
                    items.iter().any(|item| item == expected)
                }
                Some(value) => value == expected,
            }),
        }
    }

    fn matches_regex(&self, field: Option<&Value>, pattern: &RegexPattern) -> QuarryResult<bool> {
        let regex = self.compile(pattern)?;
        Ok(match field {
            Some(Value::String(text)) => regex.is_match(text),
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| item.as_str().is_some_and(|text| regex.is_match(text))),
            _ => false,
        })
    }

    fn matches_ordering(
        &self,
        field: Option<&Value>,
        bound: &Value,
        accept: impl Fn(Ordering) -> bool,
    ) -> bool {
        let check = |value: &Value| comparable(value, bound) && accept(value.cmp(bound));
        match field {
            None => false,
            Some(Value::Array(items)) if !bound.is_array() => items.iter().any(check),
            Some(value) => check(value),
        }
    }

    fn matches_any(&self, field: Option<&Value>, candidates: &[Value]) -> QuarryResult<bool> {
        for candidate in candidates {
            if self.matches_literal(field, candidate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_operators(&self, field: Option<&Value>, operators: &Document) -> QuarryResult<bool> {
        for (operator, argument) in operators.iter() {
            let matched = match operator.as_str() {
                OP_GT => self.matches_ordering(field, argument, |o| o == Ordering::Greater),
                OP_GTE => self.matches_ordering(field, argument, |o| o != Ordering::Less),
                OP_LT => self.matches_ordering(field, argument, |o| o == Ordering::Less),
                OP_LTE => self.matches_ordering(field, argument, |o| o != Ordering::Greater),
                OP_NE => !self.matches_literal(field, argument)?,
                OP_IN => self.matches_any(field, expect_array(operator, argument)?)?,
                OP_NIN => !self.matches_any(field, expect_array(operator, argument)?)?,
                OP_NOT => match argument {
                    Value::Regex(pattern) => !self.matches_regex(field, pattern)?,
                    Value::Document(inner) if is_operator_map(inner) => {
                        !self.matches_operators(field, inner)?
                    }
                    other => !self.matches_literal(field, other)?,
                },
                OP_SIZE => {
                    let size = expect_i64(operator, argument)?;
                    matches!(field, Some(Value::Array(items)) if items.len() as i64 == size)
                }
                OP_EXISTS => {
                    let should_exist = argument
                        .as_bool()
                        .unwrap_or_else(|| argument.as_i64().map_or(true, |n| n != 0));
                    field.is_some() == should_exist
                }
                OP_ALL => {
                    let required = expect_array(operator, argument)?;
                    match field {
                        Some(Value::Array(items)) => {
                            required.iter().all(|value| items.contains(value))
                        }
                        Some(value) => {
                            !required.is_empty() && required.iter().all(|v| v == value)
                        }
                        None => false,
                    }
                }
                OP_MOD => {
                    let spec = expect_array(operator, argument)?;
                    if spec.len() != 2 {
                        return Err(invalid_query(&format!(
                            "{} expects [divisor, remainder], found {}",
                            operator, argument
                        )));
                    }
                    let divisor = expect_i64(operator, &spec[0])?;
                    let remainder = expect_i64(operator, &spec[1])?;
                    if divisor == 0 {
                        return Err(invalid_query(&format!("{} divisor must not be 0", operator)));
                    }
                    field
                        .and_then(|v| v.as_i64())
                        .is_some_and(|n| n.checked_rem(divisor).unwrap_or(0) == remainder)
                }
                OP_NEAR => {
                    let origin = as_point(argument).ok_or_else(|| {
                        invalid_query(&format!("{} expects [x, y], found {}", operator, argument))
                    })?;
                    let max_distance = operators.get(OP_MAX_DISTANCE).and_then(|v| v.as_f64());
                    match field.and_then(as_point) {
                        Some(point) => max_distance.map_or(true, |max| distance(origin, point) <= max),
                        None => false,
                    }
                }
                // consumed together with $near
                OP_MAX_DISTANCE => true,
                other => {
                    return Err(invalid_query(&format!("Unknown query operator {}", other)));
                }
            };

            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{DocRef, ObjectId};
    use crate::{doc, val};

    fn matcher() -> FilterMatcher {
        FilterMatcher::new(FunctionRegistry::new())
    }

    fn person() -> Document {
        doc! {
            name: "Ann Smith",
            age: 34,
            tags: ["admin", "staff"],
            address: { city: "Berlin" },
            loc: [10, 20],
        }
    }

    #[test]
    fn test_empty_filter_matches() {
        assert!(matcher().matches(&person(), &doc! {}).unwrap());
    }

    #[test]
    fn test_literal_and_path_equality() {
        let m = matcher();
        assert!(m.matches(&person(), &doc! { age: 34 }).unwrap());
        assert!(m.matches(&person(), &doc! { age: 34.0 }).unwrap());
        assert!(m.matches(&person(), &doc! { "address.city": "Berlin" }).unwrap());
        assert!(!m.matches(&person(), &doc! { age: 35 }).unwrap());
        assert!(!m.matches(&person(), &doc! { age: "34" }).unwrap());
    }

    #[test]
    fn test_literal_matches_array_element() {
        let m = matcher();
        assert!(m.matches(&person(), &doc! { tags: "admin" }).unwrap());
        assert!(!m.matches(&person(), &doc! { tags: "guest" }).unwrap());
    }

    #[test]
    fn test_null_matches_missing_field() {
        let m = matcher();
        assert!(m.matches(&person(), &doc! { email: (Value::Null) }).unwrap());
        assert!(!m.matches(&person(), &doc! { age: (Value::Null) }).unwrap());
    }

    #[test]
    fn test_range_operators() {
        let m = matcher();
        assert!(m.matches(&person(), &doc! { age: { "$gt": 30, "$lt": 40 } }).unwrap());
        assert!(m.matches(&person(), &doc! { age: { "$gte": 34, "$lte": 34 } }).unwrap());
        assert!(!m.matches(&person(), &doc! { age: { "$gt": 34 } }).unwrap());
        // strings never compare with numbers
        assert!(!m.matches(&person(), &doc! { name: { "$gt": 1 } }).unwrap());
    }

    #[test]
    fn test_membership_operators() {
        let m = matcher();
        assert!(m.matches(&person(), &doc! { age: { "$in": [1, 34] } }).unwrap());
        assert!(m.matches(&person(), &doc! { tags: { "$in": ["staff"] } }).unwrap());
        assert!(m.matches(&person(), &doc! { age: { "$nin": [1, 2] } }).unwrap());
        assert!(m.matches(&person(), &doc! { age: { "$ne": 1 } }).unwrap());
        assert!(!m.matches(&person(), &doc! { age: { "$ne": 34 } }).unwrap());
        assert!(m.matches(&person(), &doc! { tags: { "$all": ["staff", "admin"] } }).unwrap());
        assert!(!m.matches(&person(), &doc! { tags: { "$all": ["staff", "root"] } }).unwrap());
    }

    #[test]
    fn test_in_requires_array() {
        let err = matcher()
            .matches(&person(), &doc! { age: { "$in": 34 } })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }

    #[test]
    fn test_size_exists_and_mod() {
        let m = matcher();
        assert!(m.matches(&person(), &doc! { tags: { "$size": 2 } }).unwrap());
        assert!(!m.matches(&person(), &doc! { tags: { "$size": 3 } }).unwrap());
        assert!(m.matches(&person(), &doc! { age: { "$exists": true } }).unwrap());
        assert!(m.matches(&person(), &doc! { email: { "$exists": false } }).unwrap());
        assert!(m.matches(&person(), &doc! { age: { "$mod": [10, 4] } }).unwrap());
        assert!(!m.matches(&person(), &doc! { age: { "$mod": [10, 3] } }).unwrap());

        let err = m
            .matches(&person(), &doc! { age: { "$mod": [0, 1] } })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }

    #[test]
    fn test_mod_at_integer_bounds() {
        let m = matcher();
        let smallest = doc! { n: (i64::MIN) };
        assert!(m.matches(&smallest, &doc! { n: { "$mod": [(-1), 0] } }).unwrap());
        assert!(!m.matches(&smallest, &doc! { n: { "$mod": [(-1), 1] } }).unwrap());
        assert!(m.matches(&smallest, &doc! { n: { "$mod": [2, 0] } }).unwrap());
    }

    #[test]
    fn test_regex_and_not() {
        let m = matcher();
        let like = Value::Regex(RegexPattern::new(".*smith.*", "i"));
        assert!(m.matches(&person(), &doc! { name: (like.clone()) }).unwrap());
        assert!(!m.matches(&person(), &doc! { name: { "$not": (like) } }).unwrap());

        let exact = Value::Regex(RegexPattern::new("^Smith", ""));
        assert!(!m.matches(&person(), &doc! { name: (exact) }).unwrap());
        assert!(m.matches(&person(), &doc! { age: { "$not": { "$gt": 40 } } }).unwrap());
    }

    #[test]
    fn test_invalid_regex_is_invalid_query() {
        let broken = Value::Regex(RegexPattern::new("(", ""));
        let err = matcher()
            .matches(&person(), &doc! { name: (broken) })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }

    #[test]
    fn test_near_with_max_distance() {
        let m = matcher();
        assert!(m
            .matches(&person(), &doc! { loc: { "$near": [10, 21], "$maxDistance": 2 } })
            .unwrap());
        assert!(!m
            .matches(&person(), &doc! { loc: { "$near": [50, 50], "$maxDistance": 2 } })
            .unwrap());
        assert!(m.matches(&person(), &doc! { loc: { "$near": [50, 50] } }).unwrap());
        assert!(!m.matches(&doc! { a: 1 }, &doc! { loc: { "$near": [0, 0] } }).unwrap());
    }

    #[test]
    fn test_where_predicate() {
        let functions = FunctionRegistry::new();
        functions.register_predicate("this.age > 30", |doc| {
            doc.get("age").and_then(|v| v.as_i64()).unwrap_or(0) > 30
        });
        let m = FilterMatcher::new(functions);

        let filter = doc! { "$where": (Value::Code("this.age > 30".into())) };
        assert!(m.matches(&person(), &filter).unwrap());
        assert!(!m.matches(&doc! { age: 3 }, &filter).unwrap());

        let unknown = doc! { "$where": (Value::Code("this.x".into())) };
        assert_eq!(
            m.matches(&person(), &unknown).unwrap_err().kind(),
            &ErrorKind::InvalidQuery
        );
    }

    #[test]
    fn test_id_and_reference_equality() {
        let id = ObjectId::new();
        let reference = DocRef::new("users", id);
        let stored = doc! { _id: id, author: (reference.clone()) };

        let m = matcher();
        assert!(m.matches(&stored, &doc! { _id: id }).unwrap());
        assert!(m.matches(&stored, &doc! { author: (reference) }).unwrap());
        assert!(!m.matches(&stored, &doc! { _id: (ObjectId::new()) }).unwrap());
        assert!(!m.matches(&stored, &doc! { _id: (id.to_hex()) }).unwrap());
    }

    #[test]
    fn test_unknown_operator() {
        let err = matcher()
            .matches(&person(), &doc! { age: { "$between": [1, 2] } })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }

    #[test]
    fn test_regex_cache_reuses_compiled_pattern() {
        let m = matcher();
        let pattern = RegexPattern::new("^a", "");
        let first = m.compile(&pattern).unwrap();
        let second = m.compile(&pattern).unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert_eq!(m.regex_cache.lock().len(), 1);
        assert_eq!(val!(pattern.clone()), Value::Regex(pattern));
    }
}
