use crate::common::{Document, SortOrder, Value, DOC_ID, OP_NEAR, OP_SLICE};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::store::memory::matcher::{as_point, distance};
use crate::store::FindOptions;
use std::cmp::Ordering;

// the first `$near` clause of a filter, as (field, origin)
fn near_clause(filter: &Document) -> Option<(String, (f64, f64))> {
    filter.iter().find_map(|(field, condition)| {
        let origin = condition.as_document()?.get(OP_NEAR).and_then(as_point)?;
        Some((field.clone(), origin))
    })
}

fn compare_by(a: &Document, b: &Document, sort_by: &[(String, SortOrder)]) -> Ordering {
    for (field, order) in sort_by {
        let left = a.get_path(field).unwrap_or(&Value::Null);
        let right = b.get_path(field).unwrap_or(&Value::Null);
        let ordering = match order {
            SortOrder::Ascending => left.cmp(right),
            SortOrder::Descending => right.cmp(left),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Orders matched documents. Without an explicit sort, a `$near` filter
/// orders by distance from its origin.
pub(crate) fn sort_documents(
    documents: &mut [Document],
    filter: &Document,
    sort_by: &[(String, SortOrder)],
) {
    if !sort_by.is_empty() {
        documents.sort_by(|a, b| compare_by(a, b, sort_by));
        return;
    }

    if let Some((field, origin)) = near_clause(filter) {
        let distance_of = |doc: &Document| {
            doc.get_path(&field)
                .and_then(as_point)
                .map_or(f64::INFINITY, |point| distance(origin, point))
        };
        documents.sort_by(|a, b| distance_of(a).total_cmp(&distance_of(b)));
    }
}

/// Applies skip and limit. A limit of `0` means no limit.
pub(crate) fn page<T>(items: Vec<T>, skip: Option<u64>, limit: Option<u64>) -> Vec<T> {
    let skip = skip.unwrap_or(0) as usize;
    let iter = items.into_iter().skip(skip);
    match limit {
        Some(limit) if limit > 0 => iter.take(limit as usize).collect(),
        _ => iter.collect(),
    }
}

fn slice_array(items: &[Value], spec: &Value) -> QuarryResult<Vec<Value>> {
    let len = items.len() as i64;
    let (start, count) = match spec {
        Value::Array(pair) if pair.len() == 2 => {
            let skip = pair[0].as_i64();
            let take = pair[1].as_i64();
            match (skip, take) {
                (Some(skip), Some(take)) if take >= 0 => {
                    let start = if skip < 0 { (len + skip).max(0) } else { skip.min(len) };
                    (start, take.unsigned_abs())
                }
                _ => return Err(invalid_slice(spec)),
            }
        }
        other => match other.as_i64() {
            Some(n) if n >= 0 => (0, n.unsigned_abs()),
            Some(n) => ((len + n).max(0), n.unsigned_abs()),
            None => return Err(invalid_slice(spec)),
        },
    };

    Ok(items
        .iter()
        .skip(start as usize)
        .take(usize::try_from(count).unwrap_or(usize::MAX))
        .cloned()
        .collect())
}

fn invalid_slice(spec: &Value) -> QuarryError {
    log::error!("Invalid {} specification {}", OP_SLICE, spec);
    QuarryError::new(
        &format!("Invalid {} specification {}", OP_SLICE, spec),
        ErrorKind::InvalidQuery,
    )
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => other.as_f64().is_some_and(|n| n != 0.0),
    }
}

/// Applies a projection document.
///
/// Fields mapped to `0` are removed and fields mapped to
/// `{"$slice": spec}` keep only the selected elements. When any field is
/// mapped to `1` the projection is inclusive: only those fields and `_id`
/// remain.
pub(crate) fn project(document: Document, projection: &Document) -> QuarryResult<Document> {
    let mut slices = Vec::new();
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (field, spec) in projection.iter() {
        match spec {
            Value::Document(inner) if inner.contains_key(OP_SLICE) => {
                if let Some(slice) = inner.get(OP_SLICE) {
                    slices.push((field.clone(), slice.clone()));
                }
            }
            value if is_truthy(value) => included.push(field.clone()),
            _ => excluded.push(field.clone()),
        }
    }

    let mut result = if included.is_empty() {
        document
    } else {
        document
            .into_iter()
            .filter(|(key, _)| {
                key == DOC_ID || included.contains(key) || slices.iter().any(|(f, _)| f == key)
            })
            .collect()
    };

    for field in excluded {
        result.remove(&field);
    }

    for (field, spec) in slices {
        if let Some(Value::Array(items)) = result.get(&field) {
            let sliced = slice_array(items, &spec)?;
            result.put(&field, Value::Array(sliced));
        }
    }
    Ok(result)
}

/// Sorts, pages and projects matched documents.
pub(crate) fn finish(
    mut documents: Vec<Document>,
    filter: &Document,
    options: &FindOptions,
) -> QuarryResult<Vec<Document>> {
    sort_documents(&mut documents, filter, options.sort_fields());
    let documents = page(documents, options.skip_value(), options.limit_value());

    match options.projection_document() {
        Some(projection) => documents
            .into_iter()
            .map(|doc| project(doc, projection))
            .collect(),
        None => Ok(documents),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn docs() -> Vec<Document> {
        vec![doc! { a: 2, n: "b" }, doc! { a: 3, n: "a" }, doc! { a: 1, n: "c" }, doc! { n: "d" }]
    }

    #[test]
    fn test_sort_descending_puts_missing_last() {
        let mut documents = docs();
        sort_documents(&mut documents, &doc! {}, &[("a".to_string(), SortOrder::Descending)]);
        let values: Vec<_> = documents.iter().map(|d| d.get("a").cloned()).collect();
        assert_eq!(values, vec![Some(val!(3)), Some(val!(2)), Some(val!(1)), None]);
    }

    #[test]
    fn test_sort_by_near_distance() {
        let mut documents = vec![
            doc! { name: "far", loc: [10, 10] },
            doc! { name: "near", loc: [1, 1] },
            doc! { name: "none" },
        ];
        sort_documents(&mut documents, &doc! { loc: { "$near": [0, 0] } }, &[]);
        let names: Vec<_> = documents.iter().map(|d| d.get("name").cloned().unwrap()).collect();
        assert_eq!(names, vec![val!("near"), val!("far"), val!("none")]);
    }

    #[test]
    fn test_page() {
        let items: Vec<i32> = (1..=10).collect();
        assert_eq!(page(items.clone(), Some(2), Some(3)), vec![3, 4, 5]);
        assert_eq!(page(items.clone(), None, Some(0)).len(), 10);
        assert_eq!(page(items.clone(), Some(20), None), Vec::<i32>::new());
        assert_eq!(page(items, None, None).len(), 10);
    }

    #[test]
    fn test_project_exclusion() {
        let projected = project(doc! { _id: 1, title: "t", body: "b" }, &doc! { body: 0 }).unwrap();
        assert_eq!(projected, doc! { _id: 1, title: "t" });
    }

    #[test]
    fn test_project_inclusion_keeps_id() {
        let projected = project(doc! { _id: 1, title: "t", body: "b" }, &doc! { title: 1 }).unwrap();
        assert_eq!(projected, doc! { _id: 1, title: "t" });
    }

    #[test]
    fn test_project_slice() {
        let document = doc! { comments: [1, 2, 3, 4, 5] };
        let first = project(document.clone(), &doc! { comments: { "$slice": 2 } }).unwrap();
        assert_eq!(first, doc! { comments: [1, 2] });

        let last = project(document.clone(), &doc! { comments: { "$slice": (-2) } }).unwrap();
        assert_eq!(last, doc! { comments: [4, 5] });

        let window = project(document.clone(), &doc! { comments: { "$slice": [1, 2] } }).unwrap();
        assert_eq!(window, doc! { comments: [2, 3] });

        let all = project(document.clone(), &doc! { comments: { "$slice": (i64::MIN) } }).unwrap();
        assert_eq!(all, doc! { comments: [1, 2, 3, 4, 5] });

        let err = project(document, &doc! { comments: { "$slice": "x" } }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }
}
