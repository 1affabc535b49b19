use crate::common::{Document, SortOrder};

/// Options for a find round trip: projection, sort and paging.
///
/// # Examples
///
/// ```rust
/// use quarry::common::SortOrder;
/// use quarry::store::FindOptions;
///
/// let options = FindOptions::new()
///     .sort_by("age", SortOrder::Descending)
///     .skip(10)
///     .limit(20);
/// assert_eq!(options.limit_value(), Some(20));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub(crate) projection: Option<Document>,
    pub(crate) sort_by: Vec<(String, SortOrder)>,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
}

/// Creates `FindOptions` sorted by one field.
pub fn order_by(field_name: &str, sort_order: SortOrder) -> FindOptions {
    FindOptions::new().sort_by(field_name, sort_order)
}

/// Creates `FindOptions` that skip a number of results.
pub fn skip_by(skip: u64) -> FindOptions {
    FindOptions::new().skip(skip)
}

/// Creates `FindOptions` that limit the number of results.
pub fn limit_to(limit: u64) -> FindOptions {
    FindOptions::new().limit(limit)
}

impl FindOptions {
    pub fn new() -> FindOptions {
        FindOptions {
            projection: None,
            sort_by: Vec::new(),
            skip: None,
            limit: None,
        }
    }

    pub fn skip(mut self, skip: u64) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    pub fn sort_by(mut self, field_name: &str, sort_order: SortOrder) -> FindOptions {
        self.sort_by.push((field_name.to_string(), sort_order));
        self
    }

    /// Sets the projection document. A field mapped to `0` is excluded, a
    /// field mapped to `{"$slice": spec}` is trimmed.
    pub fn projection(mut self, projection: Document) -> FindOptions {
        self.projection = if projection.is_empty() {
            None
        } else {
            Some(projection)
        };
        self
    }

    pub fn projection_document(&self) -> Option<&Document> {
        self.projection.as_ref()
    }

    pub fn sort_fields(&self) -> &[(String, SortOrder)] {
        &self.sort_by
    }

    pub fn skip_value(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_order_by() {
        let options = order_by("name", SortOrder::Ascending);
        assert_eq!(options.sort_fields().len(), 1);
        assert_eq!(options.sort_fields()[0].0, "name");
        assert_eq!(options.sort_fields()[0].1, SortOrder::Ascending);
        assert!(options.skip_value().is_none());
    }

    #[test]
    fn test_skip_by_and_limit_to() {
        assert_eq!(skip_by(10).skip_value(), Some(10));
        assert!(skip_by(10).limit_value().is_none());
        assert_eq!(limit_to(5).limit_value(), Some(5));
        assert!(limit_to(5).skip_value().is_none());
    }

    #[test]
    fn test_find_options_new() {
        let options = FindOptions::new();
        assert!(options.sort_fields().is_empty());
        assert!(options.projection_document().is_none());
        assert_eq!(options, FindOptions::default());
    }

    #[test]
    fn test_empty_projection_is_none() {
        assert!(FindOptions::new().projection(doc! {}).projection_document().is_none());
        assert!(FindOptions::new()
            .projection(doc! { body: 0 })
            .projection_document()
            .is_some());
    }
}
