/// Specifies the direction for sorting documents.
///
/// A query keeps a single active sort; see `Query::sort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Sort from smallest to largest value (A to Z, oldest to newest)
    Ascending,
    /// Sort from largest to smallest value (Z to A, newest to oldest)
    Descending,
}

impl SortOrder {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }

    /// The direction as the store encodes it in a sort document.
    pub fn as_direction(&self) -> i64 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }

    /// Decodes a sort-document direction. Negative numbers sort descending.
    pub fn from_direction(direction: i64) -> Self {
        if direction < 0 {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }
}
