use crate::query::RecordIter;
use crate::record::Record;

/// The materialized result of [crate::Query::select].
#[derive(Debug, Clone)]
pub enum Selection {
    /// The result of a single-result query.
    Single(Option<Record>),
    Many(Vec<Record>),
}

impl Selection {
    pub fn is_single(&self) -> bool {
        matches!(self, Selection::Single(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Selection::Single(record) => usize::from(record.is_some()),
            Selection::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first record.
    pub fn into_single(self) -> Option<Record> {
        match self {
            Selection::Single(record) => record,
            Selection::Many(records) => records.into_iter().next(),
        }
    }

    pub fn into_vec(self) -> Vec<Record> {
        match self {
            Selection::Single(record) => record.into_iter().collect(),
            Selection::Many(records) => records,
        }
    }
}

impl IntoIterator for Selection {
    type Item = Record;
    type IntoIter = RecordIter;

    fn into_iter(self) -> Self::IntoIter {
        RecordIter::new(self.into_vec())
    }
}
