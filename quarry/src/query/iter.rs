use crate::record::Record;

/// An iterator over the records of one query execution.
pub struct RecordIter {
    records: std::vec::IntoIter<Record>,
}

impl RecordIter {
    pub(crate) fn new(records: Vec<Record>) -> Self {
        RecordIter {
            records: records.into_iter(),
        }
    }
}

impl Iterator for RecordIter {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for RecordIter {}
