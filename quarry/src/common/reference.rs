use crate::common::ObjectId;
use std::fmt::{Debug, Display};

/// A lightweight pointer to a document in another collection.
///
/// References replace embedded records when the holding record is saved,
/// and are resolved back into records the first time the field is read.
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, serde::Deserialize, serde::Serialize)]
pub struct DocRef {
    collection: String,
    id: ObjectId,
}

impl DocRef {
    pub fn new(collection: &str, id: ObjectId) -> Self {
        DocRef {
            collection: collection.to_string(),
            id,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl Debug for DocRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Display for DocRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DBRef(\"{}\", \"{}\")", self.collection, self.id)
    }
}
