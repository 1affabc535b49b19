use crate::common::tableize;
use crate::errors::QuarryResult;
use crate::record::{FieldValue, Record};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Transforms a field value on its way out of a record.
pub type FieldGetter = Arc<dyn Fn(FieldValue) -> QuarryResult<FieldValue> + Send + Sync>;

/// Transforms a field value on its way into a record, before the value is
/// normalized.
pub type FieldSetter = Arc<dyn Fn(FieldValue) -> QuarryResult<FieldValue> + Send + Sync>;

/// A lifecycle callback. An error aborts the operation it guards.
pub type Hook = Arc<dyn Fn(&mut Record) -> QuarryResult<()> + Send + Sync>;

/// Points in a record's lifecycle where hooks run.
///
/// A save of a new record runs `BeforeSave`, `BeforeCreate`, `AfterCreate`
/// and `AfterSave` in that order; a save of a stored record runs the
/// update pair instead of the create pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    BeforeSave,
    AfterSave,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

impl Display for LifecycleEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleEvent::BeforeSave => write!(f, "before_save"),
            LifecycleEvent::AfterSave => write!(f, "after_save"),
            LifecycleEvent::BeforeCreate => write!(f, "before_create"),
            LifecycleEvent::AfterCreate => write!(f, "after_create"),
            LifecycleEvent::BeforeUpdate => write!(f, "before_update"),
            LifecycleEvent::AfterUpdate => write!(f, "after_update"),
            LifecycleEvent::BeforeDelete => write!(f, "before_delete"),
            LifecycleEvent::AfterDelete => write!(f, "after_delete"),
        }
    }
}

/// The declaration of a record type.
///
/// A schema names the type and its collection, and carries the per-field
/// getter and setter overrides and the lifecycle hooks of its records.
/// The collection defaults to the pluralized, underscored type name.
///
/// # Examples
///
/// ```rust
/// use quarry::{FieldValue, Schema};
///
/// let schema = Schema::builder("BlogPost")
///     .setter("title", |value| {
///         let title = value.as_str().unwrap_or_default().trim().to_string();
///         Ok(FieldValue::from(title))
///     })
///     .before_save(|record| record.set("published", true))
///     .build();
///
/// assert_eq!(schema.collection(), "blog_posts");
/// assert!(schema.setter("title").is_some());
/// ```
pub struct Schema {
    name: String,
    collection: String,
    getters: HashMap<String, FieldGetter>,
    setters: HashMap<String, FieldSetter>,
    hooks: HashMap<LifecycleEvent, SmallVec<[Hook; 2]>>,
}

impl Schema {
    pub fn builder(name: &str) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn getter(&self, field: &str) -> Option<&FieldGetter> {
        self.getters.get(field)
    }

    pub fn setter(&self, field: &str) -> Option<&FieldSetter> {
        self.setters.get(field)
    }

    pub fn hooks(&self, event: LifecycleEvent) -> &[Hook] {
        self.hooks.get(&event).map(|hooks| hooks.as_slice()).unwrap_or(&[])
    }

    /// Runs the hooks of `event` in registration order, stopping at the
    /// first failure.
    pub(crate) fn run_hooks(&self, event: LifecycleEvent, record: &mut Record) -> QuarryResult<()> {
        for hook in self.hooks(event) {
            if let Err(err) = hook(record) {
                log::error!("{} hook of {} failed: {}", event, self.name, err);
                return Err(err);
            }
        }
        Ok(())
    }
}

impl Debug for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("setters", &self.setters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for a [Schema].
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new(name: &str) -> Self {
        SchemaBuilder {
            schema: Schema {
                name: name.to_string(),
                collection: tableize(name),
                getters: HashMap::new(),
                setters: HashMap::new(),
                hooks: HashMap::new(),
            },
        }
    }

    /// Overrides the inflected collection name.
    pub fn collection(mut self, collection: &str) -> Self {
        self.schema.collection = collection.to_string();
        self
    }

    pub fn getter<F>(mut self, field: &str, getter: F) -> Self
    where
        F: Fn(FieldValue) -> QuarryResult<FieldValue> + Send + Sync + 'static,
    {
        self.schema.getters.insert(field.to_string(), Arc::new(getter));
        self
    }

    pub fn setter<F>(mut self, field: &str, setter: F) -> Self
    where
        F: Fn(FieldValue) -> QuarryResult<FieldValue> + Send + Sync + 'static,
    {
        self.schema.setters.insert(field.to_string(), Arc::new(setter));
        self
    }

    pub fn hook<F>(mut self, event: LifecycleEvent, hook: F) -> Self
    where
        F: Fn(&mut Record) -> QuarryResult<()> + Send + Sync + 'static,
    {
        self.schema
            .hooks
            .entry(event)
            .or_default()
            .push(Arc::new(hook));
        self
    }

    pub fn before_save<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> QuarryResult<()> + Send + Sync + 'static,
    {
        self.hook(LifecycleEvent::BeforeSave, hook)
    }

    pub fn after_save<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> QuarryResult<()> + Send + Sync + 'static,
    {
        self.hook(LifecycleEvent::AfterSave, hook)
    }

    pub fn before_create<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> QuarryResult<()> + Send + Sync + 'static,
    {
        self.hook(LifecycleEvent::BeforeCreate, hook)
    }

    pub fn after_create<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> QuarryResult<()> + Send + Sync + 'static,
    {
        self.hook(LifecycleEvent::AfterCreate, hook)
    }

    pub fn before_update<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> QuarryResult<()> + Send + Sync + 'static,
    {
        self.hook(LifecycleEvent::BeforeUpdate, hook)
    }

    pub fn after_update<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> QuarryResult<()> + Send + Sync + 'static,
    {
        self.hook(LifecycleEvent::AfterUpdate, hook)
    }

    pub fn before_delete<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> QuarryResult<()> + Send + Sync + 'static,
    {
        self.hook(LifecycleEvent::BeforeDelete, hook)
    }

    pub fn after_delete<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> QuarryResult<()> + Send + Sync + 'static,
    {
        self.hook(LifecycleEvent::AfterDelete, hook)
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, QuarryError};

    #[test]
    fn test_collection_is_inflected_from_name() {
        assert_eq!(Schema::builder("BlogPost").build().collection(), "blog_posts");
        assert_eq!(Schema::builder("Person").build().collection(), "people");
        assert_eq!(
            Schema::builder("Person").collection("humans").build().collection(),
            "humans"
        );
    }

    #[test]
    fn test_overrides_are_keyed_by_field() {
        let schema = Schema::builder("Post")
            .getter("title", |value| Ok(value))
            .setter("slug", |value| Ok(value))
            .build();
        assert!(schema.getter("title").is_some());
        assert!(schema.getter("slug").is_none());
        assert!(schema.setter("slug").is_some());
    }

    #[test]
    fn test_hooks_keep_registration_order() {
        let schema = Schema::builder("Post")
            .before_save(|_| Ok(()))
            .before_save(|_| Err(QuarryError::new("stop", ErrorKind::InvalidOperation)))
            .after_delete(|_| Ok(()))
            .build();
        assert_eq!(schema.hooks(LifecycleEvent::BeforeSave).len(), 2);
        assert_eq!(schema.hooks(LifecycleEvent::AfterDelete).len(), 1);
        assert!(schema.hooks(LifecycleEvent::AfterSave).is_empty());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(LifecycleEvent::BeforeSave.to_string(), "before_save");
        assert_eq!(LifecycleEvent::AfterDelete.to_string(), "after_delete");
    }
}
