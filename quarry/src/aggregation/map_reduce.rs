use crate::common::{
    Document, SortOrder, Value, CMD_MAP_REDUCE, CMD_RESULT, MR_OUTPUT_PREFIX,
};
use crate::connection::{is_ok_reply, reply_error};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::record::Model;
use crate::store::FindOptions;

/// Builder for a map-reduce job over the collection of a [Model].
///
/// Map, reduce and finalize bodies are opaque code text handed to the
/// store. The job writes its results to an output collection; unless
/// [MapReduce::keep_output] is set, [MapReduce::select] reads that
/// collection and drops it again.
///
/// # Examples
///
/// ```rust
/// use quarry::common::Value;
/// use quarry::store::memory::InMemoryDriver;
/// use quarry::{doc, val, Connection, Schema};
///
/// let driver = InMemoryDriver::new();
/// let server = driver.server("map-reduce-doc");
/// server.register_map("emit(this.tag, 1)", |doc, _scope, emitter| {
///     if let Some(tag) = doc.get("tag") {
///         emitter.emit(tag.clone(), 1);
///     }
/// });
/// server.register_reduce("sum", |_key, values, _scope| {
///     val!(values.iter().filter_map(Value::as_i64).sum::<i64>())
/// });
///
/// let connection = Connection::builder()
///     .driver(driver)
///     .configure("memory://map-reduce-doc", "blog")
///     .build();
/// let posts = connection.model(Schema::builder("Post").build());
/// for tag in ["rust", "go", "rust"] {
///     posts.create(doc! { tag: tag }).unwrap().save().unwrap();
/// }
///
/// let counts = posts
///     .map_reduce()
///     .map("emit(this.tag, 1)")
///     .reduce("sum")
///     .select()
///     .unwrap();
/// assert_eq!(counts, vec![doc! { _id: "go", value: 1 }, doc! { _id: "rust", value: 2 }]);
/// ```
#[derive(Clone)]
pub struct MapReduce {
    model: Model,
    map: Option<String>,
    reduce: Option<String>,
    finalize: Option<String>,
    query: Document,
    sort: Document,
    limit: Option<u64>,
    scope: Document,
    output: Option<String>,
    keep_output: bool,
}

impl MapReduce {
    pub(crate) fn new(model: Model) -> Self {
        MapReduce {
            model,
            map: None,
            reduce: None,
            finalize: None,
            query: Document::new(),
            sort: Document::new(),
            limit: None,
            scope: Document::new(),
            output: None,
            keep_output: false,
        }
    }

    pub fn map(mut self, code: &str) -> Self {
        self.map = Some(code.to_string());
        self
    }

    pub fn reduce(mut self, code: &str) -> Self {
        self.reduce = Some(code.to_string());
        self
    }

    pub fn finalize(mut self, code: &str) -> Self {
        self.finalize = Some(code.to_string());
        self
    }

    /// Restricts the input documents.
    pub fn query(mut self, filter: Document) -> Self {
        self.query = filter;
        self
    }

    /// Adds an input sort key.
    pub fn sort(mut self, field: &str, ascending: bool) -> Self {
        self.sort
            .put(field, SortOrder::from_ascending(ascending).as_direction());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Values made available to every map, reduce and finalize call.
    pub fn scope(mut self, scope: Document) -> Self {
        self.scope = scope;
        self
    }

    /// Names the output collection instead of generating a name.
    pub fn out(mut self, collection: &str) -> Self {
        self.output = Some(collection.to_string());
        self
    }

    pub fn keep_output(mut self, keep: bool) -> Self {
        self.keep_output = keep;
        self
    }

    pub fn output_name(&self) -> Option<&str> {
        self.output.as_deref()
    }

    fn generated_output(&self) -> String {
        format!(
            "{}_{}_{}",
            MR_OUTPUT_PREFIX,
            self.model.collection_name(),
            uuid::Uuid::new_v4().simple()
        )
    }

    /// The command document submitted for `output`.
    pub fn command(&self, output: &str) -> QuarryResult<Document> {
        let (map, reduce) = match (&self.map, &self.reduce) {
            (Some(map), Some(reduce)) => (map, reduce),
            _ => {
                log::error!(
                    "Map-reduce on {} needs both a map and a reduce function",
                    self.model.collection_name()
                );
                return Err(QuarryError::new(
                    "Map-reduce needs both a map and a reduce function",
                    ErrorKind::InvalidOperation,
                ));
            }
        };

        let mut command = Document::new();
        command.put(CMD_MAP_REDUCE, self.model.collection_name());
        command.put("map", Value::Code(map.clone()));
        command.put("reduce", Value::Code(reduce.clone()));
        if let Some(finalize) = &self.finalize {
            command.put("finalize", Value::Code(finalize.clone()));
        }
        if !self.query.is_empty() {
            command.put("query", self.query.clone());
        }
        if !self.sort.is_empty() {
            command.put("sort", self.sort.clone());
        }
        if let Some(limit) = self.limit {
            command.put("limit", limit);
        }
        if !self.scope.is_empty() {
            command.put("scope", self.scope.clone());
        }
        command.put("out", output);
        Ok(command)
    }

    /// Runs the job and returns the output documents.
    ///
    /// An error reply fails with `AggregationError` carrying the store's
    /// message. Dropping the output collection afterwards is best effort.
    pub fn select(&self) -> QuarryResult<Vec<Document>> {
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| self.generated_output());
        let command = self.command(&output)?;
        let connection = self.model.connection();

        let reply = connection.run_command(&command)?;
        if !is_ok_reply(&reply) {
            let message = reply_error(&reply);
            log::error!(
                "Map-reduce on {} failed: {}",
                self.model.collection_name(),
                message
            );
            return Err(QuarryError::new(
                &format!(
                    "Map-reduce on {} failed: {}",
                    self.model.collection_name(),
                    message
                ),
                ErrorKind::AggregationError,
            ));
        }

        let result = reply
            .get(CMD_RESULT)
            .and_then(|v| v.as_str())
            .unwrap_or(&output)
            .to_string();
        let documents = connection
            .collection(&result)?
            .find(&Document::new(), &FindOptions::new())?;
        log::debug!(
            "Map-reduce on {} produced {} documents in {}",
            self.model.collection_name(),
            documents.len(),
            result
        );

        if !self.keep_output {
            if let Err(err) = connection.drop_collection(&result) {
                log::warn!("Could not drop map-reduce output {}: {}", result, err);
            }
        }
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::record::Schema;
    use crate::store::memory::{InMemoryDriver, InMemoryServer};
    use crate::{doc, val};

    fn setup(server_name: &str) -> (InMemoryServer, Model) {
        let driver = InMemoryDriver::new();
        let server = driver.server(server_name);
        server.register_map("emit(this.tag, this.votes)", |doc, _scope, emitter| {
            if let (Some(tag), Some(votes)) = (doc.get("tag"), doc.get("votes")) {
                emitter.emit(tag.clone(), votes.clone());
            }
        });
        server.register_reduce("sum", |_key, values, _scope| {
            val!(values.iter().filter_map(|v| v.as_i64()).sum::<i64>())
        });
        server.register_finalize("scale", |_key, value, scope| {
            let factor = scope.get("factor").and_then(|v| v.as_i64()).unwrap_or(1);
            val!(value.as_i64().unwrap_or(0) * factor)
        });

        let connection = Connection::builder()
            .driver(driver)
            .configure(&format!("memory://{}", server_name), "db")
            .build();
        let posts = connection.model(Schema::builder("Post").build());
        for (tag, votes) in [("rust", 3), ("go", 1), ("rust", 5)] {
            posts
                .create(doc! { tag: tag, votes: votes })
                .unwrap()
                .save()
                .unwrap();
        }
        (server, posts)
    }

    #[test]
    fn test_command_document() {
        let (_, posts) = setup("mr-command");
        let command = posts
            .map_reduce()
            .map("m")
            .reduce("r")
            .finalize("f")
            .query(doc! { votes: { "$gt": 1 } })
            .sort("votes", false)
            .limit(10)
            .scope(doc! { factor: 2 })
            .command("out")
            .unwrap();

        assert_eq!(command.keys().next().map(|k| k.as_str()), Some(CMD_MAP_REDUCE));
        assert_eq!(command.get("mapreduce"), Some(&val!("posts")));
        assert_eq!(command.get("map"), Some(&Value::Code("m".into())));
        assert_eq!(command.get("sort"), Some(&val!(doc! { votes: (-1) })));
        assert_eq!(command.get("limit"), Some(&val!(10)));
        assert_eq!(command.get("out"), Some(&val!("out")));

        let err = posts.map_reduce().map("m").command("out").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_select_drops_generated_output() {
        let (server, posts) = setup("mr-select");
        let results = posts
            .map_reduce()
            .map("emit(this.tag, this.votes)")
            .reduce("sum")
            .select()
            .unwrap();

        assert_eq!(
            results,
            vec![doc! { _id: "go", value: 1 }, doc! { _id: "rust", value: 8 }]
        );
        assert_eq!(server.collection_names("db"), vec!["posts".to_string()]);
    }

    #[test]
    fn test_keep_output_with_finalize_and_scope() {
        let (server, posts) = setup("mr-keep");
        let results = posts
            .map_reduce()
            .map("emit(this.tag, this.votes)")
            .reduce("sum")
            .finalize("scale")
            .scope(doc! { factor: 10 })
            .out("tag_votes")
            .keep_output(true)
            .select()
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(server.documents("db", "tag_votes"), results);
    }

    #[test]
    fn test_error_reply_is_aggregation_error() {
        let (server, posts) = setup("mr-error");
        let err = posts
            .map_reduce()
            .map("function() { unknown() }")
            .reduce("sum")
            .select()
            .unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::AggregationError);
        assert!(err.message().contains("unknown map function"));
        assert_eq!(server.collection_names("db"), vec!["posts".to_string()]);
    }

    #[test]
    fn test_generated_output_name() {
        let (_, posts) = setup("mr-name");
        let job = posts.map_reduce();
        assert!(job.output_name().is_none());
        assert!(job.generated_output().starts_with("_mr_posts_"));
    }
}
