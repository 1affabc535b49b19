//! # quarry
//!
//! An active-record object-document mapper.
//!
//! quarry maps documents of a schema-less document store onto [Record]s:
//! in-memory field maps that track whether they are new or carry unsaved
//! changes, normalize identity and timestamp fields, resolve references to
//! other documents on demand and run lifecycle hooks around writes.
//!
//! Queries are composed with a chainable, lazily executed [Query] builder
//! and map-reduce jobs with the [MapReduce] builder. Both are reached
//! through a [Model], which binds a [Schema] to a [Connection].
//!
//! ## Example
//!
//! ```rust
//! use quarry::{doc, Connection, Schema};
//!
//! let connection = Connection::builder()
//!     .configure("memory://blog", "blog")
//!     .build();
//! let posts = connection.model(Schema::builder("Post").build());
//!
//! let mut post = posts.create(doc! { title: "Hello", votes: 3 }).unwrap();
//! post.save().unwrap();
//!
//! let popular = posts.find().gt("votes", 1).fetch().unwrap();
//! assert_eq!(popular.len(), 1);
//! ```

use crate::common::ObjectIdGenerator;
use std::sync::LazyLock;

pub mod aggregation;
pub mod common;
pub mod connection;
pub mod errors;
pub mod query;
pub mod record;
pub mod store;

pub use aggregation::MapReduce;
pub use connection::{Connection, ConnectionBuilder, ConnectionConfig};
pub use errors::{ErrorKind, QuarryError, QuarryResult};
pub use query::{Query, Selection};
pub use record::{FieldValue, Model, Record, Schema};

pub(crate) static ID_GENERATOR: LazyLock<ObjectIdGenerator> = LazyLock::new(ObjectIdGenerator::new);
