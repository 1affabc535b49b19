mod field;
mod model;
mod record;
mod schema;

pub use field::*;
pub use model::*;
pub use record::*;
pub use schema::*;
