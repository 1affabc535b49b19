mod iter;
mod query_builder;
mod selection;

pub use iter::*;
pub use query_builder::*;
pub use selection::*;
