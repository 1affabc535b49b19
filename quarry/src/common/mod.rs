mod constants;
mod document;
mod inflector;
mod object_id;
mod reference;
mod sort_order;
mod timestamp;
mod util;
mod value;

pub use constants::*;
pub use document::*;
pub use inflector::*;
pub use object_id::*;
pub use reference::*;
pub use sort_order::*;
pub use timestamp::*;
pub use util::*;
pub use value::*;
