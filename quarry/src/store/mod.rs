mod context;
mod driver;
mod find_options;
pub mod memory;
mod provider;
mod write_ack;

pub use context::*;
pub use driver::*;
pub use find_options::*;
pub use provider::*;
pub use write_ack::*;
