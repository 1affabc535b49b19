mod builder;
mod collection_handle;
mod config;
mod manager;

pub use builder::*;
pub use collection_handle::*;
pub use config::*;
pub use manager::*;

pub(crate) use collection_handle::{is_ok_reply, reply_error};
