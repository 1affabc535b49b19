mod client;
mod commands;
mod cursor;
mod driver;
mod functions;
mod matcher;
mod server;

pub use client::*;
pub use driver::*;
pub use functions::*;
pub use matcher::*;
pub use server::*;
