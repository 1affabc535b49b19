mod map_reduce;

pub use map_reduce::*;
