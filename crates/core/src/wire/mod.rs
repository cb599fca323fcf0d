//! Server Query wire codec
//!
//! Escaping plus the `key=value` / `key=a|key=b` / `-switch` argument syntax.

mod escape;
mod map;

pub use escape::{escape, unescape};
pub use map::{parse_entry, WireMap, WireValue};
