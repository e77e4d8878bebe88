//! A miniature reflective object runtime: class hierarchies with a flattened
//! resolution order, properties and descriptors, attribute catch-alls and
//! operator dispatch, plus a native `NeoPixel` type whose byte buffer is
//! handed off to a pluggable device boundary.

pub mod errors;
pub mod libraries;
pub mod memory;
pub mod runtime;

pub use errors::{RuntimeError, RuntimeResult};
pub use memory::value::Value;
pub use runtime::Runtime;
