//! # Protocol Layer Bindings
//!
//! Which header follows which, keyed on a field of the lower layer.

pub mod binding;

pub use binding::{next_layer, Layer, Selector};
