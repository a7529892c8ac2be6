//! # Services
//!
//! Host-side tooling built on the codec: a sender that emits random
//! relations and a receiver that captures and decodes them.

pub mod receiver;
pub mod sender;

pub use receiver::{CaptureFilter, CaptureSieve, Receiver};
pub use sender::{RelationGenerator, Sender};
