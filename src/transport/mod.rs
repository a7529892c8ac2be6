//! # Transport
//!
//! Interface discovery and raw Ethernet I/O (Linux AF_PACKET).

pub mod interface;
pub mod raw;

pub use interface::{find_interface, interface_ipv4, interface_mac};
pub use raw::RawSocket;
