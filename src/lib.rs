//! # MYP4DB Wire
//!
//! Codec and host tooling for MYP4DB, a toy database-relation protocol carried
//! in IPv4 protocol `0xFA` and processed by a P4 switch.
//!
//! A frame carries one relation header followed by a stack of fixed-size entry
//! records. The stack has no length field; the record with its bottom-of-stack
//! bit set is the last one, and an optional UDP datagram follows it.
//!
//! ## Modules
//! - [`core`]: relation headers, entries, the stack codec and frame layout
//! - [`protocol`]: layer-binding table used while parsing
//! - [`transport`]: interface lookup and AF_PACKET raw sockets
//! - [`service`]: relation sender and capture receiver
//! - [`config`]: TOML / environment configuration
//! - [`error`]: error types
//! - [`utils`]: logging and metrics
//!
//! ## Example
//! ```rust
//! use myp4db_wire::{decode, encode, Entry, HeaderLayout, RelationHeader, IP_PROTO_MYP4DB};
//!
//! let header = RelationHeader::request(HeaderLayout::WithReplyJoin, 1);
//! let entries = vec![Entry::new(7, 10, 20)?, Entry::new(8, 11, 21)?];
//! let bytes = encode(&header, &entries.into())?;
//!
//! let stack = decode(&bytes, IP_PROTO_MYP4DB, HeaderLayout::WithReplyJoin)?;
//! assert_eq!(stack.header, header);
//! assert_eq!(stack.entries.len(), 2);
//! # Ok::<(), myp4db_wire::ProtocolError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::codec::{decode, decode_prefix, encode, RelationCodec, RelationStack};
pub use crate::core::entry::{Entry, EntryStack, ReplyEntry, StackRecord};
pub use crate::core::frame::{Frame, MacAddr, UdpDatagram};
pub use crate::core::relation::{HeaderLayout, RelationHeader};
pub use crate::error::{MalformedHeader, ProtocolError, Result};
pub use crate::protocol::binding::IP_PROTO_MYP4DB;
