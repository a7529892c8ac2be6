//! # Error Types
//!
//! Error handling for the MYP4DB codec and host tooling.
//!
//! ## Error Categories
//! - **Malformed headers**: decode-time failures on captured bytes (wrong IP
//!   protocol, truncated stack, missing bottom-of-stack marker)
//! - **Value errors**: a field that does not fit its bit width, an empty stack,
//!   or entries whose shape disagrees with the relation's `isReply` flag
//! - **Configuration errors**: missing interface, invalid settings
//! - **I/O errors**: raw socket and file failures
//!
//! Decode failures are always reported as [`ProtocolError::Malformed`] so a
//! receiver can tell a bad capture apart from a local failure.
//!
//! ## Example Usage
//! ```rust
//! use myp4db_wire::core::codec::decode;
//! use myp4db_wire::core::relation::HeaderLayout;
//! use myp4db_wire::error::{MalformedHeader, ProtocolError};
//!
//! let err = decode(&[0x02], 17, HeaderLayout::RequestOnly).unwrap_err();
//! assert!(matches!(
//!     err,
//!     ProtocolError::Malformed(MalformedHeader::UnexpectedProtocol(17))
//! ));
//! ```

use std::io;
use thiserror::Error;

/// Reasons a byte buffer could not be decoded as a MYP4DB frame or stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedHeader {
    #[error("unexpected IP protocol {0:#04x}, expected 0xfa")]
    UnexpectedProtocol(u8),

    #[error("truncated {layer}: need {needed} bytes, have {available}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("entry region of {len} bytes is not a multiple of the {width}-byte entry width")]
    MisalignedEntries { len: usize, width: usize },

    #[error("no bottom-of-stack entry after {entries} entries")]
    MissingBottomOfStack { entries: usize },

    #[error("{0} trailing bytes after bottom-of-stack entry")]
    TrailingBytes(usize),

    #[error("unexpected ethertype {0:#06x}")]
    UnexpectedEtherType(u16),

    #[error("invalid IPv4 header: {0}")]
    InvalidIpv4Header(&'static str),

    #[error("{len} buffered bytes exceed the {limit}-byte stack limit without a bottom-of-stack entry")]
    OversizedStack { len: usize, limit: usize },
}

// ProtocolError is the primary error type for all codec and tooling operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed header: {0}")]
    Malformed(#[from] MalformedHeader),

    #[error("field {field} value {value} does not fit in {bits} bits")]
    FieldOutOfRange {
        field: &'static str,
        value: u64,
        bits: u32,
    },

    #[error("relation carries no entries")]
    EmptyStack,

    #[error("entry shape mismatch: header is_reply={is_reply} but entries are {entries}")]
    ShapeMismatch {
        is_reply: bool,
        entries: &'static str,
    },

    #[error("Packet too large: {size} bytes (limit {limit})")]
    OversizedPacket { size: usize, limit: usize },

    #[error("Cannot find {0} interface")]
    InterfaceNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ProtocolError {
    /// True for decode-time failures on captured bytes.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ProtocolError::Malformed(_))
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
