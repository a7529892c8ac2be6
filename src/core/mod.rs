//! # Core Protocol Components
//!
//! MYP4DB headers, the relation stack codec, and the Ethernet/IPv4/UDP framing
//! around it.
//!
//! ## Components
//! - **Relation**: the three relation header revisions
//! - **Entry**: tuple and reply records forming the bottom-of-stack chain
//! - **Codec**: pure encode/decode plus a Tokio codec for byte streams
//! - **Frame**: full frames as they appear on the wire
//! - **Show**: human-readable and JSON dumps
//!
//! ## Wire Format
//! ```text
//! [Ethernet(14)] [IPv4(20, proto 0xFA)] [Relation(1|2)] [Entry(12|20)]*  [UDP(8)] [Payload(N)]
//!                                                        ^ last one has bos=1
//! ```

pub mod codec;
pub mod entry;
pub mod frame;
pub mod relation;
pub mod show;
