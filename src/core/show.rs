//! # Frame Dump
//!
//! Renders frames for humans (a layer-by-layer listing) or for tools (one
//! JSON object per frame).
//!
//! ```text
//! ###[ Ethernet ]###
//!   dst       = ff:ff:ff:ff:ff:ff
//!   ...
//! ###[ MYP4DB_Relation ]###
//!   relationId = 1
//! ###[ DBEntry ]###
//!   bos       = 0
//! ```

use super::codec::RelationStack;
use super::entry::{Entry, EntryStack, ReplyEntry, StackRecord};
use super::frame::{Frame, UdpDatagram};
use super::relation::RelationHeader;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Output format for captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpFormat {
    /// Layer-by-layer text listing
    #[default]
    Show,
    /// One JSON object per line
    Json,
}

impl DumpFormat {
    pub fn render(self, frame: &Frame) -> Result<String> {
        match self {
            DumpFormat::Show => Ok(frame.to_string()),
            DumpFormat::Json => serde_json::to_string(frame)
                .map_err(|e| ProtocolError::SerializationError(e.to_string())),
        }
    }
}

fn layer(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    writeln!(f, "###[ {name} ]###")
}

fn field(f: &mut fmt::Formatter<'_>, name: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(f, "  {name:<10}= {value}")
}

impl fmt::Display for RelationHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        layer(f, "MYP4DB_Relation")?;
        match *self {
            RelationHeader::RequestOnly {
                relation_id,
                aggregate,
            } => {
                field(f, "relationId", relation_id)?;
                field(f, "aggregate", u8::from(aggregate))
            }
            RelationHeader::WithFlush {
                relation_id,
                is_flush,
                is_reply,
            } => {
                field(f, "relationId", relation_id)?;
                field(f, "isFlush", u8::from(is_flush))?;
                field(f, "isReply", u8::from(is_reply))
            }
            RelationHeader::WithReplyJoin {
                relation_id,
                reply_joined_relation_id,
                is_reply,
            } => {
                field(f, "relationId", relation_id)?;
                field(f, "replyJoinedrelationId", reply_joined_relation_id)?;
                field(f, "isReply", u8::from(is_reply))?;
                field(f, "reserved", 0)
            }
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        layer(f, Entry::NAME)?;
        field(f, "bos", u8::from(self.bos))?;
        field(f, "entryId", self.entry_id)?;
        field(f, "secondAttr", self.second_attr)?;
        field(f, "thirdAttr", self.third_attr)
    }
}

impl fmt::Display for ReplyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        layer(f, ReplyEntry::NAME)?;
        field(f, "bos", u8::from(self.entry.bos))?;
        field(f, "entryId", self.entry.entry_id)?;
        field(f, "secondAttr", self.entry.second_attr)?;
        field(f, "thirdAttr", self.entry.third_attr)?;
        field(f, "forthAttr", self.forth_attr)?;
        field(f, "fifthAttr", self.fifth_attr)
    }
}

impl fmt::Display for RelationStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        match &self.entries {
            EntryStack::Tuples(entries) => entries.iter().try_for_each(|e| write!(f, "{e}")),
            EntryStack::Replies(entries) => entries.iter().try_for_each(|e| write!(f, "{e}")),
        }
    }
}

impl fmt::Display for UdpDatagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        layer(f, "UDP")?;
        field(f, "sport", self.src_port)?;
        field(f, "dport", self.dst_port)?;
        field(f, "len", self.wire_len())?;
        field(f, "chksum", format_args!("{:#06x}", self.checksum))?;
        if !self.payload.is_empty() {
            layer(f, "Raw")?;
            let mut load = String::new();
            for &byte in &self.payload {
                match byte {
                    0x20..=0x7E => load.push(char::from(byte)),
                    _ => {
                        let _ = write!(load, "\\x{byte:02x}");
                    }
                }
            }
            field(f, "load", format_args!("'{load}'"))?;
        }
        Ok(())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        layer(f, "Ethernet")?;
        field(f, "dst", self.ethernet.dst)?;
        field(f, "src", self.ethernet.src)?;
        field(f, "type", format_args!("{:#06x}", self.ethernet.ether_type))?;

        layer(f, "IP")?;
        field(f, "version", 4)?;
        field(f, "tos", format_args!("{:#04x}", self.ipv4.tos))?;
        field(f, "len", self.ipv4.total_len)?;
        field(f, "id", self.ipv4.identification)?;
        field(f, "ttl", self.ipv4.ttl)?;
        field(f, "proto", self.ipv4.protocol)?;
        field(f, "chksum", format_args!("{:#06x}", self.ipv4.checksum))?;
        field(f, "src", self.ipv4.src)?;
        field(f, "dst", self.ipv4.dst)?;

        if let Some(stack) = &self.relation {
            write!(f, "{stack}")?;
        }
        if let Some(udp) = &self.udp {
            write!(f, "{udp}")?;
        }
        Ok(())
    }
}
