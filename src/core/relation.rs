//! Relation header layouts.
//!
//! The relation header went through three incompatible revisions. Each one is
//! kept as its own [`HeaderLayout`] so a caller states which revision it
//! speaks instead of the decoder guessing.
//!
//! ```text
//! RequestOnly    [relationId:7][aggregate:1]                          1 byte
//! WithFlush      [relationId:6][isFlush:1][isReply:1]                 1 byte
//! WithReplyJoin  [relationId:7][replyJoined:7][isReply:1][reserved:1] 2 bytes
//! ```

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selects one of the relation header revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderLayout {
    /// 7-bit relation id and an aggregate flag. Never carries replies.
    RequestOnly,
    /// 6-bit relation id, flush and reply flags.
    WithFlush,
    /// 7-bit relation id, 7-bit joined relation id, reply flag, reserved bit.
    #[default]
    WithReplyJoin,
}

impl HeaderLayout {
    pub const ALL: [HeaderLayout; 3] = [
        HeaderLayout::RequestOnly,
        HeaderLayout::WithFlush,
        HeaderLayout::WithReplyJoin,
    ];

    /// Header width on the wire in bytes.
    pub const fn wire_len(self) -> usize {
        match self {
            HeaderLayout::RequestOnly | HeaderLayout::WithFlush => 1,
            HeaderLayout::WithReplyJoin => 2,
        }
    }

    /// Bit width of `relationId` in this layout.
    pub const fn relation_id_bits(self) -> u32 {
        match self {
            HeaderLayout::RequestOnly | HeaderLayout::WithReplyJoin => 7,
            HeaderLayout::WithFlush => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HeaderLayout::RequestOnly => "request_only",
            HeaderLayout::WithFlush => "with_flush",
            HeaderLayout::WithReplyJoin => "with_reply_join",
        }
    }
}

impl fmt::Display for HeaderLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HeaderLayout {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        HeaderLayout::ALL
            .into_iter()
            .find(|layout| layout.name() == s)
            .ok_or_else(|| ProtocolError::ConfigError(format!("unknown header layout: {s}")))
    }
}

/// A relation header in one of the supported layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum RelationHeader {
    RequestOnly {
        relation_id: u8,
        aggregate: bool,
    },
    WithFlush {
        relation_id: u8,
        is_flush: bool,
        is_reply: bool,
    },
    WithReplyJoin {
        relation_id: u8,
        reply_joined_relation_id: u8,
        is_reply: bool,
    },
}

impl RelationHeader {
    pub fn layout(&self) -> HeaderLayout {
        match self {
            RelationHeader::RequestOnly { .. } => HeaderLayout::RequestOnly,
            RelationHeader::WithFlush { .. } => HeaderLayout::WithFlush,
            RelationHeader::WithReplyJoin { .. } => HeaderLayout::WithReplyJoin,
        }
    }

    pub fn relation_id(&self) -> u8 {
        match *self {
            RelationHeader::RequestOnly { relation_id, .. }
            | RelationHeader::WithFlush { relation_id, .. }
            | RelationHeader::WithReplyJoin { relation_id, .. } => relation_id,
        }
    }

    /// Whether the entries that follow are [`ReplyEntry`](super::entry::ReplyEntry) records.
    pub fn is_reply(&self) -> bool {
        match *self {
            RelationHeader::RequestOnly { .. } => false,
            RelationHeader::WithFlush { is_reply, .. }
            | RelationHeader::WithReplyJoin { is_reply, .. } => is_reply,
        }
    }

    /// A plain request header (`isReply = 0`, flags clear) for `layout`.
    pub fn request(layout: HeaderLayout, relation_id: u8) -> Self {
        match layout {
            HeaderLayout::RequestOnly => RelationHeader::RequestOnly {
                relation_id,
                aggregate: false,
            },
            HeaderLayout::WithFlush => RelationHeader::WithFlush {
                relation_id,
                is_flush: false,
                is_reply: false,
            },
            HeaderLayout::WithReplyJoin => RelationHeader::WithReplyJoin {
                relation_id,
                reply_joined_relation_id: 0,
                is_reply: false,
            },
        }
    }

    /// Checks every sub-field against its bit width.
    pub fn validate(&self) -> Result<()> {
        check_width(
            "relationId",
            u64::from(self.relation_id()),
            self.layout().relation_id_bits(),
        )?;
        if let RelationHeader::WithReplyJoin {
            reply_joined_relation_id,
            ..
        } = *self
        {
            check_width(
                "replyJoinedRelationId",
                u64::from(reply_joined_relation_id),
                7,
            )?;
        }
        Ok(())
    }

    /// Writes the header after validating it.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        self.validate()?;
        match *self {
            RelationHeader::RequestOnly {
                relation_id,
                aggregate,
            } => buf.put_u8((relation_id << 1) | u8::from(aggregate)),
            RelationHeader::WithFlush {
                relation_id,
                is_flush,
                is_reply,
            } => buf.put_u8((relation_id << 2) | (u8::from(is_flush) << 1) | u8::from(is_reply)),
            RelationHeader::WithReplyJoin {
                relation_id,
                reply_joined_relation_id,
                is_reply,
            } => {
                // reserved bit (LSB) is always written as zero
                let word = (u16::from(relation_id) << 9)
                    | (u16::from(reply_joined_relation_id) << 2)
                    | (u16::from(is_reply) << 1);
                buf.put_u16(word);
            }
        }
        Ok(())
    }

    /// Reads a header of `layout`. The caller guarantees `layout.wire_len()` bytes remain.
    pub(crate) fn read_from<B: Buf>(buf: &mut B, layout: HeaderLayout) -> Self {
        match layout {
            HeaderLayout::RequestOnly => {
                let byte = buf.get_u8();
                RelationHeader::RequestOnly {
                    relation_id: byte >> 1,
                    aggregate: byte & 0x01 != 0,
                }
            }
            HeaderLayout::WithFlush => {
                let byte = buf.get_u8();
                RelationHeader::WithFlush {
                    relation_id: byte >> 2,
                    is_flush: byte & 0x02 != 0,
                    is_reply: byte & 0x01 != 0,
                }
            }
            HeaderLayout::WithReplyJoin => {
                let word = buf.get_u16();
                RelationHeader::WithReplyJoin {
                    relation_id: (word >> 9) as u8,
                    reply_joined_relation_id: ((word >> 2) & 0x7F) as u8,
                    is_reply: word & 0x02 != 0,
                }
            }
        }
    }
}

pub(crate) fn check_width(field: &'static str, value: u64, bits: u32) -> Result<()> {
    if value >> bits != 0 {
        return Err(ProtocolError::FieldOutOfRange { field, value, bits });
    }
    Ok(())
}
