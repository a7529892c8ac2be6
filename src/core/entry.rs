//! Entry records that make up a relation's tuple stack.
//!
//! ```text
//! Entry       [bos:1][entryId:31][secondAttr:32][thirdAttr:32]                           12 bytes
//! ReplyEntry  [bos:1][entryId:31][secondAttr:32][thirdAttr:32][forthAttr:32][fifthAttr:32] 20 bytes
//! ```

use super::relation::check_width;
use crate::error::Result;
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

/// Largest `entryId` that fits in 31 bits.
pub const MAX_ENTRY_ID: u32 = (1 << 31) - 1;

const BOS_BIT: u32 = 1 << 31;

/// A fixed-width record in a bottom-of-stack chain.
pub trait StackRecord: Sized {
    /// Encoded size in bytes.
    const WIRE_LEN: usize;
    /// Shape name used in errors and dumps.
    const NAME: &'static str;

    fn bos(&self) -> bool;
    fn set_bos(&mut self, bos: bool);

    /// Checks field ranges without writing anything.
    fn validate(&self) -> Result<()>;

    /// Writes the record. Fields must already be validated.
    fn write_to<B: BufMut>(&self, buf: &mut B);

    /// Reads one record. The caller guarantees `WIRE_LEN` bytes remain.
    fn read_from<B: Buf>(buf: &mut B) -> Self;
}

/// One tuple of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    pub bos: bool,
    pub entry_id: u32,
    pub second_attr: i32,
    pub third_attr: i32,
}

impl Entry {
    /// Builds an entry, rejecting an `entry_id` wider than 31 bits.
    pub fn new(entry_id: u32, second_attr: i32, third_attr: i32) -> Result<Self> {
        let entry = Self {
            bos: false,
            entry_id,
            second_attr,
            third_attr,
        };
        entry.validate()?;
        Ok(entry)
    }
}

impl StackRecord for Entry {
    const WIRE_LEN: usize = 12;
    const NAME: &'static str = "DBEntry";

    fn bos(&self) -> bool {
        self.bos
    }

    fn set_bos(&mut self, bos: bool) {
        self.bos = bos;
    }

    fn validate(&self) -> Result<()> {
        check_width("entryId", u64::from(self.entry_id), 31)
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        let bos = if self.bos { BOS_BIT } else { 0 };
        let head = bos | (self.entry_id & MAX_ENTRY_ID);
        buf.put_u32(head);
        buf.put_i32(self.second_attr);
        buf.put_i32(self.third_attr);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let head = buf.get_u32();
        Self {
            bos: head & BOS_BIT != 0,
            entry_id: head & MAX_ENTRY_ID,
            second_attr: buf.get_i32(),
            third_attr: buf.get_i32(),
        }
    }
}

/// A tuple returned by the switch in answer to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplyEntry {
    #[serde(flatten)]
    pub entry: Entry,
    pub forth_attr: i32,
    pub fifth_attr: i32,
}

impl ReplyEntry {
    pub fn new(
        entry_id: u32,
        second_attr: i32,
        third_attr: i32,
        forth_attr: i32,
        fifth_attr: i32,
    ) -> Result<Self> {
        Ok(Self {
            entry: Entry::new(entry_id, second_attr, third_attr)?,
            forth_attr,
            fifth_attr,
        })
    }
}

impl StackRecord for ReplyEntry {
    const WIRE_LEN: usize = 20;
    const NAME: &'static str = "DBReplyEntry";

    fn bos(&self) -> bool {
        self.entry.bos
    }

    fn set_bos(&mut self, bos: bool) {
        self.entry.bos = bos;
    }

    fn validate(&self) -> Result<()> {
        self.entry.validate()
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        self.entry.write_to(buf);
        buf.put_i32(self.forth_attr);
        buf.put_i32(self.fifth_attr);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let entry = Entry::read_from(buf);
        Self {
            entry,
            forth_attr: buf.get_i32(),
            fifth_attr: buf.get_i32(),
        }
    }
}

/// The entries of one relation, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "entries", rename_all = "snake_case")]
pub enum EntryStack {
    Tuples(Vec<Entry>),
    Replies(Vec<ReplyEntry>),
}

impl EntryStack {
    pub fn len(&self) -> usize {
        match self {
            EntryStack::Tuples(entries) => entries.len(),
            EntryStack::Replies(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, EntryStack::Replies(_))
    }

    /// Per-record wire width of this shape.
    pub fn record_len(&self) -> usize {
        match self {
            EntryStack::Tuples(_) => Entry::WIRE_LEN,
            EntryStack::Replies(_) => ReplyEntry::WIRE_LEN,
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            EntryStack::Tuples(_) => Entry::NAME,
            EntryStack::Replies(_) => ReplyEntry::NAME,
        }
    }

    /// Number of records with `bos` set.
    pub fn bottom_markers(&self) -> usize {
        match self {
            EntryStack::Tuples(entries) => entries.iter().filter(|e| e.bos()).count(),
            EntryStack::Replies(entries) => entries.iter().filter(|e| e.bos()).count(),
        }
    }
}

impl From<Vec<Entry>> for EntryStack {
    fn from(entries: Vec<Entry>) -> Self {
        EntryStack::Tuples(entries)
    }
}

impl From<Vec<ReplyEntry>> for EntryStack {
    fn from(entries: Vec<ReplyEntry>) -> Self {
        EntryStack::Replies(entries)
    }
}
