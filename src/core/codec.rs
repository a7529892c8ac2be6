//! # Relation Stack Codec
//!
//! Encodes a relation header plus its entry stack, and decodes it back.
//!
//! The stack has no length field. Every record carries a bottom-of-stack
//! bit and the chain ends at the first record that sets it. The encoder
//! forces that bit on the last record and clears it on all others, so an
//! encoded stack always has exactly one terminator.
//!
//! Which entry shape follows the header is decided by the header's
//! `isReply` flag: [`ReplyEntry`] when set, [`Entry`] otherwise.

use super::entry::{Entry, EntryStack, ReplyEntry, StackRecord};
use super::relation::{HeaderLayout, RelationHeader};
use crate::config::MAX_FRAME_SIZE;
use crate::error::{MalformedHeader, ProtocolError, Result};
use crate::protocol::binding::{next_layer, Layer, Selector, IP_PROTO_MYP4DB};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

/// A decoded relation: its header and the entries that followed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationStack {
    pub header: RelationHeader,
    pub entries: EntryStack,
}

impl RelationStack {
    pub fn new(header: RelationHeader, entries: impl Into<EntryStack>) -> Self {
        Self {
            header,
            entries: entries.into(),
        }
    }

    /// Sets `bos` the way [`encode`] writes it: on the last entry only.
    pub fn with_bottom_of_stack(mut self) -> Self {
        match &mut self.entries {
            EntryStack::Tuples(entries) => mark_bottom(entries),
            EntryStack::Replies(entries) => mark_bottom(entries),
        }
        self
    }

    /// Encoded size in bytes.
    pub fn wire_len(&self) -> usize {
        self.header.layout().wire_len() + self.entries.len() * self.entries.record_len()
    }

    pub fn encode(&self) -> Result<Bytes> {
        encode(&self.header, &self.entries)
    }
}

fn mark_bottom<R: StackRecord>(records: &mut [R]) {
    let last = records.len().saturating_sub(1);
    for (index, record) in records.iter_mut().enumerate() {
        record.set_bos(index == last);
    }
}

/// Encodes a relation header followed by its entries.
///
/// The last entry gets `bos = 1` and every other entry `bos = 0`,
/// regardless of the values the caller supplied. Nothing is truncated:
/// any field that does not fit its width rejects the whole relation.
pub fn encode(relation: &RelationHeader, entries: &EntryStack) -> Result<Bytes> {
    let mut buf =
        BytesMut::with_capacity(relation.layout().wire_len() + entries.len() * entries.record_len());
    encode_into(relation, entries, &mut buf)?;
    Ok(buf.freeze())
}

/// Like [`encode`], appending to `buf`. On error nothing is written.
pub fn encode_into<B: BufMut>(
    relation: &RelationHeader,
    entries: &EntryStack,
    buf: &mut B,
) -> Result<()> {
    relation.validate()?;
    if entries.is_empty() {
        return Err(ProtocolError::EmptyStack);
    }
    if relation.is_reply() != entries.is_reply() {
        return Err(ProtocolError::ShapeMismatch {
            is_reply: relation.is_reply(),
            entries: entries.shape_name(),
        });
    }
    match entries {
        EntryStack::Tuples(records) => validate_all(records)?,
        EntryStack::Replies(records) => validate_all(records)?,
    }

    relation.write_to(buf)?;
    match entries {
        EntryStack::Tuples(records) => put_stack(records, buf),
        EntryStack::Replies(records) => put_stack(records, buf),
    }
    Ok(())
}

fn validate_all<R: StackRecord>(records: &[R]) -> Result<()> {
    records.iter().try_for_each(|record| record.validate())
}

fn put_stack<R: StackRecord + Copy, B: BufMut>(records: &[R], buf: &mut B) {
    let last = records.len() - 1;
    for (index, record) in records.iter().enumerate() {
        let mut record = *record;
        record.set_bos(index == last);
        record.write_to(buf);
    }
}

/// Decodes a buffer that holds exactly one relation stack.
///
/// `ip_protocol` is the protocol number of the enclosing IPv4 header and must
/// be `0xFA`. The buffer must end right after the bottom-of-stack record.
pub fn decode(bytes: &[u8], ip_protocol: u8, layout: HeaderLayout) -> Result<RelationStack> {
    let header = read_header(bytes, ip_protocol, layout)?;
    let region = bytes.len() - layout.wire_len();
    let width = record_len(&header);
    if region % width != 0 {
        return Err(MalformedHeader::MisalignedEntries { len: region, width }.into());
    }

    let (stack, consumed) = decode_prefix(bytes, ip_protocol, layout)?;
    if consumed != bytes.len() {
        return Err(MalformedHeader::TrailingBytes(bytes.len() - consumed).into());
    }
    Ok(stack)
}

/// Decodes the relation stack at the start of `bytes` and returns it with
/// the number of bytes consumed. Whatever follows the bottom-of-stack record
/// (normally a UDP datagram) is left to the caller.
pub fn decode_prefix(
    bytes: &[u8],
    ip_protocol: u8,
    layout: HeaderLayout,
) -> Result<(RelationStack, usize)> {
    let header = read_header(bytes, ip_protocol, layout)?;
    let mut rest = &bytes[layout.wire_len()..];

    let entries = if header.is_reply() {
        EntryStack::Replies(walk_stack::<ReplyEntry>(&mut rest)?)
    } else {
        EntryStack::Tuples(walk_stack::<Entry>(&mut rest)?)
    };

    trace!(
        relation_id = header.relation_id(),
        entries = entries.len(),
        shape = entries.shape_name(),
        "decoded relation stack"
    );
    let consumed = bytes.len() - rest.len();
    Ok((RelationStack { header, entries }, consumed))
}

fn read_header(bytes: &[u8], ip_protocol: u8, layout: HeaderLayout) -> Result<RelationHeader> {
    if ip_protocol != IP_PROTO_MYP4DB {
        return Err(MalformedHeader::UnexpectedProtocol(ip_protocol).into());
    }
    if bytes.len() < layout.wire_len() {
        return Err(MalformedHeader::Truncated {
            layer: "relation header",
            needed: layout.wire_len(),
            available: bytes.len(),
        }
        .into());
    }
    let mut head = bytes;
    Ok(RelationHeader::read_from(&mut head, layout))
}

fn record_len(header: &RelationHeader) -> usize {
    if header.is_reply() {
        ReplyEntry::WIRE_LEN
    } else {
        Entry::WIRE_LEN
    }
}

fn walk_stack<R: StackRecord>(buf: &mut &[u8]) -> Result<Vec<R>> {
    let mut records = Vec::new();
    loop {
        if buf.remaining() < R::WIRE_LEN {
            return Err(MalformedHeader::MissingBottomOfStack {
                entries: records.len(),
            }
            .into());
        }
        let record = R::read_from(buf);
        let bos = record.bos();
        records.push(record);
        if next_layer(Layer::Entry, Selector::BottomOfStack(bos)) != Some(Layer::Entry) {
            return Ok(records);
        }
    }
}

/// Streaming codec for back-to-back relation stacks.
///
/// `decode` waits until a bottom-of-stack record is buffered, up to
/// `max_stack_len` bytes; past that the stream is rejected. At end of
/// stream a dangling partial stack is reported as malformed.
#[derive(Debug, Clone, Copy)]
pub struct RelationCodec {
    layout: HeaderLayout,
    max_stack_len: usize,
}

impl Default for RelationCodec {
    fn default() -> Self {
        Self::new(HeaderLayout::default())
    }
}

impl RelationCodec {
    pub fn new(layout: HeaderLayout) -> Self {
        Self {
            layout,
            max_stack_len: MAX_FRAME_SIZE,
        }
    }

    /// Caps the bytes one stack may span, header included.
    pub fn with_max_stack_len(mut self, max_stack_len: usize) -> Self {
        self.max_stack_len = max_stack_len;
        self
    }

    pub fn layout(&self) -> HeaderLayout {
        self.layout
    }

    pub fn max_stack_len(&self) -> usize {
        self.max_stack_len
    }

    fn oversized(&self, len: usize) -> ProtocolError {
        MalformedHeader::OversizedStack {
            len,
            limit: self.max_stack_len,
        }
        .into()
    }
}

impl Decoder for RelationCodec {
    type Item = RelationStack;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // only the first max_stack_len bytes can hold a stack we accept
        let window = &src[..src.len().min(self.max_stack_len)];
        match decode_prefix(window, IP_PROTO_MYP4DB, self.layout) {
            Ok((stack, consumed)) => {
                src.advance(consumed);
                Ok(Some(stack))
            }
            Err(ProtocolError::Malformed(
                MalformedHeader::MissingBottomOfStack { .. } | MalformedHeader::Truncated { .. },
            )) if src.len() >= self.max_stack_len => {
                warn!(
                    buffered = src.len(),
                    limit = self.max_stack_len,
                    "relation stack exceeds limit"
                );
                Err(self.oversized(src.len()))
            }
            Err(ProtocolError::Malformed(
                MalformedHeader::MissingBottomOfStack { .. } | MalformedHeader::Truncated { .. },
            )) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }
        if let Some(stack) = self.decode(src)? {
            return Ok(Some(stack));
        }
        // a partial stack under the limit: surface why it is incomplete
        let (stack, consumed) = decode_prefix(&src[..], IP_PROTO_MYP4DB, self.layout)?;
        src.advance(consumed);
        Ok(Some(stack))
    }
}

impl Encoder<RelationStack> for RelationCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: RelationStack, dst: &mut BytesMut) -> Result<()> {
        if item.header.layout() != self.layout {
            return Err(ProtocolError::ConfigError(format!(
                "codec speaks {} but header is {}",
                self.layout,
                item.header.layout()
            )));
        }
        dst.reserve(item.wire_len());
        encode_into(&item.header, &item.entries, dst)
    }
}
