#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Boundary conditions and error paths of the relation codec

use myp4db_wire::core::codec::{decode, decode_prefix, encode, RelationStack};
use myp4db_wire::core::entry::{Entry, EntryStack, ReplyEntry, MAX_ENTRY_ID};
use myp4db_wire::core::relation::{HeaderLayout, RelationHeader};
use myp4db_wire::error::{MalformedHeader, ProtocolError};
use myp4db_wire::IP_PROTO_MYP4DB;

fn one_entry() -> EntryStack {
    vec![Entry::new(1, 2, 3).unwrap()].into()
}

// ============================================================================
// DECODE ERRORS
// ============================================================================

#[test]
fn test_decode_rejects_other_ip_protocols() {
    let header = RelationHeader::request(HeaderLayout::RequestOnly, 1);
    let bytes = encode(&header, &one_entry()).unwrap();

    for proto in [0u8, 6, 17, 0xFB, 0xFF] {
        let err = decode(&bytes, proto, HeaderLayout::RequestOnly).unwrap_err();
        assert!(
            matches!(err, ProtocolError::Malformed(MalformedHeader::UnexpectedProtocol(p)) if p == proto),
            "protocol {proto} must be rejected"
        );
    }
}

#[test]
fn test_decode_empty_buffer() {
    let err = decode(&[], IP_PROTO_MYP4DB, HeaderLayout::WithReplyJoin).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Malformed(MalformedHeader::Truncated {
            needed: 2,
            available: 0,
            ..
        })
    ));
}

#[test]
fn test_decode_header_without_entries() {
    let err = decode(&[0x02], IP_PROTO_MYP4DB, HeaderLayout::RequestOnly).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Malformed(MalformedHeader::MissingBottomOfStack { entries: 0 })
    ));
}

#[test]
fn test_decode_misaligned_entry_region() {
    let header = RelationHeader::request(HeaderLayout::RequestOnly, 1);
    let mut bytes = encode(&header, &one_entry()).unwrap().to_vec();
    bytes.push(0);

    let err = decode(&bytes, IP_PROTO_MYP4DB, HeaderLayout::RequestOnly).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Malformed(MalformedHeader::MisalignedEntries { len: 13, width: 12 })
    ));
}

#[test]
fn test_decode_runaway_stack() {
    // header + three records, none with bos set
    let mut bytes = vec![0x02];
    bytes.extend_from_slice(&[0u8; 36]);
    let err = decode(&bytes, IP_PROTO_MYP4DB, HeaderLayout::RequestOnly).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Malformed(MalformedHeader::MissingBottomOfStack { entries: 3 })
    ));
}

#[test]
fn test_decode_prefix_runaway_into_trailer() {
    // bos never set, the "UDP" bytes are too short to form another record
    let mut bytes = vec![0x02];
    bytes.extend_from_slice(&[0u8; 12]);
    bytes.extend_from_slice(b"udp");
    let err = decode_prefix(&bytes, IP_PROTO_MYP4DB, HeaderLayout::RequestOnly).unwrap_err();
    assert!(err.is_malformed());
}

#[test]
fn test_layout_decides_header_width() {
    let header = RelationHeader::request(HeaderLayout::WithReplyJoin, 1);
    let bytes = encode(&header, &one_entry()).unwrap();
    assert_eq!(bytes.len(), 14);

    // reading the same bytes with a one-byte layout leaves the entry region misaligned
    let err = decode(&bytes, IP_PROTO_MYP4DB, HeaderLayout::RequestOnly).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Malformed(MalformedHeader::MisalignedEntries { len: 13, .. })
    ));
}

// ============================================================================
// ENCODE ERRORS
// ============================================================================

#[test]
fn test_entry_id_out_of_range_rejects_batch() {
    let header = RelationHeader::request(HeaderLayout::RequestOnly, 1);
    let entries = vec![
        Entry::new(1, 0, 0).unwrap(),
        Entry {
            bos: false,
            entry_id: MAX_ENTRY_ID + 1,
            second_attr: 0,
            third_attr: 0,
        },
        Entry::new(3, 0, 0).unwrap(),
    ];
    let err = encode(&header, &entries.into()).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::FieldOutOfRange {
            field: "entryId",
            bits: 31,
            ..
        }
    ));
}

#[test]
fn test_relation_id_out_of_range_per_layout() {
    let cases = [
        (HeaderLayout::RequestOnly, 128u8, 7u32),
        (HeaderLayout::WithFlush, 64, 6),
        (HeaderLayout::WithReplyJoin, 128, 7),
    ];
    for (layout, relation_id, bits) in cases {
        let header = RelationHeader::request(layout, relation_id);
        let err = encode(&header, &one_entry()).unwrap_err();
        assert!(
            matches!(err, ProtocolError::FieldOutOfRange { field: "relationId", bits: b, .. } if b == bits),
            "{layout} should reject relationId {relation_id}"
        );
    }
}

#[test]
fn test_max_values_survive() {
    let header = RelationHeader::WithReplyJoin {
        relation_id: 127,
        reply_joined_relation_id: 127,
        is_reply: true,
    };
    let replies = vec![
        ReplyEntry::new(MAX_ENTRY_ID, i32::MIN, i32::MAX, -1, 0).unwrap(),
        ReplyEntry::new(0, 0, 0, i32::MAX, i32::MIN).unwrap(),
    ];
    let stack = RelationStack::new(header, replies);
    let bytes = stack.encode().unwrap();

    let decoded = decode(&bytes, IP_PROTO_MYP4DB, HeaderLayout::WithReplyJoin).unwrap();
    assert_eq!(decoded, stack.with_bottom_of_stack());
}

#[test]
fn test_caller_bos_values_are_overridden() {
    let header = RelationHeader::request(HeaderLayout::WithFlush, 5);
    let entries: Vec<Entry> = (0..4)
        .map(|i| Entry {
            bos: i % 2 == 0,
            entry_id: i,
            second_attr: 0,
            third_attr: 0,
        })
        .collect();
    let bytes = encode(&header, &entries.into()).unwrap();

    let decoded = decode(&bytes, IP_PROTO_MYP4DB, HeaderLayout::WithFlush).unwrap();
    let EntryStack::Tuples(decoded) = decoded.entries else {
        panic!("expected tuples");
    };
    let bos: Vec<bool> = decoded.iter().map(|e| e.bos).collect();
    assert_eq!(bos, vec![false, false, false, true]);
}

#[test]
fn test_single_entry_stack() {
    let header = RelationHeader::request(HeaderLayout::RequestOnly, 0);
    let bytes = encode(&header, &one_entry()).unwrap();
    assert_eq!(bytes[1] & 0x80, 0x80);

    let decoded = decode(&bytes, IP_PROTO_MYP4DB, HeaderLayout::RequestOnly).unwrap();
    assert_eq!(decoded.entries.len(), 1);
    assert_eq!(decoded.entries.bottom_markers(), 1);
}
