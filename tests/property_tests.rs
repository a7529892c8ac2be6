//! Property-based tests using proptest
//!
//! Codec invariants across randomly generated headers and entry stacks.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use myp4db_wire::core::codec::{decode, decode_prefix, encode, RelationStack};
use myp4db_wire::core::entry::{Entry, EntryStack, ReplyEntry, MAX_ENTRY_ID};
use myp4db_wire::core::relation::{HeaderLayout, RelationHeader};
use myp4db_wire::IP_PROTO_MYP4DB;
use proptest::prelude::*;

fn entry_strategy() -> impl Strategy<Value = Entry> {
    (any::<bool>(), 0..=MAX_ENTRY_ID, any::<i32>(), any::<i32>()).prop_map(
        |(bos, entry_id, second_attr, third_attr)| Entry {
            bos,
            entry_id,
            second_attr,
            third_attr,
        },
    )
}

fn reply_strategy() -> impl Strategy<Value = ReplyEntry> {
    (entry_strategy(), any::<i32>(), any::<i32>()).prop_map(|(entry, forth_attr, fifth_attr)| {
        ReplyEntry {
            entry,
            forth_attr,
            fifth_attr,
        }
    })
}

fn header_strategy() -> impl Strategy<Value = RelationHeader> {
    prop_oneof![
        (0u8..128, any::<bool>()).prop_map(|(relation_id, aggregate)| {
            RelationHeader::RequestOnly {
                relation_id,
                aggregate,
            }
        }),
        (0u8..64, any::<bool>(), any::<bool>()).prop_map(|(relation_id, is_flush, is_reply)| {
            RelationHeader::WithFlush {
                relation_id,
                is_flush,
                is_reply,
            }
        }),
        (0u8..128, 0u8..128, any::<bool>()).prop_map(
            |(relation_id, reply_joined_relation_id, is_reply)| RelationHeader::WithReplyJoin {
                relation_id,
                reply_joined_relation_id,
                is_reply,
            }
        ),
    ]
}

/// A header with an entry stack of the matching shape.
fn stack_strategy() -> impl Strategy<Value = RelationStack> {
    header_strategy().prop_flat_map(|header| {
        if header.is_reply() {
            prop::collection::vec(reply_strategy(), 1..32)
                .prop_map(move |entries| RelationStack::new(header, entries))
                .boxed()
        } else {
            prop::collection::vec(entry_strategy(), 1..32)
                .prop_map(move |entries| RelationStack::new(header, entries))
                .boxed()
        }
    })
}

fn bos_bits(stack: &EntryStack) -> Vec<bool> {
    match stack {
        EntryStack::Tuples(entries) => entries.iter().map(|e| e.bos).collect(),
        EntryStack::Replies(entries) => entries.iter().map(|e| e.entry.bos).collect(),
    }
}

// Property: decode(encode(h, entries)) returns h and the entries with only the last bos set
proptest! {
    #[test]
    fn prop_stack_roundtrip(stack in stack_strategy()) {
        let layout = stack.header.layout();
        let bytes = encode(&stack.header, &stack.entries).expect("in-range stack encodes");
        let decoded = decode(&bytes, IP_PROTO_MYP4DB, layout).expect("encoded stack decodes");

        prop_assert_eq!(decoded, stack.with_bottom_of_stack());
    }
}

// Property: exactly one bottom-of-stack marker, on the last record
proptest! {
    #[test]
    fn prop_single_terminal_bos(stack in stack_strategy()) {
        let bytes = encode(&stack.header, &stack.entries).expect("encode");
        let decoded = decode(&bytes, IP_PROTO_MYP4DB, stack.header.layout()).expect("decode");

        let bits = bos_bits(&decoded.entries);
        prop_assert_eq!(bits.iter().filter(|&&b| b).count(), 1);
        prop_assert_eq!(bits.last().copied(), Some(true));
    }
}

// Property: encoded size is header width plus fixed-width records
proptest! {
    #[test]
    fn prop_encoded_size_accurate(stack in stack_strategy()) {
        let bytes = encode(&stack.header, &stack.entries).expect("encode");
        prop_assert_eq!(bytes.len(), stack.wire_len());
    }
}

// Property: any protocol number other than 0xFA is rejected
proptest! {
    #[test]
    fn prop_foreign_protocol_rejected(stack in stack_strategy(), proto in any::<u8>()) {
        prop_assume!(proto != IP_PROTO_MYP4DB);
        let bytes = encode(&stack.header, &stack.entries).expect("encode");
        let result = decode(&bytes, proto, stack.header.layout());
        prop_assert!(result.map_err(|e| e.is_malformed()).err().unwrap_or(false));
    }
}

// Property: every strict prefix of an encoded stack fails to decode
proptest! {
    #[test]
    fn prop_truncation_never_decodes(stack in stack_strategy(), cut in any::<prop::sample::Index>()) {
        let bytes = encode(&stack.header, &stack.entries).expect("encode");
        let len = cut.index(bytes.len());
        let result = decode(&bytes[..len], IP_PROTO_MYP4DB, stack.header.layout());
        prop_assert!(result.is_err());
    }
}

// Property: decoding arbitrary bytes never panics
proptest! {
    #[test]
    fn prop_decode_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..512)) {
        for layout in HeaderLayout::ALL {
            let _ = decode(&data, IP_PROTO_MYP4DB, layout);
            let _ = decode_prefix(&data, IP_PROTO_MYP4DB, layout);
        }
    }
}

// Property: entry ids wider than 31 bits are rejected, never truncated
proptest! {
    #[test]
    fn prop_wide_entry_id_rejected(entry_id in (MAX_ENTRY_ID + 1)..=u32::MAX) {
        prop_assert!(Entry::new(entry_id, 0, 0).is_err());

        let header = RelationHeader::request(HeaderLayout::RequestOnly, 1);
        let entry = Entry { bos: false, entry_id, second_attr: 0, third_attr: 0 };
        prop_assert!(encode(&header, &vec![entry].into()).is_err());
    }
}
