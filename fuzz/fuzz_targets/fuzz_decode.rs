#![no_main]

use libfuzzer_sys::fuzz_target;
use myp4db_wire::{decode, decode_prefix, HeaderLayout, IP_PROTO_MYP4DB};

fuzz_target!(|data: &[u8]| {
    // Relation stack decoding must never panic or loop, whatever the layout
    for layout in HeaderLayout::ALL {
        if let Ok(stack) = decode(data, IP_PROTO_MYP4DB, layout) {
            // Re-encoding clears the reserved bit, so compare decoded values
            let encoded = stack.encode().expect("decoded stack re-encodes");
            let again = decode(&encoded, IP_PROTO_MYP4DB, layout).expect("re-decodes");
            assert_eq!(again, stack);
        }
        if let Ok((_, consumed)) = decode_prefix(data, IP_PROTO_MYP4DB, layout) {
            assert!(consumed <= data.len());
        }
    }
});
