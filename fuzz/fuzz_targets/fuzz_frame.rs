#![no_main]

use libfuzzer_sys::fuzz_target;
use myp4db_wire::{Frame, HeaderLayout};

fuzz_target!(|data: &[u8]| {
    // Fuzz full Ethernet frame parsing as seen by the receiver
    let _ = Frame::parse(data, HeaderLayout::WithReplyJoin);
    let _ = Frame::parse(data, HeaderLayout::RequestOnly);
});
