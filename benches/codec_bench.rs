use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use myp4db_wire::core::codec::{decode, RelationCodec, RelationStack};
use myp4db_wire::core::entry::{Entry, ReplyEntry};
use myp4db_wire::core::frame::{Frame, MacAddr, UdpDatagram};
use myp4db_wire::core::relation::{HeaderLayout, RelationHeader};
use myp4db_wire::IP_PROTO_MYP4DB;
use std::net::Ipv4Addr;
use tokio_util::codec::{Decoder, Encoder};

#[allow(clippy::unwrap_used)]
fn request_stack(entries: u32) -> RelationStack {
    let entries: Vec<Entry> = (0..entries)
        .map(|i| Entry::new(i, i as i32, -(i as i32)).unwrap())
        .collect();
    RelationStack::new(
        RelationHeader::request(HeaderLayout::WithReplyJoin, 1),
        entries,
    )
}

#[allow(clippy::unwrap_used)]
fn bench_stack_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack_encode_decode");
    let stack_sizes = [1u32, 10, 100];

    for &size in &stack_sizes {
        let stack = request_stack(size);
        group.throughput(Throughput::Bytes(stack.wire_len() as u64));

        group.bench_function(format!("encode_{size}_entries"), |b| {
            b.iter_batched(
                || stack.clone(),
                |stack| {
                    let mut buf = BytesMut::with_capacity(stack.wire_len());
                    let mut codec = RelationCodec::new(HeaderLayout::WithReplyJoin);
                    codec.encode(stack, &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });

        let bytes = stack.encode().unwrap();
        group.bench_function(format!("decode_{size}_entries"), |b| {
            b.iter(|| {
                let decoded = decode(&bytes, IP_PROTO_MYP4DB, HeaderLayout::WithReplyJoin);
                assert!(decoded.is_ok());
            })
        });

        group.bench_function(format!("stream_decode_{size}_entries"), |b| {
            b.iter_batched(
                || BytesMut::from(&bytes[..]),
                |mut buf| {
                    let mut codec = RelationCodec::new(HeaderLayout::WithReplyJoin);
                    assert!(codec.decode(&mut buf).unwrap().is_some());
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_frame_roundtrip(c: &mut Criterion) {
    let replies: Vec<ReplyEntry> = (0..10)
        .map(|i| ReplyEntry::new(i, 1, 2, 3, 4).unwrap())
        .collect();
    let header = RelationHeader::WithReplyJoin {
        relation_id: 1,
        reply_joined_relation_id: 2,
        is_reply: true,
    };
    let frame = Frame::relation(
        MacAddr::default(),
        Ipv4Addr::new(10, 0, 1, 1),
        Ipv4Addr::new(10, 0, 2, 2),
        RelationStack::new(header, replies),
        Some(UdpDatagram::new(1234, 4321, "bench")),
    );

    c.bench_function("frame_to_bytes", |b| {
        b.iter(|| frame.to_bytes().unwrap())
    });

    let wire = frame.to_bytes().unwrap();
    c.bench_function("frame_parse", |b| {
        b.iter(|| Frame::parse(&wire, HeaderLayout::WithReplyJoin).unwrap())
    });
}

criterion_group!(benches, bench_stack_encode_decode, bench_frame_roundtrip);
criterion_main!(benches);
