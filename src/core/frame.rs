//! Ethernet / IPv4 / UDP framing around a relation stack.
//!
//! ```text
//! [Ethernet(14)] [IPv4(20, proto 0xFA)] [Relation(1|2)] [Entry(12|20)]... [UDP(8)] [payload]
//! ```
//!
//! Parsing walks the layer bindings in [`crate::protocol::binding`]: the IPv4
//! protocol picks the relation header or a bare UDP datagram, and the entry
//! whose bottom-of-stack bit is set hands over to UDP.

use super::codec::{decode_prefix, encode_into, RelationStack};
use super::relation::HeaderLayout;
use crate::error::{MalformedHeader, ProtocolError, Result};
use crate::protocol::binding::{
    next_layer, Layer, Selector, ETHERTYPE_IPV4, IP_PROTO_MYP4DB, IP_PROTO_UDP,
};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const IPV4_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;

/// Largest IPv4 packet an emitted frame may carry.
pub const ETHERNET_MTU: usize = 1500;

/// Default TTL on emitted IPv4 headers.
pub const DEFAULT_TTL: u8 = 64;

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ProtocolError::ConfigError(format!("invalid MAC address: {s}"));
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddr(octets))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ether_type: u16,
}

impl EthernetHeader {
    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.dst.0);
        buf.put_slice(&self.src.0);
        buf.put_u16(self.ether_type);
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ETHERNET_HEADER_LEN {
            return Err(truncated("ethernet", ETHERNET_HEADER_LEN, bytes.len()));
        }
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&bytes[0..6]);
        src.copy_from_slice(&bytes[6..12]);
        Ok(Self {
            dst: MacAddr(dst),
            src: MacAddr(src),
            ether_type: u16::from_be_bytes([bytes[12], bytes[13]]),
        })
    }
}

/// IPv4 header without options. Options on captured frames are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ipv4Header {
    pub tos: u8,
    pub total_len: u16,
    pub identification: u16,
    pub flags_fragment: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8) -> Self {
        Self {
            tos: 0,
            total_len: IPV4_HEADER_LEN as u16,
            identification: 1,
            flags_fragment: 0,
            ttl: DEFAULT_TTL,
            protocol,
            checksum: 0,
            src,
            dst,
        }
    }

    fn header_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut out = [0u8; IPV4_HEADER_LEN];
        out[0] = 0x45;
        out[1] = self.tos;
        out[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        out[4..6].copy_from_slice(&self.identification.to_be_bytes());
        out[6..8].copy_from_slice(&self.flags_fragment.to_be_bytes());
        out[8] = self.ttl;
        out[9] = self.protocol;
        out[10..12].copy_from_slice(&self.checksum.to_be_bytes());
        out[12..16].copy_from_slice(&self.src.octets());
        out[16..20].copy_from_slice(&self.dst.octets());
        out
    }

    /// Returns the payload slice, trimmed to `total_len` (drops Ethernet padding).
    fn parse(bytes: &[u8]) -> Result<(Self, &[u8])> {
        if bytes.len() < IPV4_HEADER_LEN {
            return Err(truncated("ipv4", IPV4_HEADER_LEN, bytes.len()));
        }
        if bytes[0] >> 4 != 4 {
            return Err(MalformedHeader::InvalidIpv4Header("version is not 4").into());
        }
        let ihl = usize::from(bytes[0] & 0x0F) * 4;
        if ihl < IPV4_HEADER_LEN {
            return Err(MalformedHeader::InvalidIpv4Header("header length below 20").into());
        }
        let total_len = u16::from_be_bytes([bytes[2], bytes[3]]);
        let end = usize::from(total_len);
        if end < ihl {
            return Err(MalformedHeader::InvalidIpv4Header("total length below header length").into());
        }
        if end > bytes.len() {
            return Err(truncated("ipv4", end, bytes.len()));
        }

        let header = Self {
            tos: bytes[1],
            total_len,
            identification: u16::from_be_bytes([bytes[4], bytes[5]]),
            flags_fragment: u16::from_be_bytes([bytes[6], bytes[7]]),
            ttl: bytes[8],
            protocol: bytes[9],
            checksum: u16::from_be_bytes([bytes[10], bytes[11]]),
            src: Ipv4Addr::new(bytes[12], bytes[13], bytes[14], bytes[15]),
            dst: Ipv4Addr::new(bytes[16], bytes[17], bytes[18], bytes[19]),
        };
        Ok((header, &bytes[ihl..end]))
    }
}

/// UDP datagram following the bottom-of-stack entry.
///
/// The checksum is emitted as zero: the datagram does not sit directly on
/// IPv4, so there is no pseudo-header to cover it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UdpDatagram {
    pub src_port: u16,
    pub dst_port: u16,
    pub checksum: u16,
    #[serde(serialize_with = "serialize_payload")]
    pub payload: Vec<u8>,
}

impl UdpDatagram {
    pub fn new(src_port: u16, dst_port: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            src_port,
            dst_port,
            checksum: 0,
            payload: payload.into(),
        }
    }

    pub fn wire_len(&self) -> usize {
        UDP_HEADER_LEN + self.payload.len()
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        let len = u16::try_from(self.wire_len()).map_err(|_| ProtocolError::FieldOutOfRange {
            field: "udp.len",
            value: self.wire_len() as u64,
            bits: 16,
        })?;
        buf.put_u16(self.src_port);
        buf.put_u16(self.dst_port);
        buf.put_u16(len);
        buf.put_u16(self.checksum);
        buf.put_slice(&self.payload);
        Ok(())
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < UDP_HEADER_LEN {
            return Err(truncated("udp", UDP_HEADER_LEN, bytes.len()));
        }
        let len = usize::from(u16::from_be_bytes([bytes[4], bytes[5]]));
        let end = if (UDP_HEADER_LEN..=bytes.len()).contains(&len) {
            len
        } else {
            bytes.len()
        };
        Ok(Self {
            src_port: u16::from_be_bytes([bytes[0], bytes[1]]),
            dst_port: u16::from_be_bytes([bytes[2], bytes[3]]),
            checksum: u16::from_be_bytes([bytes[6], bytes[7]]),
            payload: bytes[UDP_HEADER_LEN..end].to_vec(),
        })
    }
}

fn serialize_payload<S: Serializer>(
    payload: &[u8],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(payload))
}

/// A full Ethernet frame as sent to or captured from the switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub ethernet: EthernetHeader,
    pub ipv4: Ipv4Header,
    pub relation: Option<RelationStack>,
    pub udp: Option<UdpDatagram>,
}

impl Frame {
    /// Builds a broadcast frame carrying `stack` and an optional UDP datagram.
    pub fn relation(
        src_mac: MacAddr,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        stack: RelationStack,
        udp: Option<UdpDatagram>,
    ) -> Self {
        Self {
            ethernet: EthernetHeader {
                dst: MacAddr::BROADCAST,
                src: src_mac,
                ether_type: ETHERTYPE_IPV4,
            },
            ipv4: Ipv4Header::new(src_ip, dst_ip, IP_PROTO_MYP4DB),
            relation: Some(stack),
            udp,
        }
    }

    /// Fills in the fields [`Frame::to_bytes`] computes: IPv4 length,
    /// protocol and checksum, and the bottom-of-stack bits of the relation.
    /// A finalized frame dumps exactly what goes on the wire.
    pub fn finalize(&mut self) -> Result<()> {
        self.relation = self.relation.take().map(RelationStack::with_bottom_of_stack);

        let total_len = IPV4_HEADER_LEN
            + self.relation.as_ref().map_or(0, RelationStack::wire_len)
            + self.udp.as_ref().map_or(0, UdpDatagram::wire_len);
        self.ipv4.total_len =
            u16::try_from(total_len).map_err(|_| ProtocolError::FieldOutOfRange {
                field: "ipv4.total_len",
                value: total_len as u64,
                bits: 16,
            })?;
        self.ipv4.protocol = match (&self.relation, &self.udp) {
            (Some(_), _) => IP_PROTO_MYP4DB,
            (None, Some(_)) => IP_PROTO_UDP,
            (None, None) => self.ipv4.protocol,
        };
        self.ipv4.checksum = 0;
        self.ipv4.checksum = internet_checksum(&self.ipv4.header_bytes());
        Ok(())
    }

    /// Serializes a finalized copy of the frame.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut frame = self.clone();
        frame.finalize()?;

        let mut out =
            BytesMut::with_capacity(ETHERNET_HEADER_LEN + usize::from(frame.ipv4.total_len));
        frame.ethernet.write_to(&mut out);
        out.put_slice(&frame.ipv4.header_bytes());
        if let Some(stack) = &frame.relation {
            encode_into(&stack.header, &stack.entries, &mut out)?;
        }
        if let Some(udp) = &frame.udp {
            udp.write_to(&mut out)?;
        }
        Ok(out.freeze())
    }

    /// Parses a captured frame. `layout` selects the relation header revision.
    pub fn parse(bytes: &[u8], layout: HeaderLayout) -> Result<Self> {
        let ethernet = EthernetHeader::parse(bytes)?;
        if next_layer(Layer::Ethernet, Selector::EtherType(ethernet.ether_type)) != Some(Layer::Ipv4)
        {
            return Err(MalformedHeader::UnexpectedEtherType(ethernet.ether_type).into());
        }

        let (ipv4, payload) = Ipv4Header::parse(&bytes[ETHERNET_HEADER_LEN..])?;
        let (relation, rest) = match next_layer(Layer::Ipv4, Selector::IpProtocol(ipv4.protocol)) {
            Some(Layer::Relation) => {
                let (stack, consumed) = decode_prefix(payload, ipv4.protocol, layout)?;
                (Some(stack), &payload[consumed..])
            }
            Some(Layer::Udp) => (None, payload),
            _ => return Err(MalformedHeader::UnexpectedProtocol(ipv4.protocol).into()),
        };

        let udp = if rest.is_empty() {
            None
        } else {
            Some(UdpDatagram::parse(rest)?)
        };

        Ok(Self {
            ethernet,
            ipv4,
            relation,
            udp,
        })
    }
}

/// RFC 1071 ones' complement checksum.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| match *pair {
            [hi, lo] => u32::from(u16::from_be_bytes([hi, lo])),
            [hi] => u32::from(hi) << 8,
            _ => 0,
        })
        .sum();
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

fn truncated(layer: &'static str, needed: usize, available: usize) -> ProtocolError {
    MalformedHeader::Truncated {
        layer,
        needed,
        available,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::Entry;
    use crate::core::relation::RelationHeader;

    fn sample_frame() -> Frame {
        let entries = vec![Entry::new(7, 1, 2).expect("entry"), Entry::new(8, 3, 4).expect("entry")];
        let stack = RelationStack::new(
            RelationHeader::request(HeaderLayout::WithReplyJoin, 1),
            entries,
        )
        .with_bottom_of_stack();
        Frame::relation(
            MacAddr([0x02, 0, 0, 0, 0, 0x01]),
            Ipv4Addr::new(10, 0, 1, 1),
            Ipv4Addr::new(10, 0, 2, 2),
            stack,
            Some(UdpDatagram::new(1234, 4321, "hello")),
        )
    }

    #[test]
    fn test_mac_addr_parse_and_display() {
        let mac: MacAddr = "02:00:0a:ff:10:01".parse().expect("valid mac");
        assert_eq!(mac.0, [0x02, 0x00, 0x0a, 0xff, 0x10, 0x01]);
        assert_eq!(mac.to_string(), "02:00:0a:ff:10:01");
        assert!("02:00:0a".parse::<MacAddr>().is_err());
        assert!("02:00:0a:ff:10:01:00".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_frame_layout_lengths() {
        let bytes = sample_frame().to_bytes().expect("serialize");
        assert_eq!(bytes.len(), 14 + 20 + 2 + 2 * 12 + 8 + 5);
        assert_eq!(&bytes[0..6], &[0xFF; 6]);
        assert_eq!(u16::from_be_bytes([bytes[12], bytes[13]]), 0x0800);
        assert_eq!(bytes[14 + 9], 0xFA);
        assert_eq!(u16::from_be_bytes([bytes[16], bytes[17]]), 20 + 2 + 24 + 13);
    }

    #[test]
    fn test_ipv4_checksum_verifies() {
        let bytes = sample_frame().to_bytes().expect("serialize");
        assert_eq!(internet_checksum(&bytes[14..34]), 0);
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = sample_frame();
        let bytes = frame.to_bytes().expect("serialize");
        let parsed = Frame::parse(&bytes, HeaderLayout::WithReplyJoin).expect("parse");

        assert_eq!(parsed.relation, frame.relation);
        assert_eq!(parsed.udp, frame.udp);
        assert_eq!(parsed.ethernet, frame.ethernet);
        assert_eq!(parsed.ipv4.src, frame.ipv4.src);
        assert_eq!(parsed.ipv4.protocol, 0xFA);
    }

    #[test]
    fn test_finalize_matches_wire() {
        let mut frame = sample_frame();
        let bytes = frame.to_bytes().expect("serialize");
        frame.finalize().expect("finalize");

        assert_eq!(frame.ipv4.total_len, u16::from_be_bytes([bytes[16], bytes[17]]));
        assert_eq!(frame.ipv4.checksum, u16::from_be_bytes([bytes[24], bytes[25]]));
        assert_eq!(frame.ipv4.protocol, bytes[23]);
        assert_eq!(frame.to_bytes().expect("serialize"), bytes);

        let parsed = Frame::parse(&bytes, HeaderLayout::WithReplyJoin).expect("parse");
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_finalize_sets_bottom_of_stack() {
        let stack = RelationStack::new(
            RelationHeader::request(HeaderLayout::RequestOnly, 2),
            vec![Entry::new(1, 0, 0).expect("entry"); 3],
        );
        let mut frame = Frame::relation(
            MacAddr::default(),
            Ipv4Addr::new(10, 0, 1, 1),
            Ipv4Addr::new(10, 0, 2, 2),
            stack,
            None,
        );
        frame.finalize().expect("finalize");
        let relation = frame.relation.expect("relation");
        assert_eq!(relation.entries.bottom_markers(), 1);
        assert_eq!(frame.ipv4.total_len, 20 + 1 + 3 * 12);
    }

    #[test]
    fn test_ethernet_padding_is_ignored() {
        let mut bytes = sample_frame().to_bytes().expect("serialize").to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        let parsed = Frame::parse(&bytes, HeaderLayout::WithReplyJoin).expect("parse");
        assert_eq!(parsed.udp.map(|udp| udp.payload), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_bare_udp_frame() {
        let frame = Frame {
            relation: None,
            ..sample_frame()
        };
        let bytes = frame.to_bytes().expect("serialize");
        assert_eq!(bytes[14 + 9], 17);

        let parsed = Frame::parse(&bytes, HeaderLayout::WithReplyJoin).expect("parse");
        assert!(parsed.relation.is_none());
        assert_eq!(parsed.udp.map(|udp| udp.dst_port), Some(4321));
    }

    #[test]
    fn test_rejects_non_ipv4() {
        let mut bytes = sample_frame().to_bytes().expect("serialize").to_vec();
        bytes[12] = 0x86;
        bytes[13] = 0xDD;
        let err = Frame::parse(&bytes, HeaderLayout::WithReplyJoin).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Malformed(MalformedHeader::UnexpectedEtherType(0x86DD))
        ));
    }

    #[test]
    fn test_rejects_unbound_protocol() {
        let mut bytes = sample_frame().to_bytes().expect("serialize").to_vec();
        bytes[14 + 9] = 6;
        let err = Frame::parse(&bytes, HeaderLayout::WithReplyJoin).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Malformed(MalformedHeader::UnexpectedProtocol(6))
        ));
    }
}
