//! Relation generation and transmission.
//!
//! A [`RelationGenerator`] samples a fixed set of distinct entity ids once;
//! every relation it produces draws from that set, so two relations share
//! join keys. [`Sender`] wraps relations in broadcast frames and puts them
//! on the wire.

use crate::config::SenderConfig;
use crate::core::codec::RelationStack;
use crate::core::entry::Entry;
use crate::core::frame::{Frame, MacAddr, UdpDatagram, ETHERNET_MTU, IPV4_HEADER_LEN};
use crate::core::relation::RelationHeader;
use crate::error::{ProtocolError, Result};
use crate::transport::{find_interface, interface_ipv4, interface_mac, RawSocket};
use crate::utils::Metrics;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Builds relations of random tuples over a shared entity id pool.
pub struct RelationGenerator<R: Rng> {
    rng: R,
    entity_ids: Vec<u32>,
    config: SenderConfig,
}

impl RelationGenerator<StdRng> {
    pub fn from_os_rng(config: &SenderConfig) -> Result<Self> {
        Self::new(config, StdRng::from_os_rng())
    }
}

impl<R: Rng> RelationGenerator<R> {
    pub fn new(config: &SenderConfig, mut rng: R) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ProtocolError::ConfigError(errors.join("; ")));
        }

        let entity_ids = index::sample(&mut rng, config.entity_id_space as usize, config.entries)
            .into_iter()
            .map(|id| id as u32)
            .collect();

        Ok(Self {
            rng,
            entity_ids,
            config: config.clone(),
        })
    }

    /// The entity ids every relation starts from.
    pub fn entity_ids(&self) -> &[u32] {
        &self.entity_ids
    }

    /// Generates one relation. With `pick_random_entity_id`, each entry
    /// replaces its pooled id with a fresh random one half of the time.
    ///
    /// A field that does not fit its width fails the whole relation.
    pub fn generate(&mut self, relation_id: u8, pick_random_entity_id: bool) -> Result<RelationStack> {
        let header = RelationHeader::request(self.config.layout, relation_id);
        header.validate()?;

        let mut entries = Vec::with_capacity(self.entity_ids.len());
        for &pooled in &self.entity_ids {
            let entity_id = if pick_random_entity_id && !self.rng.random_bool(0.5) {
                self.rng.random_range(0..=self.config.entity_id_space)
            } else {
                pooled
            };
            let second_attr = self.rng.random_range(0..=self.config.attr_max);
            let third_attr = self.rng.random_range(0..=self.config.attr_max);
            entries.push(Entry::new(entity_id, second_attr, third_attr)?);
        }

        debug!(relation_id, entries = entries.len(), "generated relation");
        Ok(RelationStack::new(header, entries).with_bottom_of_stack())
    }
}

/// Resolves a host name or dotted quad to an IPv4 address.
pub fn resolve_destination(host: &str) -> Result<Ipv4Addr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }
    (host, 0)
        .to_socket_addrs()?
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| ProtocolError::ConfigError(format!("no IPv4 address for {host}")))
}

/// Wraps a relation in a finalized broadcast frame followed by a UDP message.
///
/// Fails when the IPv4 packet, message included, does not fit the MTU.
pub fn build_frame(
    config: &SenderConfig,
    src_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    stack: RelationStack,
    message: &str,
) -> Result<Frame> {
    let udp = UdpDatagram::new(config.udp_src_port, config.udp_dst_port, message.as_bytes());
    let packet_len = IPV4_HEADER_LEN + stack.wire_len() + udp.wire_len();
    if packet_len > ETHERNET_MTU {
        return Err(ProtocolError::OversizedPacket {
            size: packet_len,
            limit: ETHERNET_MTU,
        });
    }

    let mut frame = Frame::relation(src_mac, src_ip, dst_ip, stack, Some(udp));
    frame.finalize()?;
    Ok(frame)
}

/// Transmits relation frames on one interface.
pub struct Sender {
    socket: RawSocket,
    src_mac: MacAddr,
    src_ip: Ipv4Addr,
    config: SenderConfig,
    metrics: Arc<Metrics>,
}

impl Sender {
    /// Finds the configured interface and opens a raw socket on it.
    pub fn open(config: &SenderConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let interface = find_interface(&config.interface)?;
        let src_mac = interface_mac(&interface)?;
        let src_ip = interface_ipv4(&interface).unwrap_or(Ipv4Addr::UNSPECIFIED);
        let socket = RawSocket::bind(&interface)?;
        info!(interface = %interface, %src_mac, %src_ip, "sender ready");

        Ok(Self {
            socket,
            src_mac,
            src_ip,
            config: config.clone(),
            metrics,
        })
    }

    pub fn frame(&self, dst_ip: Ipv4Addr, stack: RelationStack, message: &str) -> Result<Frame> {
        build_frame(&self.config, self.src_mac, self.src_ip, dst_ip, stack, message)
    }

    /// Sends `frame`, then waits the configured inter-packet delay.
    #[instrument(skip(self, frame), fields(interface = %self.socket.interface()))]
    pub async fn transmit(&self, frame: &Frame) -> Result<()> {
        let bytes = frame.to_bytes()?;
        let sent = self.socket.send(&bytes).await?;
        let entries = frame.relation.as_ref().map_or(0, |stack| stack.entries.len());
        self.metrics.frame_sent(sent, entries);
        info!(bytes = sent, entries, "Sent 1 packets.");

        tokio::time::sleep(self.config.inter_packet_delay).await;
        Ok(())
    }
}
