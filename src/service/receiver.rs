//! Capture loop for MYP4DB traffic.
//!
//! Frames are filtered on IPv4 protocol number in userspace, parsed, and
//! handed to a callback. A frame that fails to parse is logged and skipped;
//! capture carries on.

use crate::config::ReceiverConfig;
use crate::core::frame::{Frame, ETHERNET_HEADER_LEN};
use crate::core::relation::HeaderLayout;
use crate::error::Result;
use crate::protocol::binding::ETHERTYPE_IPV4;
use crate::transport::{find_interface, RawSocket};
use crate::utils::Metrics;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keeps IPv4 frames whose protocol number is in a fixed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFilter {
    protocols: Vec<u8>,
}

impl CaptureFilter {
    pub fn new(protocols: impl Into<Vec<u8>>) -> Self {
        Self {
            protocols: protocols.into(),
        }
    }

    /// Looks only at the ethertype, IP version and protocol byte.
    pub fn matches(&self, frame: &[u8]) -> bool {
        if frame.len() < ETHERNET_HEADER_LEN + 10 {
            return false;
        }
        let ether_type = u16::from_be_bytes([frame[12], frame[13]]);
        let ip = &frame[ETHERNET_HEADER_LEN..];
        ether_type == ETHERTYPE_IPV4 && ip[0] >> 4 == 4 && self.protocols.contains(&ip[9])
    }
}

/// Filters and parses raw captured frames, keeping counts.
pub struct CaptureSieve {
    filter: CaptureFilter,
    layout: HeaderLayout,
    metrics: Arc<Metrics>,
}

impl CaptureSieve {
    pub fn new(filter: CaptureFilter, layout: HeaderLayout, metrics: Arc<Metrics>) -> Self {
        Self {
            filter,
            layout,
            metrics,
        }
    }

    /// Returns the parsed frame, or `None` when it is filtered out or malformed.
    pub fn inspect(&self, raw: &[u8]) -> Option<Frame> {
        self.metrics.frame_captured();
        if !self.filter.matches(raw) {
            return None;
        }
        self.metrics.frame_matched();

        match Frame::parse(raw, self.layout) {
            Ok(frame) => {
                if let Some(stack) = &frame.relation {
                    self.metrics.relation_decoded();
                    debug!(
                        relation_id = stack.header.relation_id(),
                        entries = stack.entries.len(),
                        "relation captured"
                    );
                }
                Some(frame)
            }
            Err(e) => {
                self.metrics.decode_error();
                warn!(error = %e, len = raw.len(), "dropping malformed frame");
                None
            }
        }
    }
}

/// Captures frames on one interface until shut down.
pub struct Receiver {
    socket: RawSocket,
    sieve: CaptureSieve,
    snaplen: usize,
}

impl Receiver {
    pub fn open(config: &ReceiverConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let interface = find_interface(&config.interface)?;
        let socket = RawSocket::bind(&interface)?;
        let sieve = CaptureSieve::new(
            CaptureFilter::new(config.protocols.clone()),
            config.layout,
            metrics,
        );
        Ok(Self {
            socket,
            sieve,
            snaplen: config.snaplen,
        })
    }

    pub fn interface(&self) -> &str {
        self.socket.interface()
    }

    /// Captures until Ctrl-C.
    pub async fn run<F>(&self, handler: F) -> Result<()>
    where
        F: FnMut(&Frame),
    {
        self.run_until(handler, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Captures until `shutdown` completes, calling `handler` on every
    /// matching frame.
    pub async fn run_until<F, S>(&self, mut handler: F, shutdown: S) -> Result<()>
    where
        F: FnMut(&Frame),
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut buf = vec![0u8; self.snaplen];
        info!(interface = %self.interface(), "capture started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("capture interrupted");
                    return Ok(());
                }
                received = self.socket.recv(&mut buf) => {
                    let len = received?;
                    if let Some(frame) = self.sieve.inspect(&buf[..len]) {
                        handler(&frame);
                    }
                }
            }
        }
    }
}
