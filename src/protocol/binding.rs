use serde::Serialize;

/// EtherType carried by IPv4 frames.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// IPv4 protocol number that selects a relation header.
pub const IP_PROTO_MYP4DB: u8 = 0xFA;
/// IPv4 protocol number for UDP.
pub const IP_PROTO_UDP: u8 = 17;

/// Protocol layers a frame is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Layer {
    Ethernet,
    Ipv4,
    Relation,
    Entry,
    Udp,
    Raw,
}

/// The field value observed on a lower layer that decides what follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    EtherType(u16),
    IpProtocol(u8),
    BottomOfStack(bool),
    Any,
}

/// One row of the binding table: `upper` follows `lower` when `when` matches.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub lower: Layer,
    pub when: Selector,
    pub upper: Layer,
}

impl Binding {
    const fn new(lower: Layer, when: Selector, upper: Layer) -> Self {
        Self { lower, when, upper }
    }

    #[inline]
    fn matches(&self, lower: Layer, observed: Selector) -> bool {
        self.lower == lower && (matches!(self.when, Selector::Any) || self.when == observed)
    }
}

/// Layer bindings of a MYP4DB frame, checked in order.
pub const BINDINGS: &[Binding] = &[
    Binding::new(Layer::Ethernet, Selector::EtherType(ETHERTYPE_IPV4), Layer::Ipv4),
    Binding::new(Layer::Ipv4, Selector::IpProtocol(IP_PROTO_MYP4DB), Layer::Relation),
    Binding::new(Layer::Ipv4, Selector::IpProtocol(IP_PROTO_UDP), Layer::Udp),
    Binding::new(Layer::Relation, Selector::Any, Layer::Entry),
    Binding::new(Layer::Entry, Selector::BottomOfStack(false), Layer::Entry),
    Binding::new(Layer::Entry, Selector::BottomOfStack(true), Layer::Udp),
    Binding::new(Layer::Udp, Selector::Any, Layer::Raw),
];

/// Returns the layer that follows `lower` given the observed selector value,
/// or `None` when nothing is bound (the rest of the frame is opaque).
#[inline]
pub fn next_layer(lower: Layer, observed: Selector) -> Option<Layer> {
    BINDINGS
        .iter()
        .find(|binding| binding.matches(lower, observed))
        .map(|binding| binding.upper)
}
