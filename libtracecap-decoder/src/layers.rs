use crate::ethernet::EthernetLayer;
use crate::icmp::IcmpLayer;
use crate::ipv4::Ipv4Layer;
use crate::ipv6::Ipv6Layer;
use crate::tcp::TcpLayer;
use crate::udp::UdpLayer;
use std::fmt;

/// Tag of a decodable layer
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum LayerType {
    Ethernet,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Icmp,
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerType::Ethernet => "Ethernet",
            LayerType::Ipv4 => "IPv4",
            LayerType::Ipv6 => "IPv6",
            LayerType::Tcp => "TCP",
            LayerType::Udp => "UDP",
            LayerType::Icmp => "ICMP",
        };
        f.write_str(s)
    }
}

/// A decoded layer
///
/// Every layer owns a copy of its header and payload bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Layer {
    Ethernet(EthernetLayer),
    Ipv4(Ipv4Layer),
    Ipv6(Ipv6Layer),
    Tcp(TcpLayer),
    Udp(UdpLayer),
    Icmp(IcmpLayer),
}

impl Layer {
    pub fn layer_type(&self) -> LayerType {
        match self {
            Layer::Ethernet(_) => LayerType::Ethernet,
            Layer::Ipv4(_) => LayerType::Ipv4,
            Layer::Ipv6(_) => LayerType::Ipv6,
            Layer::Tcp(_) => LayerType::Tcp,
            Layer::Udp(_) => LayerType::Udp,
            Layer::Icmp(_) => LayerType::Icmp,
        }
    }

    pub fn header(&self) -> &[u8] {
        match self {
            Layer::Ethernet(l) => &l.header,
            Layer::Ipv4(l) => &l.header,
            Layer::Ipv6(l) => &l.header,
            Layer::Tcp(l) => &l.header,
            Layer::Udp(l) => &l.header,
            Layer::Icmp(l) => &l.header,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Layer::Ethernet(l) => &l.payload,
            Layer::Ipv4(l) => &l.payload,
            Layer::Ipv6(l) => &l.payload,
            Layer::Tcp(l) => &l.payload,
            Layer::Udp(l) => &l.payload,
            Layer::Icmp(l) => &l.payload,
        }
    }
}

/// One-line summary, for example `IPv4 192.168.1.1 > 192.168.1.2 proto 6`
impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Ethernet(l) => {
                write!(f, "Ethernet {} > {}", l.source, l.destination)?;
                for id in &l.vlan_ids {
                    write!(f, " vlan {}", id)?;
                }
                write!(f, " type 0x{:04x}", l.ethertype.0)
            }
            Layer::Ipv4(l) => write!(
                f,
                "IPv4 {} > {} proto {} ttl {} len {}",
                l.source, l.destination, l.protocol.0, l.ttl, l.total_length
            ),
            Layer::Ipv6(l) => write!(
                f,
                "IPv6 {} > {} next {} hlim {} len {}",
                l.source, l.destination, l.next_header.0, l.hop_limit, l.payload_length
            ),
            Layer::Tcp(l) => write!(
                f,
                "TCP {} > {} [{}] seq {} ack {} win {} len {}",
                l.source_port,
                l.destination_port,
                l.flags,
                l.sequence,
                l.acknowledgement,
                l.window,
                l.payload.len()
            ),
            Layer::Udp(l) => write!(
                f,
                "UDP {} > {} len {}",
                l.source_port, l.destination_port, l.length
            ),
            Layer::Icmp(l) => write!(f, "ICMP type {} code {}", l.icmp_type, l.code),
        }
    }
}
