use crate::error::DecodeError;
use crate::ethernet::EthernetLayer;
use crate::icmp::IcmpLayer;
use crate::ipv4::Ipv4Layer;
use crate::ipv6::Ipv6Layer;
use crate::layers::{Layer, LayerType};
use crate::registry::DecoderTable;
use crate::tcp::TcpLayer;
use crate::udp::UdpLayer;
use libtracecap_tools::Linktype;
use pnet_packet::ethernet::EtherTypes;
use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use std::sync::Arc;

/// Result of decoding a packet: the layers, outermost first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedPacket {
    layers: Vec<Layer>,
    /// Error that stopped the descent below the last layer, if any
    pub error: Option<DecodeError>,
}

impl DecodedPacket {
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<Layer> {
        self.layers
    }

    pub fn layer_types(&self) -> Vec<LayerType> {
        self.layers.iter().map(Layer::layer_type).collect()
    }

    pub fn ethernet(&self) -> Option<&EthernetLayer> {
        self.layers.iter().find_map(|l| match l {
            Layer::Ethernet(e) => Some(e),
            _ => None,
        })
    }

    pub fn ipv4(&self) -> Option<&Ipv4Layer> {
        self.layers.iter().find_map(|l| match l {
            Layer::Ipv4(ip) => Some(ip),
            _ => None,
        })
    }

    pub fn ipv6(&self) -> Option<&Ipv6Layer> {
        self.layers.iter().find_map(|l| match l {
            Layer::Ipv6(ip) => Some(ip),
            _ => None,
        })
    }

    pub fn tcp(&self) -> Option<&TcpLayer> {
        self.layers.iter().find_map(|l| match l {
            Layer::Tcp(t) => Some(t),
            _ => None,
        })
    }

    pub fn udp(&self) -> Option<&UdpLayer> {
        self.layers.iter().find_map(|l| match l {
            Layer::Udp(u) => Some(u),
            _ => None,
        })
    }

    pub fn icmp(&self) -> Option<&IcmpLayer> {
        self.layers.iter().find_map(|l| match l {
            Layer::Icmp(i) => Some(i),
            _ => None,
        })
    }

    /// Payload of the innermost decoded layer (empty if nothing was decoded)
    pub fn payload(&self) -> &[u8] {
        self.layers.last().map_or(&[][..], Layer::payload)
    }
}

/// Layer expected in the payload of `layer`, if any
fn next_layer(layer: &Layer) -> Option<LayerType> {
    fn transport(proto: IpNextHeaderProtocol) -> Option<LayerType> {
        match proto {
            IpNextHeaderProtocols::Tcp => Some(LayerType::Tcp),
            IpNextHeaderProtocols::Udp => Some(LayerType::Udp),
            IpNextHeaderProtocols::Icmp | IpNextHeaderProtocols::Icmpv6 => Some(LayerType::Icmp),
            _ => None,
        }
    }
    match layer {
        Layer::Ethernet(eth) => match eth.ethertype {
            EtherTypes::Ipv4 => Some(LayerType::Ipv4),
            EtherTypes::Ipv6 => Some(LayerType::Ipv6),
            _ => None,
        },
        // later fragments do not start with a transport header
        Layer::Ipv4(ip) if ip.is_later_fragment() => None,
        Layer::Ipv4(ip) if ip.protocol == IpNextHeaderProtocols::Icmpv6 => None,
        Layer::Ipv4(ip) => transport(ip.protocol),
        Layer::Ipv6(ip) if ip.next_header == IpNextHeaderProtocols::Icmp => None,
        Layer::Ipv6(ip) => transport(ip.next_header),
        Layer::Tcp(_) | Layer::Udp(_) | Layer::Icmp(_) => None,
    }
}

/// Walks a packet from an outer layer down, following the protocol fields
#[derive(Clone, Debug)]
pub struct PacketDecoder {
    table: Arc<DecoderTable>,
}

impl Default for PacketDecoder {
    fn default() -> Self {
        PacketDecoder::new(Arc::new(DecoderTable::with_defaults()))
    }
}

impl PacketDecoder {
    pub fn new(table: Arc<DecoderTable>) -> Self {
        PacketDecoder { table }
    }

    pub fn table(&self) -> &DecoderTable {
        &self.table
    }

    /// First layer of frames captured with `link_type`, if it can be decoded
    pub fn first_layer(link_type: Linktype, data: &[u8]) -> Option<LayerType> {
        match link_type {
            Linktype::ETHERNET => Some(LayerType::Ethernet),
            Linktype::IPV4 => Some(LayerType::Ipv4),
            Linktype::IPV6 => Some(LayerType::Ipv6),
            Linktype::RAW => match data.first().map(|b| b >> 4) {
                Some(4) => Some(LayerType::Ipv4),
                Some(6) => Some(LayerType::Ipv6),
                _ => None,
            },
            _ => None,
        }
    }

    /// Decode `data` as `layer`, then every layer below it
    ///
    /// An error on the first layer is returned. Deeper errors stop the descent
    /// and are recorded in [`DecodedPacket::error`]. Layers without a registered
    /// decoder end the descent silently.
    pub fn decode_from(&self, layer: LayerType, data: &[u8]) -> Result<DecodedPacket, DecodeError> {
        let mut packet = DecodedPacket::default();
        let mut current = layer;
        loop {
            let input = packet.layers.last().map_or(data, Layer::payload);
            match self.table.decode_layer(current, input) {
                Ok(decoded) => {
                    let next = next_layer(&decoded);
                    packet.layers.push(decoded);
                    match next {
                        Some(next) => current = next,
                        None => break,
                    }
                }
                Err(DecodeError::UnsupportedLayer(l)) => {
                    trace!("no decoder for {}, stopping", l);
                    break;
                }
                Err(e) if packet.layers.is_empty() => return Err(e),
                Err(e) => {
                    debug!("decode stopped: {}", e);
                    packet.error = Some(e);
                    break;
                }
            }
        }
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcp::TcpFlags;
    use pnet_base::MacAddr;
    use pnet_packet::ethernet::MutableEthernetPacket;
    use pnet_packet::ipv4::MutableIpv4Packet;
    use pnet_packet::ipv6::MutableIpv6Packet;
    use pnet_packet::tcp::MutableTcpPacket;
    use pnet_packet::udp::MutableUdpPacket;
    use std::net::Ipv4Addr;

    fn eth_ipv4_tcp(payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 14 + 20 + 20 + payload.len()];
        {
            let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
            eth.set_destination(MacAddr::new(0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb));
            eth.set_source(MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55));
            eth.set_ethertype(EtherTypes::Ipv4);
        }
        {
            let mut ip = MutableIpv4Packet::new(&mut buf[14..]).unwrap();
            ip.set_version(4);
            ip.set_header_length(5);
            ip.set_total_length((20 + 20 + payload.len()) as u16);
            ip.set_ttl(64);
            ip.set_next_level_protocol(IpNextHeaderProtocols::Tcp);
            ip.set_source(Ipv4Addr::new(192, 168, 1, 1));
            ip.set_destination(Ipv4Addr::new(192, 168, 1, 2));
        }
        {
            let mut tcp = MutableTcpPacket::new(&mut buf[34..]).unwrap();
            tcp.set_source(1234);
            tcp.set_destination(80);
            tcp.set_data_offset(5);
            tcp.set_payload(payload);
        }
        // PSH|ACK
        buf[34 + 13] = 0x18;
        buf
    }

    #[test]
    fn decode_ethernet_ipv4_tcp() {
        let frame = eth_ipv4_tcp(b"abc");
        let p = PacketDecoder::default()
            .decode_from(LayerType::Ethernet, &frame)
            .unwrap();
        assert_eq!(
            p.layer_types(),
            vec![LayerType::Ethernet, LayerType::Ipv4, LayerType::Tcp]
        );
        assert!(p.error.is_none());
        assert_eq!(p.payload(), b"abc");
        assert_eq!(p.payload(), &frame[14 + 20 + 20..]);
        let eth = p.ethernet().unwrap();
        assert_eq!(eth.destination, MacAddr::new(0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb));
        let ip = p.ipv4().unwrap();
        assert!(ip.total_length > 0);
        assert_eq!(ip.ttl, 64);
        assert_eq!(ip.source, Ipv4Addr::new(192, 168, 1, 1));
        let tcp = p.tcp().unwrap();
        assert_eq!((tcp.source_port, tcp.destination_port), (1234, 80));
        assert_eq!(tcp.flags.0, TcpFlags::PSH | TcpFlags::ACK);
        assert!(p.ipv6().is_none() && p.udp().is_none());
    }

    #[test]
    fn decode_ethernet_ipv6_udp() {
        let payload = [0xde, 0xad, 0xbe, 0xef];
        let mut buf = vec![0u8; 14 + 40 + 8 + payload.len()];
        {
            let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
            eth.set_ethertype(EtherTypes::Ipv6);
        }
        {
            let mut ip = MutableIpv6Packet::new(&mut buf[14..]).unwrap();
            ip.set_version(6);
            ip.set_payload_length((8 + payload.len()) as u16);
            ip.set_next_header(IpNextHeaderProtocols::Udp);
            ip.set_hop_limit(1);
            ip.set_source("2001:db8::1".parse().unwrap());
            ip.set_destination("2001:db8::2".parse().unwrap());
        }
        {
            let mut udp = MutableUdpPacket::new(&mut buf[54..]).unwrap();
            udp.set_source(5353);
            udp.set_destination(8080);
            udp.set_length((8 + payload.len()) as u16);
            udp.set_payload(&payload);
        }
        let p = PacketDecoder::default()
            .decode_from(LayerType::Ethernet, &buf)
            .unwrap();
        assert_eq!(
            p.layer_types(),
            vec![LayerType::Ethernet, LayerType::Ipv6, LayerType::Udp]
        );
        let udp = p.udp().unwrap();
        assert_eq!((udp.source_port, udp.destination_port), (5353, 8080));
        assert_eq!(p.payload(), &payload);
    }

    #[test]
    fn decode_stops_on_unknown_ethertype() {
        let mut frame = eth_ipv4_tcp(b"");
        // ARP
        frame[12..14].copy_from_slice(&[0x08, 0x06]);
        let p = PacketDecoder::default()
            .decode_from(LayerType::Ethernet, &frame)
            .unwrap();
        assert_eq!(p.layer_types(), vec![LayerType::Ethernet]);
        assert_eq!(p.payload().len(), 40);
    }

    #[test]
    fn decode_records_deep_errors() {
        let mut frame = eth_ipv4_tcp(b"xyz");
        // data offset 15: header longer than the segment
        frame[34 + 12] = 0xf0;
        let p = PacketDecoder::default()
            .decode_from(LayerType::Ethernet, &frame)
            .unwrap();
        assert_eq!(p.layer_types(), vec![LayerType::Ethernet, LayerType::Ipv4]);
        assert!(matches!(p.error, Some(DecodeError::Truncated { layer: LayerType::Tcp, .. })));
        // first layer error is returned
        assert!(PacketDecoder::default()
            .decode_from(LayerType::Ethernet, &frame[..10])
            .is_err());
    }

    #[test]
    fn decode_missing_decoder_keeps_layers() {
        let mut table = DecoderTable::new();
        table.register(LayerType::Ethernet, |d: &[u8]| {
            crate::ethernet::decode_ethernet(d).map(Layer::Ethernet)
        });
        let decoder = PacketDecoder::new(Arc::new(table));
        let p = decoder
            .decode_from(LayerType::Ethernet, &eth_ipv4_tcp(b"abc"))
            .unwrap();
        assert_eq!(p.layer_types(), vec![LayerType::Ethernet]);
        assert!(p.error.is_none());
        let p = decoder.decode_from(LayerType::Ipv4, &[0x45; 20]).unwrap();
        assert!(p.layers().is_empty());
    }

    #[test]
    fn decode_ipv4_clamped_total_length() {
        let mut frame = eth_ipv4_tcp(b"abc");
        frame[16..18].copy_from_slice(&9000u16.to_be_bytes());
        let p = PacketDecoder::default()
            .decode_from(LayerType::Ethernet, &frame)
            .unwrap();
        assert_eq!(p.ipv4().unwrap().total_length, 43);
        assert_eq!(p.payload(), b"abc");
    }

    #[test]
    fn first_layer_by_link_type() {
        assert_eq!(
            PacketDecoder::first_layer(Linktype::ETHERNET, &[]),
            Some(LayerType::Ethernet)
        );
        assert_eq!(
            PacketDecoder::first_layer(Linktype::RAW, &[0x60]),
            Some(LayerType::Ipv6)
        );
        assert_eq!(PacketDecoder::first_layer(Linktype::LINUX_SLL, &[0x45]), None);
    }
}
