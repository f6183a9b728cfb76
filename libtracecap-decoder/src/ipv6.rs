use crate::error::DecodeError;
use crate::layers::LayerType;
use pnet_packet::ip::IpNextHeaderProtocol;
use pnet_packet::ipv6::Ipv6Packet;
use std::net::Ipv6Addr;

const IPV6_HEADER_LEN: usize = 40;

/// IPv6 fixed header. Extension headers are left in the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv6Layer {
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    /// Payload length, clamped to the available bytes
    pub payload_length: u16,
    pub next_header: IpNextHeaderProtocol,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
}

pub fn decode_ipv6(data: &[u8]) -> Result<Ipv6Layer, DecodeError> {
    let layer = LayerType::Ipv6;
    let ip = Ipv6Packet::new(data)
        .ok_or_else(|| DecodeError::truncated(layer, IPV6_HEADER_LEN, data.len()))?;
    let version = ip.get_version();
    if version != 6 {
        return Err(DecodeError::invalid(layer, format!("version {}", version)));
    }
    let available = data.len() - IPV6_HEADER_LEN;
    let mut payload_length = usize::from(ip.get_payload_length());
    if payload_length > available {
        debug!(
            "IPv6: payload length {} exceeds {} available bytes, clamping",
            payload_length, available
        );
        payload_length = available;
    }
    Ok(Ipv6Layer {
        header: data[..IPV6_HEADER_LEN].to_vec(),
        payload: data[IPV6_HEADER_LEN..IPV6_HEADER_LEN + payload_length].to_vec(),
        version,
        traffic_class: ip.get_traffic_class(),
        flow_label: ip.get_flow_label(),
        payload_length: payload_length as u16,
        next_header: ip.get_next_header(),
        hop_limit: ip.get_hop_limit(),
        source: ip.get_source(),
        destination: ip.get_destination(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet_packet::ip::IpNextHeaderProtocols;
    use pnet_packet::ipv6::MutableIpv6Packet;

    #[test]
    fn ipv6_fields() {
        let mut buf = vec![0u8; 48];
        {
            let mut ip = MutableIpv6Packet::new(&mut buf).unwrap();
            ip.set_version(6);
            ip.set_traffic_class(0xb8);
            ip.set_flow_label(0xabcde);
            ip.set_payload_length(8);
            ip.set_next_header(IpNextHeaderProtocols::Udp);
            ip.set_hop_limit(255);
            ip.set_source("fe80::1".parse().unwrap());
            ip.set_destination("ff02::fb".parse().unwrap());
        }
        // version 6, traffic class 0xb8, flow label 0xabcde
        assert_eq!(&buf[..4], &[0x6b, 0x8a, 0xbc, 0xde]);
        let ip = decode_ipv6(&buf).unwrap();
        assert_eq!(ip.traffic_class, 0xb8);
        assert_eq!(ip.flow_label, 0xabcde);
        assert_eq!(ip.next_header, IpNextHeaderProtocols::Udp);
        assert_eq!(ip.hop_limit, 255);
        assert_eq!(ip.payload.len(), 8);
        assert_eq!(ip.destination, "ff02::fb".parse::<Ipv6Addr>().unwrap());
    }

    #[test]
    fn ipv6_payload_length_clamped() {
        let mut buf = vec![0u8; 44];
        buf[0] = 0x60;
        buf[4..6].copy_from_slice(&1000u16.to_be_bytes());
        let ip = decode_ipv6(&buf).unwrap();
        assert_eq!(ip.payload_length, 4);
        assert_eq!(ip.payload.len(), 4);
    }

    #[test]
    fn ipv6_errors() {
        assert!(matches!(
            decode_ipv6(&[0x60; 39]),
            Err(DecodeError::Truncated { needed: 40, .. })
        ));
        let buf = [0x40; 40];
        assert!(matches!(decode_ipv6(&buf), Err(DecodeError::Invalid { .. })));
    }
}
