use crate::error::DecodeError;
use crate::layers::LayerType;
use pnet_packet::ip::IpNextHeaderProtocol;
use pnet_packet::ipv4::Ipv4Packet;
use std::net::Ipv4Addr;

const IPV4_MIN_HEADER_LEN: usize = 20;

/// IPv4 header. `payload` ends at the (clamped) total length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv4Layer {
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
    pub version: u8,
    /// Header length in 32-bit words
    pub ihl: u8,
    pub tos: u8,
    /// Total length, clamped to the available bytes
    pub total_length: u16,
    pub identification: u16,
    /// Top 3 bits of bytes 6-7
    pub flags: u8,
    /// Low 13 bits of bytes 6-7, in 8-byte units
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: IpNextHeaderProtocol,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub options: Vec<u8>,
}

impl Ipv4Layer {
    /// True if this is a fragment other than the first one
    pub fn is_later_fragment(&self) -> bool {
        self.fragment_offset != 0
    }
}

pub fn decode_ipv4(data: &[u8]) -> Result<Ipv4Layer, DecodeError> {
    let layer = LayerType::Ipv4;
    let ip = Ipv4Packet::new(data)
        .ok_or_else(|| DecodeError::truncated(layer, IPV4_MIN_HEADER_LEN, data.len()))?;
    let version = ip.get_version();
    if version != 4 {
        return Err(DecodeError::invalid(layer, format!("version {}", version)));
    }
    let ihl = ip.get_header_length();
    let hlen = usize::from(ihl) * 4;
    if hlen < IPV4_MIN_HEADER_LEN {
        return Err(DecodeError::invalid(layer, format!("header length {}", hlen)));
    }
    if hlen > data.len() {
        return Err(DecodeError::truncated(layer, hlen, data.len()));
    }
    let mut total_length = usize::from(ip.get_total_length());
    if total_length == 0 {
        // segmentation offload: the kernel leaves the length unset
        total_length = data.len();
    } else if total_length > data.len() {
        debug!(
            "IPv4: total length {} exceeds {} available bytes, clamping",
            total_length,
            data.len()
        );
        total_length = data.len();
    }
    if total_length < hlen {
        return Err(DecodeError::invalid(
            layer,
            format!("total length {} shorter than header", total_length),
        ));
    }
    Ok(Ipv4Layer {
        header: data[..hlen].to_vec(),
        payload: data[hlen..total_length].to_vec(),
        version,
        ihl,
        tos: data[1],
        // offloaded frames may exceed the 16-bit field
        total_length: u16::try_from(total_length).unwrap_or(u16::MAX),
        identification: ip.get_identification(),
        flags: ip.get_flags(),
        fragment_offset: ip.get_fragment_offset(),
        ttl: ip.get_ttl(),
        protocol: ip.get_next_level_protocol(),
        checksum: ip.get_checksum(),
        source: ip.get_source(),
        destination: ip.get_destination(),
        options: data[IPV4_MIN_HEADER_LEN..hlen].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet_packet::ip::IpNextHeaderProtocols;
    use pnet_packet::ipv4::MutableIpv4Packet;

    fn packet(ihl: u8, total_length: u16, buf_len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; buf_len];
        {
            let mut ip = MutableIpv4Packet::new(&mut buf).unwrap();
            ip.set_version(4);
            ip.set_header_length(ihl);
            ip.set_dscp(0x2e);
            ip.set_total_length(total_length);
            ip.set_identification(0x1234);
            ip.set_flags(0b010);
            ip.set_fragment_offset(0);
            ip.set_ttl(64);
            ip.set_next_level_protocol(IpNextHeaderProtocols::Udp);
            ip.set_source(Ipv4Addr::new(10, 0, 0, 1));
            ip.set_destination(Ipv4Addr::new(10, 0, 0, 2));
        }
        buf
    }

    #[test]
    fn ipv4_fields() {
        let mut buf = packet(6, 28, 28);
        buf[20..24].copy_from_slice(&[1, 1, 1, 0]);
        let ip = decode_ipv4(&buf).unwrap();
        assert_eq!(ip.version, 4);
        assert_eq!(ip.ihl, 6);
        assert_eq!(ip.tos, 0x2e << 2);
        assert_eq!(ip.flags, 0b010);
        assert_eq!(ip.fragment_offset, 0);
        assert_eq!(ip.identification, 0x1234);
        assert_eq!(ip.ttl, 64);
        assert_eq!(ip.protocol, IpNextHeaderProtocols::Udp);
        assert_eq!(ip.options, vec![1, 1, 1, 0]);
        assert_eq!(ip.header.len(), 24);
        assert_eq!(ip.payload.len(), 4);
        assert_eq!(ip.source, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn ipv4_total_length_clamped() {
        let buf = packet(5, 1500, 60);
        let ip = decode_ipv4(&buf).unwrap();
        assert_eq!(ip.total_length, 60);
        assert_eq!(ip.payload.len(), 40);
    }

    #[test]
    fn ipv4_offloaded_length_saturates() {
        let buf = packet(5, 0, 70_000);
        let ip = decode_ipv4(&buf).unwrap();
        assert_eq!(ip.total_length, u16::MAX);
        assert_eq!(ip.payload.len(), 70_000 - 20);
    }

    #[test]
    fn ipv4_trailing_padding_removed() {
        let buf = packet(5, 24, 46);
        let ip = decode_ipv4(&buf).unwrap();
        assert_eq!(ip.payload.len(), 4);
    }

    #[test]
    fn ipv4_fragment_fields() {
        let mut buf = packet(5, 40, 40);
        // more fragments, offset 185 (1480 bytes)
        buf[6] = 0x20;
        buf[7] = 0xb9;
        let ip = decode_ipv4(&buf).unwrap();
        assert_eq!(ip.flags, 0b001);
        assert_eq!(ip.fragment_offset, 185);
        assert!(ip.is_later_fragment());
    }

    #[test]
    fn ipv4_errors() {
        assert!(matches!(
            decode_ipv4(&[0x45; 10]),
            Err(DecodeError::Truncated { needed: 20, .. })
        ));
        let mut buf = packet(5, 20, 20);
        buf[0] = 0x65;
        assert!(matches!(decode_ipv4(&buf), Err(DecodeError::Invalid { .. })));
        let buf = packet(4, 20, 20);
        assert!(matches!(decode_ipv4(&buf), Err(DecodeError::Invalid { .. })));
        let buf = packet(15, 60, 40);
        assert!(matches!(
            decode_ipv4(&buf),
            Err(DecodeError::Truncated { needed: 60, .. })
        ));
    }
}
