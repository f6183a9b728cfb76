use crate::error::DecodeError;
use crate::layers::LayerType;
use pnet_base::MacAddr;
use pnet_packet::ethernet::{EtherType, EthernetPacket};

/// IEEE 802.1Q tag
pub const ETHERTYPE_VLAN: EtherType = EtherType(0x8100);
/// IEEE 802.1ad (QinQ) service tag
pub const ETHERTYPE_QINQ: EtherType = EtherType(0x88a8);

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;

/// Ethernet II frame, VLAN tags unwrapped
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EthernetLayer {
    /// Ethernet header including VLAN tags
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
    pub destination: MacAddr,
    pub source: MacAddr,
    /// Type of the payload, after the last VLAN tag
    pub ethertype: EtherType,
    /// VLAN identifiers, outermost first
    pub vlan_ids: Vec<u16>,
}

pub fn decode_ethernet(data: &[u8]) -> Result<EthernetLayer, DecodeError> {
    let eth = EthernetPacket::new(data).ok_or_else(|| {
        DecodeError::truncated(LayerType::Ethernet, ETHERNET_HEADER_LEN, data.len())
    })?;
    let mut ethertype = eth.get_ethertype();
    let mut offset = ETHERNET_HEADER_LEN;
    let mut vlan_ids = Vec::new();
    while ethertype == ETHERTYPE_VLAN || ethertype == ETHERTYPE_QINQ {
        let tag = data.get(offset..offset + VLAN_TAG_LEN).ok_or_else(|| {
            DecodeError::truncated(LayerType::Ethernet, offset + VLAN_TAG_LEN, data.len())
        })?;
        let tci = u16::from_be_bytes([tag[0], tag[1]]);
        vlan_ids.push(tci & 0x0fff);
        ethertype = EtherType(u16::from_be_bytes([tag[2], tag[3]]));
        offset += VLAN_TAG_LEN;
    }
    Ok(EthernetLayer {
        header: data[..offset].to_vec(),
        payload: data[offset..].to_vec(),
        destination: eth.get_destination(),
        source: eth.get_source(),
        ethertype,
        vlan_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet_packet::ethernet::{EtherTypes, MutableEthernetPacket};

    fn frame(ethertype: EtherType, rest: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; ETHERNET_HEADER_LEN + rest.len()];
        {
            let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
            eth.set_destination(MacAddr::new(0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb));
            eth.set_source(MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55));
            eth.set_ethertype(ethertype);
        }
        buf[ETHERNET_HEADER_LEN..].copy_from_slice(rest);
        buf
    }

    #[test]
    fn ethernet_plain() {
        let buf = frame(EtherTypes::Ipv4, &[0x45, 0x00]);
        let eth = decode_ethernet(&buf).unwrap();
        assert_eq!(eth.destination, MacAddr::new(0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb));
        assert_eq!(eth.source, MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55));
        assert_eq!(eth.ethertype, EtherTypes::Ipv4);
        assert_eq!(eth.header.len(), 14);
        assert_eq!(eth.payload, vec![0x45, 0x00]);
        assert!(eth.vlan_ids.is_empty());
    }

    #[test]
    fn ethernet_qinq() {
        // outer 802.1ad tag (vlan 100, pcp 3), inner 802.1Q tag (vlan 42), then IPv6
        let rest = [0x60, 0x64, 0x81, 0x00, 0x00, 0x2a, 0x86, 0xdd, 0xde, 0xad];
        let buf = frame(ETHERTYPE_QINQ, &rest);
        let eth = decode_ethernet(&buf).unwrap();
        assert_eq!(eth.vlan_ids, vec![100, 42]);
        assert_eq!(eth.ethertype, EtherTypes::Ipv6);
        assert_eq!(eth.header.len(), 22);
        assert_eq!(eth.payload, vec![0xde, 0xad]);
    }

    #[test]
    fn ethernet_truncated() {
        assert!(matches!(
            decode_ethernet(&[0u8; 13]),
            Err(DecodeError::Truncated { needed: 14, .. })
        ));
        let buf = frame(ETHERTYPE_VLAN, &[0x00, 0x01]);
        assert!(matches!(
            decode_ethernet(&buf),
            Err(DecodeError::Truncated {
                layer: LayerType::Ethernet,
                needed: 18,
                available: 16
            })
        ));
    }
}
