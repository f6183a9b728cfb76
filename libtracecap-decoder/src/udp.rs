use crate::error::DecodeError;
use crate::layers::LayerType;
use pnet_packet::udp::UdpPacket;

const UDP_HEADER_LEN: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpLayer {
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
    pub source_port: u16,
    pub destination_port: u16,
    /// Datagram length, clamped to the available bytes
    pub length: u16,
    pub checksum: u16,
}

pub fn decode_udp(data: &[u8]) -> Result<UdpLayer, DecodeError> {
    let layer = LayerType::Udp;
    let udp = UdpPacket::new(data)
        .ok_or_else(|| DecodeError::truncated(layer, UDP_HEADER_LEN, data.len()))?;
    let mut length = usize::from(udp.get_length());
    if length < UDP_HEADER_LEN {
        return Err(DecodeError::invalid(layer, format!("length {}", length)));
    }
    if length > data.len() {
        debug!(
            "UDP: length {} exceeds {} available bytes, clamping",
            length,
            data.len()
        );
        length = data.len();
    }
    Ok(UdpLayer {
        header: data[..UDP_HEADER_LEN].to_vec(),
        payload: data[UDP_HEADER_LEN..length].to_vec(),
        source_port: udp.get_source(),
        destination_port: udp.get_destination(),
        length: length as u16,
        checksum: udp.get_checksum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn udp_length() {
        // src 53, dst 1024, length 12, checksum 0xabcd
        let mut buf = vec![0, 53, 4, 0, 0, 12, 0xab, 0xcd, 1, 2, 3, 4];
        let udp = decode_udp(&buf).unwrap();
        assert_eq!((udp.source_port, udp.destination_port), (53, 1024));
        assert_eq!(udp.checksum, 0xabcd);
        assert_eq!(udp.payload, vec![1, 2, 3, 4]);
        // length beyond the slice
        buf[5] = 200;
        let udp = decode_udp(&buf).unwrap();
        assert_eq!(udp.length, 12);
        assert_eq!(udp.payload.len(), 4);
        // trailing bytes after the datagram are not payload
        buf[5] = 10;
        assert_eq!(decode_udp(&buf).unwrap().payload, vec![1, 2]);
        buf[5] = 7;
        assert!(matches!(decode_udp(&buf), Err(DecodeError::Invalid { .. })));
        assert!(matches!(
            decode_udp(&buf[..7]),
            Err(DecodeError::Truncated { needed: 8, .. })
        ));
    }
}
