use crate::error::DecodeError;
use crate::layers::LayerType;
use pnet_packet::icmp::IcmpPacket;

const ICMP_HEADER_LEN: usize = 4;

/// ICMP or ICMPv6 message
///
/// Only type, code and checksum are interpreted. The rest of the header is
/// kept with the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IcmpLayer {
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
}

pub fn decode_icmp(data: &[u8]) -> Result<IcmpLayer, DecodeError> {
    let icmp = IcmpPacket::new(data).ok_or_else(|| {
        DecodeError::truncated(LayerType::Icmp, ICMP_HEADER_LEN, data.len())
    })?;
    Ok(IcmpLayer {
        header: data[..ICMP_HEADER_LEN].to_vec(),
        payload: data[ICMP_HEADER_LEN..].to_vec(),
        icmp_type: icmp.get_icmp_type().0,
        code: icmp.get_icmp_code().0,
        checksum: icmp.get_checksum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icmp_echo() {
        // echo request, id 1, seq 2
        let buf = [8, 0, 0xf7, 0xfc, 0, 1, 0, 2];
        let icmp = decode_icmp(&buf).unwrap();
        assert_eq!(icmp.icmp_type, 8);
        assert_eq!(icmp.code, 0);
        assert_eq!(icmp.checksum, 0xf7fc);
        assert_eq!(icmp.payload, vec![0, 1, 0, 2]);
        assert!(decode_icmp(&buf[..3]).is_err());
    }
}
