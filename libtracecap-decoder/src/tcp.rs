use crate::error::DecodeError;
use crate::layers::LayerType;
use pnet_packet::tcp::TcpPacket;
use std::fmt;

const TCP_MIN_HEADER_LEN: usize = 20;

/// The 9 TCP flag bits. `NS` is bit 8.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct TcpFlags(pub u16);

impl TcpFlags {
    pub const FIN: u16 = 0x001;
    pub const SYN: u16 = 0x002;
    pub const RST: u16 = 0x004;
    pub const PSH: u16 = 0x008;
    pub const ACK: u16 = 0x010;
    pub const URG: u16 = 0x020;
    pub const ECE: u16 = 0x040;
    pub const CWR: u16 = 0x080;
    pub const NS: u16 = 0x100;

    #[inline]
    pub fn contains(self, flags: u16) -> bool {
        self.0 & flags == flags
    }
}

/// tcpdump-style letters: `S`, `F`, `R`, `P`, `.` (ack), `U`, `E`, `W`, `N`
impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LETTERS: [(u16, char); 9] = [
            (TcpFlags::SYN, 'S'),
            (TcpFlags::FIN, 'F'),
            (TcpFlags::RST, 'R'),
            (TcpFlags::PSH, 'P'),
            (TcpFlags::ACK, '.'),
            (TcpFlags::URG, 'U'),
            (TcpFlags::ECE, 'E'),
            (TcpFlags::CWR, 'W'),
            (TcpFlags::NS, 'N'),
        ];
        for (bit, c) in LETTERS {
            if self.0 & bit != 0 {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpLayer {
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub acknowledgement: u32,
    /// Header length in 32-bit words
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
    pub options: Vec<u8>,
}

pub fn decode_tcp(data: &[u8]) -> Result<TcpLayer, DecodeError> {
    let layer = LayerType::Tcp;
    let tcp = TcpPacket::new(data)
        .ok_or_else(|| DecodeError::truncated(layer, TCP_MIN_HEADER_LEN, data.len()))?;
    let data_offset = tcp.get_data_offset();
    let hlen = usize::from(data_offset) * 4;
    if hlen < TCP_MIN_HEADER_LEN {
        return Err(DecodeError::invalid(layer, format!("data offset {}", data_offset)));
    }
    if hlen > data.len() {
        return Err(DecodeError::truncated(layer, hlen, data.len()));
    }
    // NS is the low bit of byte 12, the other flags fill byte 13
    let flags = TcpFlags((u16::from(data[12] & 0x01) << 8) | u16::from(data[13]));
    Ok(TcpLayer {
        header: data[..hlen].to_vec(),
        payload: data[hlen..].to_vec(),
        source_port: tcp.get_source(),
        destination_port: tcp.get_destination(),
        sequence: tcp.get_sequence(),
        acknowledgement: tcp.get_acknowledgement(),
        data_offset,
        flags,
        window: tcp.get_window(),
        checksum: tcp.get_checksum(),
        urgent_pointer: tcp.get_urgent_ptr(),
        options: data[TCP_MIN_HEADER_LEN..hlen].to_vec(),
    })
}
