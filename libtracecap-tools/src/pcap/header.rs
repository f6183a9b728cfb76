use crate::endian::Endianness;
use crate::error::Error;
use crate::linktype::Linktype;
use crate::resolution::TsResolution;
use byteorder::{BigEndian, ByteOrder};
use std::io;

/// Magic for microsecond-resolution files, as read in the file byte order
pub const PCAP_MAGIC_MICRO: u32 = 0xa1b2_c3d4;
/// Magic for nanosecond-resolution files, as read in the file byte order
pub const PCAP_MAGIC_NANO: u32 = 0xa1b2_3c4d;

pub const PCAP_HEADER_LEN: usize = 24;
pub const PCAP_RECORD_HEADER_LEN: usize = 16;

pub const DEFAULT_SNAPLEN: u32 = 65535;

/// Global header of a legacy pcap file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcapHeader {
    pub endianness: Endianness,
    pub resolution: TsResolution,
    pub version_major: u16,
    pub version_minor: u16,
    /// GMT to local correction, preserved but unused
    pub thiszone: i32,
    /// Timestamp accuracy, preserved but unused
    pub sigfigs: u32,
    pub snaplen: u32,
    pub network: Linktype,
}

impl Default for PcapHeader {
    fn default() -> Self {
        PcapHeader {
            endianness: Endianness::Little,
            resolution: TsResolution::MICRO,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: DEFAULT_SNAPLEN,
            network: Linktype::ETHERNET,
        }
    }
}

impl PcapHeader {
    /// Identify byte order and timestamp resolution from the first 4 bytes of a file
    pub fn parse_magic(magic: [u8; 4]) -> Result<(Endianness, TsResolution), Error> {
        let m = BigEndian::read_u32(&magic);
        match m {
            PCAP_MAGIC_MICRO => Ok((Endianness::Big, TsResolution::MICRO)),
            PCAP_MAGIC_NANO => Ok((Endianness::Big, TsResolution::NANO)),
            _ if m.swap_bytes() == PCAP_MAGIC_MICRO => Ok((Endianness::Little, TsResolution::MICRO)),
            _ if m.swap_bytes() == PCAP_MAGIC_NANO => Ok((Endianness::Little, TsResolution::NANO)),
            _ => Err(Error::BadMagic(m)),
        }
    }

    /// Parse the 20 bytes following the magic
    pub(crate) fn parse_rest(
        endianness: Endianness,
        resolution: TsResolution,
        rest: &[u8; PCAP_HEADER_LEN - 4],
    ) -> PcapHeader {
        let e = endianness;
        PcapHeader {
            endianness,
            resolution,
            version_major: e.read_u16(&rest[0..2]),
            version_minor: e.read_u16(&rest[2..4]),
            thiszone: e.read_i32(&rest[4..8]),
            sigfigs: e.read_u32(&rest[8..12]),
            snaplen: e.read_u32(&rest[12..16]),
            network: Linktype(e.read_u32(&rest[16..20])),
        }
    }

    /// Magic value, in the file byte order
    pub fn magic(&self) -> u32 {
        if self.resolution.is_nano() {
            PCAP_MAGIC_NANO
        } else {
            PCAP_MAGIC_MICRO
        }
    }

    /// Timestamp sub-second units per second (1e6 or 1e9)
    pub(crate) fn subsec_units(&self) -> u32 {
        if self.resolution.is_nano() {
            1_000_000_000
        } else {
            1_000_000
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, io::Error> {
        let e = self.endianness;
        let mut v = Vec::with_capacity(PCAP_HEADER_LEN);
        e.write_u32(&mut v, self.magic())?;
        e.write_u16(&mut v, self.version_major)?;
        e.write_u16(&mut v, self.version_minor)?;
        e.write_i32(&mut v, self.thiszone)?;
        e.write_u32(&mut v, self.sigfigs)?;
        e.write_u32(&mut v, self.snaplen)?;
        e.write_u32(&mut v, self.network.0)?;
        Ok(v)
    }
}
