use super::option::PcapNGOption;
use super::MAX_BLOCK_LEN;
use crate::endian::Endianness;
use crate::error::Error;
use crate::linktype::Linktype;
use crate::packet::Packet;
use crate::resolution::TsResolution;
use crate::timestamp::Timestamp;

/// Section Header Block contents
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionHeader {
    pub endianness: Endianness,
    pub major_version: u16,
    pub minor_version: u16,
    /// Length of the section in bytes, -1 if not specified
    pub section_length: i64,
    pub options: Vec<PcapNGOption>,
}

/// An interface declared in the current section
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interface {
    /// Sequential id in the section
    pub id: u32,
    pub link_type: Linktype,
    pub snaplen: u32,
    /// From `if_tsresol`, microseconds if absent or invalid
    pub resolution: TsResolution,
    /// From `if_tsoffset`, in seconds. Already applied to packet timestamps.
    pub ts_offset: i64,
    /// From `if_name`
    pub name: Option<String>,
    pub options: Vec<PcapNGOption>,
}

/// Interface Statistics Block contents
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceStatistics {
    pub interface: u32,
    pub ts: Timestamp,
    /// From `isb_ifrecv`
    pub received: Option<u64>,
    /// From `isb_ifdrop`
    pub dropped: Option<u64>,
    pub options: Vec<PcapNGOption>,
}

/// A block read from a pcap-ng stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    SectionHeader(SectionHeader),
    InterfaceDescription(Interface),
    EnhancedPacket(Packet),
    InterfaceStatistics(InterfaceStatistics),
    /// Any other block, skipped
    Unknown { block_type: u32, length: u32 },
}

/// Validate a block total length
pub(crate) fn check_block_len(len: u32, min: u32) -> Result<(), Error> {
    if len < min.max(12) || len % 4 != 0 || len > MAX_BLOCK_LEN {
        return Err(Error::InvalidBlockLength(len));
    }
    Ok(())
}

/// Frame a block body: leading type and length, body, trailing length
///
/// `body` must already be padded to 4 bytes.
pub(crate) fn encode_block(
    endianness: Endianness,
    block_type: u32,
    body: &[u8],
) -> Result<Vec<u8>, Error> {
    debug_assert_eq!(body.len() % 4, 0);
    let total = u32::try_from(body.len() + 12)
        .map_err(|_| Error::MalformedRecord(format!("block of {} bytes", body.len())))?;
    let mut v = Vec::with_capacity(total as usize);
    endianness.write_u32(&mut v, block_type)?;
    endianness.write_u32(&mut v, total)?;
    v.extend_from_slice(body);
    endianness.write_u32(&mut v, total)?;
    Ok(v)
}
