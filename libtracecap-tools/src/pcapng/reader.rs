use super::block::*;
use super::option::*;
use super::{BOM_MAGIC, EPB_MAGIC, IDB_MAGIC, ISB_MAGIC, SHB_MAGIC};
use crate::endian::Endianness;
use crate::error::{truncated_or_io, Error};
use crate::io_util::{pad4, read_full};
use crate::linktype::Linktype;
use crate::packet::Packet;
use crate::resolution::TsResolution;
use crate::timestamp::Timestamp;
use byteorder::{BigEndian, ByteOrder};
use std::io::Read;
use std::mem;

/// Sequential reader for pcap-ng files
///
/// The interface table is reset at each new section.
pub struct PcapNGReader<R: Read> {
    r: R,
    section: SectionHeader,
    section_index: usize,
    interfaces: Vec<Interface>,
    buf: Vec<u8>,
    failed: bool,
}

impl<R: Read> PcapNGReader<R> {
    /// Read the first Section Header Block and build a reader
    pub fn new(mut r: R) -> Result<Self, Error> {
        let mut magic = [0u8; 4];
        if read_full(&mut r, &mut magic)? < magic.len() {
            return Err(Error::BadSection("missing section header block"));
        }
        PcapNGReader::after_magic(magic, r)
    }

    /// Build a reader when the block type of the first block was already consumed
    pub(crate) fn after_magic(magic: [u8; 4], mut r: R) -> Result<Self, Error> {
        if BigEndian::read_u32(&magic) != SHB_MAGIC {
            return Err(Error::BadSection(
                "stream does not start with a section header block",
            ));
        }
        let mut buf = Vec::new();
        let section = read_section_header(&mut r, &mut buf)?;
        debug!(
            "pcap-ng v{}.{} {:?}-endian",
            section.major_version, section.minor_version, section.endianness
        );
        Ok(PcapNGReader {
            r,
            section,
            section_index: 0,
            interfaces: Vec::new(),
            buf,
            failed: false,
        })
    }

    /// Header of the current section
    pub fn section(&self) -> &SectionHeader {
        &self.section
    }

    /// Index of the current section, starting at 0
    pub fn section_index(&self) -> usize {
        self.section_index
    }

    /// Interfaces declared so far in the current section
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface(&self, id: u32) -> Option<&Interface> {
        self.interfaces.get(id as usize)
    }

    /// Read next block
    ///
    /// Returns `Ok(None)` when the stream ends on a block boundary.
    pub fn next_block(&mut self) -> Result<Option<Block>, Error> {
        let mut ty = [0u8; 4];
        match read_full(&mut self.r, &mut ty)? {
            0 => return Ok(None),
            4 => (),
            _ => return Err(Error::Truncated("pcap-ng block header")),
        }
        // the SHB type is a palindrome, readable before knowing the byte order
        if BigEndian::read_u32(&ty) == SHB_MAGIC {
            let section = read_section_header(&mut self.r, &mut self.buf)?;
            debug!("pcap-ng: new section, {:?}-endian", section.endianness);
            self.section = section.clone();
            self.section_index += 1;
            self.interfaces.clear();
            return Ok(Some(Block::SectionHeader(section)));
        }
        let e = self.section.endianness;
        let block_type = e.read_u32(&ty);
        let mut len = [0u8; 4];
        self.r
            .read_exact(&mut len)
            .map_err(|err| truncated_or_io(err, "pcap-ng block header"))?;
        let len = e.read_u32(&len);
        check_block_len(len, 12)?;
        let mut buf = mem::take(&mut self.buf);
        buf.resize(len as usize - 8, 0);
        self.r
            .read_exact(&mut buf)
            .map_err(|err| truncated_or_io(err, "pcap-ng block body"))?;
        let (body, trailer) = buf.split_at(buf.len() - 4);
        let trailing_len = e.read_u32(trailer);
        let block = if trailing_len != len {
            Err(Error::InvalidBlockLength(trailing_len))
        } else {
            match block_type {
                IDB_MAGIC => self.parse_interface(len, body),
                EPB_MAGIC => self.parse_packet(len, body),
                ISB_MAGIC => self.parse_statistics(len, body),
                _ => {
                    trace!("pcap-ng: skipping block type 0x{:08x}", block_type);
                    Ok(Block::Unknown {
                        block_type,
                        length: len,
                    })
                }
            }
        };
        self.buf = buf;
        block.map(Some)
    }

    /// Read next Enhanced Packet Block, skipping other blocks
    ///
    /// Returns `Ok(None)` at end of stream.
    pub fn read_packet(&mut self) -> Result<Option<Packet>, Error> {
        loop {
            match self.next_block()? {
                Some(Block::EnhancedPacket(packet)) => return Ok(Some(packet)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.r
    }

    fn parse_interface(&mut self, len: u32, body: &[u8]) -> Result<Block, Error> {
        if body.len() < 8 {
            return Err(Error::InvalidBlockLength(len));
        }
        let e = self.section.endianness;
        let link_type = Linktype(u32::from(e.read_u16(&body[0..2])));
        let snaplen = e.read_u32(&body[4..8]);
        let options = parse_options(e, &body[8..])?;
        let resolution = match find_option(&options, IF_TSRESOL) {
            Some(o) => match o.value.first().copied().and_then(TsResolution::from_tsresol) {
                Some(r) => r,
                None => {
                    warn!("pcap-ng: invalid if_tsresol {:?}, using microseconds", o.value);
                    TsResolution::MICRO
                }
            },
            None => TsResolution::MICRO,
        };
        let ts_offset = find_option(&options, IF_TSOFFSET)
            .and_then(|o| o.as_i64(e))
            .unwrap_or(0);
        let name = find_option(&options, IF_NAME)
            .and_then(|o| o.as_str())
            .map(str::to_owned);
        let interface = Interface {
            id: self.interfaces.len() as u32,
            link_type,
            snaplen,
            resolution,
            ts_offset,
            name,
            options,
        };
        debug!(
            "pcap-ng: interface {} link type {} snaplen {} resolution {}",
            interface.id, interface.link_type, interface.snaplen, interface.resolution
        );
        self.interfaces.push(interface.clone());
        Ok(Block::InterfaceDescription(interface))
    }

    fn timestamp(&self, interface: Option<&Interface>, high: u32, low: u32) -> Timestamp {
        let ticks = (u64::from(high) << 32) | u64::from(low);
        let (units, offset) = match interface {
            Some(i) => (i.resolution.units_per_sec().unwrap_or(1_000_000), i.ts_offset),
            None => (1_000_000, 0),
        };
        let mut ts = Timestamp::from_ticks(ticks, units).unwrap_or_default();
        ts.secs = ts.secs.saturating_add_signed(offset);
        ts
    }

    fn parse_packet(&self, len: u32, body: &[u8]) -> Result<Block, Error> {
        if body.len() < 20 {
            return Err(Error::InvalidBlockLength(len));
        }
        let e = self.section.endianness;
        let if_id = e.read_u32(&body[0..4]);
        let ts_high = e.read_u32(&body[4..8]);
        let ts_low = e.read_u32(&body[8..12]);
        let caplen = e.read_u32(&body[12..16]);
        let origlen = e.read_u32(&body[16..20]);
        let interface = self
            .interface(if_id)
            .ok_or(Error::UnknownInterface(if_id))?;
        let rest = &body[20..];
        if caplen as usize > rest.len() {
            return Err(Error::MalformedRecord(format!(
                "captured length {} exceeds block body ({} bytes)",
                caplen,
                rest.len()
            )));
        }
        let data = rest[..caplen as usize].to_vec();
        let opt_start = (caplen as usize + pad4(caplen as usize)).min(rest.len());
        let options = parse_options(e, &rest[opt_start..])?;
        Ok(Block::EnhancedPacket(Packet {
            interface: if_id,
            ts: self.timestamp(Some(interface), ts_high, ts_low),
            caplen,
            origlen,
            data,
            options,
        }))
    }

    fn parse_statistics(&self, len: u32, body: &[u8]) -> Result<Block, Error> {
        if body.len() < 12 {
            return Err(Error::InvalidBlockLength(len));
        }
        let e = self.section.endianness;
        let interface = e.read_u32(&body[0..4]);
        let ts_high = e.read_u32(&body[4..8]);
        let ts_low = e.read_u32(&body[8..12]);
        let options = parse_options(e, &body[12..])?;
        Ok(Block::InterfaceStatistics(InterfaceStatistics {
            interface,
            ts: self.timestamp(self.interface(interface), ts_high, ts_low),
            received: find_option(&options, ISB_IFRECV).and_then(|o| o.as_u64(e)),
            dropped: find_option(&options, ISB_IFDROP).and_then(|o| o.as_u64(e)),
            options,
        }))
    }
}

/// Parse a Section Header Block, the block type being already consumed
fn read_section_header<R: Read>(r: &mut R, buf: &mut Vec<u8>) -> Result<SectionHeader, Error> {
    let mut hdr = [0u8; 8];
    r.read_exact(&mut hdr)
        .map_err(|e| truncated_or_io(e, "section header block"))?;
    let bom = BigEndian::read_u32(&hdr[4..8]);
    let endianness = if bom == BOM_MAGIC {
        Endianness::Big
    } else if bom.swap_bytes() == BOM_MAGIC {
        Endianness::Little
    } else {
        return Err(Error::BadSection("invalid byte-order magic"));
    };
    let len = endianness.read_u32(&hdr[0..4]);
    check_block_len(len, 28)?;
    // remaining: versions, section length, options, trailing length
    buf.resize(len as usize - 12, 0);
    r.read_exact(buf)
        .map_err(|e| truncated_or_io(e, "section header block"))?;
    let (body, trailer) = buf.split_at(buf.len() - 4);
    let trailing_len = endianness.read_u32(trailer);
    if trailing_len != len {
        return Err(Error::InvalidBlockLength(trailing_len));
    }
    let major_version = endianness.read_u16(&body[0..2]);
    if major_version != 1 {
        return Err(Error::BadSection("unsupported major version"));
    }
    Ok(SectionHeader {
        endianness,
        major_version,
        minor_version: endianness.read_u16(&body[2..4]),
        section_length: endianness.read_i64(&body[4..12]),
        options: parse_options(endianness, &body[12..])?,
    })
}

/// Iterate over packets. Iteration stops after the first error.
impl<R: Read> Iterator for PcapNGReader<R> {
    type Item = Result<Packet, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.read_packet().transpose();
        if let Some(Err(_)) = item {
            self.failed = true;
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcapng::{InterfaceDescription, PcapNGWriter};
    use std::io::Cursor;

    fn capture_with_one_packet() -> Vec<u8> {
        let mut w = PcapNGWriter::new(Vec::new()).unwrap();
        w.add_interface(&InterfaceDescription::default()).unwrap();
        w.write_packet(0, &[1, 2, 3], 0, Timestamp::new(1, 0), &[])
            .unwrap();
        w.into_inner().unwrap()
    }

    #[test]
    fn pcapng_bad_section() {
        assert!(matches!(
            PcapNGReader::new(Cursor::new(Vec::new())),
            Err(Error::BadSection(_))
        ));
        let mut buf = capture_with_one_packet();
        buf[0] = 0x01;
        assert!(matches!(
            PcapNGReader::new(Cursor::new(buf)),
            Err(Error::BadSection(_))
        ));
        let mut buf = capture_with_one_packet();
        // corrupt byte-order magic
        buf[8] = 0xff;
        assert!(matches!(
            PcapNGReader::new(Cursor::new(buf)),
            Err(Error::BadSection(_))
        ));
    }

    #[test]
    fn pcapng_skip_unknown_block() {
        let mut buf = capture_with_one_packet();
        let shb_len = 28;
        // custom block inserted after the SHB
        let custom = encode_block(Endianness::Little, 0x0000_0bad, &[0xee; 8]).unwrap();
        buf.splice(shb_len..shb_len, custom);
        let mut r = PcapNGReader::new(Cursor::new(buf)).unwrap();
        assert_eq!(
            r.next_block().unwrap(),
            Some(Block::Unknown {
                block_type: 0xbad,
                length: 20
            })
        );
        let p = r.read_packet().unwrap().unwrap();
        assert_eq!(p.data, vec![1, 2, 3]);
        assert!(r.read_packet().unwrap().is_none());
    }

    #[test]
    fn pcapng_invalid_block_length() {
        let buf = capture_with_one_packet();
        // trailing length of the last block differs from the leading one
        let mut bad = buf.clone();
        let n = bad.len();
        bad[n - 4] = 0x30;
        let mut r = PcapNGReader::new(Cursor::new(bad)).unwrap();
        assert!(matches!(
            r.read_packet(),
            Err(Error::InvalidBlockLength(0x30))
        ));
        // leading length not a multiple of 4
        let mut bad = buf.clone();
        bad[28 + 4] = 21;
        let mut r = PcapNGReader::new(Cursor::new(bad)).unwrap();
        assert!(matches!(r.next_block(), Err(Error::InvalidBlockLength(21))));
        // stream cut in the middle of a block
        let mut r = PcapNGReader::new(Cursor::new(&buf[..buf.len() - 6])).unwrap();
        assert!(matches!(r.read_packet(), Err(Error::Truncated(_))));
    }

    #[test]
    fn pcapng_unknown_interface_and_new_section() {
        let first = capture_with_one_packet();
        // second section: packet without an interface
        let mut second = capture_with_one_packet();
        let idb_len = 20 + 8 + 4; // if_tsresol option and sentinel
        second.drain(28..28 + idb_len);
        let mut buf = first.clone();
        buf.extend_from_slice(&second);
        let mut r = PcapNGReader::new(Cursor::new(buf)).unwrap();
        assert!(r.read_packet().unwrap().is_some());
        assert_eq!(r.interfaces().len(), 1);
        assert!(matches!(r.next_block().unwrap(), Some(Block::SectionHeader(_))));
        assert_eq!(r.section_index(), 1);
        assert!(r.interfaces().is_empty());
        assert!(matches!(r.read_packet(), Err(Error::UnknownInterface(0))));
    }

    #[test]
    fn pcapng_caplen_beyond_body() {
        let mut buf = capture_with_one_packet();
        // EPB caplen field: SHB 28 + IDB 32 + 8 header + 12
        let off = 28 + 32 + 8 + 12;
        buf[off] = 200;
        let mut r = PcapNGReader::new(Cursor::new(buf)).unwrap();
        assert!(matches!(r.read_packet(), Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn pcapng_tsoffset() {
        let mut w = PcapNGWriter::new(Vec::new()).unwrap();
        let desc = InterfaceDescription {
            options: vec![PcapNGOption::new(IF_TSOFFSET, 100i64.to_le_bytes().to_vec())],
            ..Default::default()
        };
        w.add_interface(&desc).unwrap();
        w.write_packet(0, &[0], 0, Timestamp::new(1000, 5000), &[])
            .unwrap();
        let buf = w.into_inner().unwrap();
        let mut r = PcapNGReader::new(Cursor::new(buf)).unwrap();
        let p = r.read_packet().unwrap().unwrap();
        assert_eq!(p.ts, Timestamp::new(1100, 5000));
        assert_eq!(r.interface(0).unwrap().ts_offset, 100);
    }
}
