use super::header::*;
use crate::error::{truncated_or_io, Error};
use crate::io_util::read_full;
use crate::packet::Packet;
use crate::timestamp::{Timestamp, NANOS_PER_SEC};
use std::io::Read;

/// Largest record accepted by the reader, whatever the file header declares
pub const MAX_RECORD_LEN: u32 = 256 * 1024 * 1024;

/// Initial capacity of a record buffer; it grows as data is actually read
const RECORD_PREALLOC: u32 = 64 * 1024;

/// Sequential reader for legacy pcap files
///
/// ```no_run
/// # use libtracecap_tools::PcapReader;
/// # fn f() -> Result<(), libtracecap_tools::Error> {
/// let file = std::fs::File::open("trace.pcap")?;
/// let mut reader = PcapReader::new(file)?;
/// while let Some(packet) = reader.read_packet()? {
///     println!("{} {} bytes", packet.ts, packet.caplen);
/// }
/// # Ok(())
/// # }
/// ```
pub struct PcapReader<R: Read> {
    r: R,
    header: PcapHeader,
    failed: bool,
}

impl<R: Read> PcapReader<R> {
    /// Read the file header and build a reader
    pub fn new(mut r: R) -> Result<Self, Error> {
        let mut magic = [0u8; 4];
        if read_full(&mut r, &mut magic)? < magic.len() {
            return Err(Error::Truncated("pcap file header"));
        }
        PcapReader::after_magic(magic, r)
    }

    /// Build a reader when the first 4 bytes were already consumed
    pub(crate) fn after_magic(magic: [u8; 4], mut r: R) -> Result<Self, Error> {
        let (endianness, resolution) = PcapHeader::parse_magic(magic)?;
        let mut rest = [0u8; PCAP_HEADER_LEN - 4];
        r.read_exact(&mut rest)
            .map_err(|e| truncated_or_io(e, "pcap file header"))?;
        let header = PcapHeader::parse_rest(endianness, resolution, &rest);
        debug!(
            "pcap v{}.{} {:?}-endian, {}, snaplen {}, link type {}",
            header.version_major,
            header.version_minor,
            header.endianness,
            header.resolution,
            header.snaplen,
            header.network
        );
        Ok(PcapReader {
            r,
            header,
            failed: false,
        })
    }

    pub fn header(&self) -> &PcapHeader {
        &self.header
    }

    /// Read next record
    ///
    /// Returns `Ok(None)` when the stream ends on a record boundary.
    pub fn read_packet(&mut self) -> Result<Option<Packet>, Error> {
        let mut rec = [0u8; PCAP_RECORD_HEADER_LEN];
        match read_full(&mut self.r, &mut rec)? {
            0 => return Ok(None),
            PCAP_RECORD_HEADER_LEN => (),
            _ => return Err(Error::Truncated("pcap record header")),
        }
        let e = self.header.endianness;
        let ts_sec = e.read_u32(&rec[0..4]);
        let ts_subsec = e.read_u32(&rec[4..8]);
        let caplen = e.read_u32(&rec[8..12]);
        let origlen = e.read_u32(&rec[12..16]);
        // snaplen 0 is written by some tools and means no limit
        let limit = match self.header.snaplen {
            0 => MAX_RECORD_LEN,
            snaplen => snaplen.min(MAX_RECORD_LEN),
        };
        if caplen > limit {
            return Err(Error::MalformedRecord(format!(
                "captured length {} exceeds limit {}",
                caplen, limit
            )));
        }
        // the header is untrusted: allocate as bytes arrive
        let mut data = Vec::with_capacity(caplen.min(RECORD_PREALLOC) as usize);
        (&mut self.r)
            .take(u64::from(caplen))
            .read_to_end(&mut data)?;
        if data.len() < caplen as usize {
            return Err(Error::Truncated("pcap record data"));
        }
        let nanos = u64::from(ts_subsec) * u64::from(NANOS_PER_SEC / self.header.subsec_units());
        let ts = Timestamp::new(
            u64::from(ts_sec) + nanos / u64::from(NANOS_PER_SEC),
            (nanos % u64::from(NANOS_PER_SEC)) as u32,
        );
        Ok(Some(Packet {
            interface: 0,
            ts,
            caplen,
            origlen,
            data,
            options: Vec::new(),
        }))
    }

    pub fn into_inner(self) -> R {
        self.r
    }
}

/// Iterate over records. Iteration stops after the first error.
impl<R: Read> Iterator for PcapReader<R> {
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
    use std::io::Cursor;

    fn file(snaplen: u32, caplen: u32, data: &[u8]) -> Vec<u8> {
        let mut buf = vec![0xd4, 0xc3, 0xb2, 0xa1, 2, 0, 4, 0];
        buf.extend_from_slice(&[0; 8]);
        buf.extend_from_slice(&snaplen.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&caplen.to_le_bytes());
        buf.extend_from_slice(&caplen.to_le_bytes());
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn pcap_huge_caplen_rejected() {
        let mut r = PcapReader::new(Cursor::new(file(u32::MAX, 0xffff_fff0, &[1, 2, 3]))).unwrap();
        assert!(matches!(r.read_packet(), Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn pcap_large_caplen_short_stream() {
        let buf = file(u32::MAX, MAX_RECORD_LEN, &[1, 2, 3]);
        let mut r = PcapReader::new(Cursor::new(buf)).unwrap();
        assert!(matches!(r.read_packet(), Err(Error::Truncated(_))));

        let buf = file(0, 3, &[1, 2, 3]);
        let mut r = PcapReader::new(Cursor::new(buf)).unwrap();
        assert_eq!(r.read_packet().unwrap().unwrap().data, vec![1, 2, 3]);
    }
}
