use super::header::*;
use crate::endian::Endianness;
use crate::error::Error;
use crate::io_util::Sink;
use crate::linktype::Linktype;
use crate::packet::Packet;
use crate::resolution::TsResolution;
use crate::timestamp::Timestamp;
use std::io::Write;

/// Options of [`PcapWriter`]
#[derive(Clone, Debug)]
pub struct PcapWriterOptions {
    pub endianness: Endianness,
    /// Sub-second unit, microseconds or nanoseconds
    pub resolution: TsResolution,
    /// Recorded in the header, not enforced on write. Must not be 0.
    pub snaplen: u32,
    pub link_type: Linktype,
    /// Wrap the sink in a `BufWriter`
    pub buffered: bool,
    pub version_major: u16,
    pub version_minor: u16,
    pub thiszone: i32,
    pub sigfigs: u32,
}

impl Default for PcapWriterOptions {
    fn default() -> Self {
        PcapWriterOptions {
            endianness: Endianness::Little,
            resolution: TsResolution::MICRO,
            snaplen: DEFAULT_SNAPLEN,
            link_type: Linktype::ETHERNET,
            buffered: false,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
        }
    }
}

/// Writer for the legacy pcap format
///
/// The file header is written when the writer is created.
pub struct PcapWriter<W: Write> {
    sink: Option<Sink<W>>,
    header: PcapHeader,
}

impl<W: Write> PcapWriter<W> {
    /// Create a writer with default options (little-endian, microseconds, Ethernet)
    pub fn new(w: W) -> Result<Self, Error> {
        PcapWriter::with_options(w, PcapWriterOptions::default())
    }

    pub fn with_options(w: W, options: PcapWriterOptions) -> Result<Self, Error> {
        if options.snaplen == 0 {
            return Err(Error::config("pcap snaplen must be greater than 0"));
        }
        if !options.resolution.is_micro() && !options.resolution.is_nano() {
            return Err(Error::Config(format!(
                "pcap cannot encode timestamp resolution {}",
                options.resolution
            )));
        }
        let header = PcapHeader {
            endianness: options.endianness,
            resolution: options.resolution,
            version_major: options.version_major,
            version_minor: options.version_minor,
            thiszone: options.thiszone,
            sigfigs: options.sigfigs,
            snaplen: options.snaplen,
            network: options.link_type,
        };
        let mut sink = Sink::new(w, options.buffered);
        sink.write_all(&header.to_vec()?)?;
        Ok(PcapWriter {
            sink: Some(sink),
            header,
        })
    }

    pub fn header(&self) -> &PcapHeader {
        &self.header
    }

    /// Write one record, returning the number of bytes written
    ///
    /// A null timestamp is replaced by the current time. Zero `caplen` and
    /// `origlen` default to the data length.
    pub fn write_packet(&mut self, packet: &Packet) -> Result<usize, Error> {
        self.encode(packet, packet.ts.or_now())
    }

    /// Write a record read from another trace, keeping its timestamp even if null
    pub fn write_record(&mut self, packet: &Packet) -> Result<usize, Error> {
        self.encode(packet, packet.ts)
    }

    fn encode(&mut self, packet: &Packet, ts: Timestamp) -> Result<usize, Error> {
        let sink = self.sink.as_mut().ok_or(Error::HandleClosed)?;
        let caplen = match packet.caplen {
            0 => packet.data.len() as u32,
            n => n,
        };
        let origlen = match packet.origlen {
            0 => packet.data.len() as u32,
            n => n,
        };
        if packet.data.len() < caplen as usize {
            return Err(Error::MalformedRecord(format!(
                "data length {} shorter than captured length {}",
                packet.data.len(),
                caplen
            )));
        }
        if origlen < caplen {
            return Err(Error::MalformedRecord(format!(
                "original length {} shorter than captured length {}",
                origlen, caplen
            )));
        }
        let ts_sec = u32::try_from(ts.secs).map_err(|_| {
            Error::MalformedRecord(format!("timestamp {} out of pcap range", ts.secs))
        })?;
        let ts_subsec = if self.header.resolution.is_nano() {
            ts.nanos
        } else {
            ts.micros()
        };
        let e = self.header.endianness;
        let mut rec = Vec::with_capacity(PCAP_RECORD_HEADER_LEN + caplen as usize);
        e.write_u32(&mut rec, ts_sec)?;
        e.write_u32(&mut rec, ts_subsec)?;
        e.write_u32(&mut rec, caplen)?;
        e.write_u32(&mut rec, origlen)?;
        rec.extend_from_slice(&packet.data[..caplen as usize]);
        sink.write_all(&rec)?;
        Ok(rec.len())
    }

    /// Flush pending data and release the sink. Calling `close` twice is a no-op.
    pub fn close(&mut self) -> Result<(), Error> {
        if let Some(sink) = self.sink.take() {
            drop(sink.into_inner()?);
        }
        Ok(())
    }

    /// Flush pending data and return the underlying writer
    pub fn into_inner(mut self) -> Result<W, Error> {
        let sink = self.sink.take().ok_or(Error::HandleClosed)?;
        Ok(sink.into_inner()?)
    }
}
