use crate::error::Error;
use crate::io_util::read_full;
use crate::linktype::Linktype;
use crate::packet::Packet;
use crate::pcap::{PcapHeader, PcapReader, PcapWriter};
use crate::pcapng::{InterfaceDescription, PcapNGReader, PcapNGWriter, SHB_MAGIC};
use crate::timestamp::Timestamp;
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Trace file format
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum TraceFormat {
    /// Legacy pcap (single interface)
    Pcap,
    #[default]
    PcapNG,
}

impl FromStr for TraceFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pcap" => Ok(TraceFormat::Pcap),
            "pcapng" | "pcap-ng" => Ok(TraceFormat::PcapNG),
            _ => Err(Error::Config(format!("unknown trace format '{}'", s))),
        }
    }
}

impl fmt::Display for TraceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceFormat::Pcap => f.write_str("pcap"),
            TraceFormat::PcapNG => f.write_str("pcapng"),
        }
    }
}

/// Common interface of trace writers
pub trait TraceWriter {
    /// Declare a capture interface, returning the id packets must use
    fn add_interface(&mut self, desc: &InterfaceDescription) -> Result<u32, Error>;

    /// Write a packet record, returning the number of bytes written
    ///
    /// `packet.interface` is an id returned by `add_interface`.
    fn write_packet(&mut self, packet: &Packet) -> Result<usize, Error>;

    /// Record capture statistics for an interface (optional)
    fn write_statistics(
        &mut self,
        _interface: u32,
        _ts: Timestamp,
        _received: u64,
        _dropped: u64,
    ) -> Result<usize, Error> {
        Ok(0)
    }

    /// Flush and release the sink
    fn close(&mut self) -> Result<(), Error>;
}

/// Legacy pcap has a single, implicit interface (id 0), whose parameters come
/// from the file header
impl<W: Write> TraceWriter for PcapWriter<W> {
    fn add_interface(&mut self, desc: &InterfaceDescription) -> Result<u32, Error> {
        if desc.link_type != self.header().network {
            return Err(Error::Config(format!(
                "pcap output has link type {}, cannot add interface with link type {}",
                self.header().network,
                desc.link_type
            )));
        }
        Ok(0)
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<usize, Error> {
        if packet.interface != 0 {
            return Err(Error::UnknownInterface(packet.interface));
        }
        PcapWriter::write_packet(self, packet)
    }

    fn close(&mut self) -> Result<(), Error> {
        PcapWriter::close(self)
    }
}

impl<W: Write> TraceWriter for PcapNGWriter<W> {
    fn add_interface(&mut self, desc: &InterfaceDescription) -> Result<u32, Error> {
        PcapNGWriter::add_interface(self, desc)
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<usize, Error> {
        let data = match packet.caplen as usize {
            0 => &packet.data[..],
            n if n <= packet.data.len() => &packet.data[..n],
            n => {
                return Err(Error::MalformedRecord(format!(
                    "data length {} shorter than captured length {}",
                    packet.data.len(),
                    n
                )))
            }
        };
        PcapNGWriter::write_packet(
            self,
            packet.interface,
            data,
            packet.origlen,
            packet.ts,
            &packet.options,
        )
    }

    fn write_statistics(
        &mut self,
        interface: u32,
        ts: Timestamp,
        received: u64,
        dropped: u64,
    ) -> Result<usize, Error> {
        self.write_interface_statistics(interface, ts, received, dropped)
    }

    fn close(&mut self) -> Result<(), Error> {
        PcapNGWriter::close(self)
    }
}

/// Reader for either trace format, selected from the first bytes of the stream
pub enum TraceReader<R: Read> {
    Pcap(PcapReader<R>),
    PcapNG(PcapNGReader<R>),
}

impl<R: Read> TraceReader<R> {
    /// Detect the format and read the file header
    pub fn open(mut r: R) -> Result<Self, Error> {
        let mut magic = [0u8; 4];
        if read_full(&mut r, &mut magic)? < magic.len() {
            return Err(Error::Truncated("file magic"));
        }
        if BigEndian::read_u32(&magic) == SHB_MAGIC {
            PcapNGReader::after_magic(magic, r).map(TraceReader::PcapNG)
        } else {
            // fail early with BadMagic
            PcapHeader::parse_magic(magic)?;
            PcapReader::after_magic(magic, r).map(TraceReader::Pcap)
        }
    }

    pub fn format(&self) -> TraceFormat {
        match self {
            TraceReader::Pcap(_) => TraceFormat::Pcap,
            TraceReader::PcapNG(_) => TraceFormat::PcapNG,
        }
    }

    /// Read next packet, `Ok(None)` at end of stream
    pub fn read_packet(&mut self) -> Result<Option<Packet>, Error> {
        match self {
            TraceReader::Pcap(r) => r.read_packet(),
            TraceReader::PcapNG(r) => r.read_packet(),
        }
    }

    /// Link type of an interface (always the file link type for legacy pcap)
    pub fn link_type(&self, interface: u32) -> Option<Linktype> {
        match self {
            TraceReader::Pcap(r) => Some(r.header().network),
            TraceReader::PcapNG(r) => r.interface(interface).map(|i| i.link_type),
        }
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<Packet, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            TraceReader::Pcap(r) => r.next(),
            TraceReader::PcapNG(r) => r.next(),
        }
    }
}
