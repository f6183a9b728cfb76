use super::block::encode_block;
use super::option::*;
use super::{BOM_MAGIC, EPB_MAGIC, IDB_MAGIC, ISB_MAGIC, SHB_MAGIC};
use crate::endian::Endianness;
use crate::error::Error;
use crate::io_util::{pad4, Sink};
use crate::linktype::Linktype;
use crate::pcap::DEFAULT_SNAPLEN;
use crate::resolution::TsResolution;
use crate::timestamp::Timestamp;
use std::io::Write;

/// Options of [`PcapNGWriter`]
#[derive(Clone, Debug)]
pub struct PcapNGWriterOptions {
    pub endianness: Endianness,
    /// Section length written in the header, -1 if unknown
    pub section_length: i64,
    /// Section header options (`shb_userappl`, `shb_os`, ...)
    pub shb_options: Vec<PcapNGOption>,
    /// Wrap the sink in a `BufWriter`
    pub buffered: bool,
}

impl Default for PcapNGWriterOptions {
    fn default() -> Self {
        PcapNGWriterOptions {
            endianness: Endianness::Little,
            section_length: -1,
            shb_options: Vec::new(),
            buffered: false,
        }
    }
}

/// Parameters of an interface to declare in a pcap-ng output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceDescription {
    pub link_type: Linktype,
    /// 0 means no limit
    pub snaplen: u32,
    /// Microseconds or nanoseconds. Ignored if `options` contains `if_tsresol`.
    pub resolution: TsResolution,
    /// Emitted as `if_name` unless `options` already has one
    pub name: Option<String>,
    pub options: Vec<PcapNGOption>,
}

impl InterfaceDescription {
    pub fn new(link_type: Linktype, snaplen: u32) -> Self {
        InterfaceDescription {
            link_type,
            snaplen,
            ..Default::default()
        }
    }
}

impl Default for InterfaceDescription {
    fn default() -> Self {
        InterfaceDescription {
            link_type: Linktype::ETHERNET,
            snaplen: DEFAULT_SNAPLEN,
            resolution: TsResolution::MICRO,
            name: None,
            options: Vec::new(),
        }
    }
}

struct OutputInterface {
    snaplen: u32,
    units_per_sec: u64,
}

/// Writer for the pcap-ng format
///
/// A single section is written. The Section Header Block is emitted when the
/// writer is created, an Interface Description Block by each call to
/// [`add_interface`](PcapNGWriter::add_interface).
pub struct PcapNGWriter<W: Write> {
    sink: Option<Sink<W>>,
    endianness: Endianness,
    interfaces: Vec<OutputInterface>,
}

impl<W: Write> PcapNGWriter<W> {
    /// Create a little-endian writer
    pub fn new(w: W) -> Result<Self, Error> {
        PcapNGWriter::with_options(w, PcapNGWriterOptions::default())
    }

    pub fn with_options(w: W, options: PcapNGWriterOptions) -> Result<Self, Error> {
        let e = options.endianness;
        let mut body = Vec::with_capacity(16 + options_len(&options.shb_options));
        // written in the section byte order, so that it reads back as 0x1A2B3C4D
        e.write_u32(&mut body, BOM_MAGIC)?;
        e.write_u16(&mut body, 1)?;
        e.write_u16(&mut body, 0)?;
        e.write_i64(&mut body, options.section_length)?;
        write_options(&mut body, e, &options.shb_options)?;
        let block = encode_block(e, SHB_MAGIC, &body)?;
        let mut sink = Sink::new(w, options.buffered);
        sink.write_all(&block)?;
        Ok(PcapNGWriter {
            sink: Some(sink),
            endianness: e,
            interfaces: Vec::new(),
        })
    }

    fn sink(&mut self) -> Result<&mut Sink<W>, Error> {
        self.sink.as_mut().ok_or(Error::HandleClosed)
    }

    /// Number of interfaces declared so far
    pub fn num_interfaces(&self) -> usize {
        self.interfaces.len()
    }

    /// Emit an Interface Description Block, returning the new interface id
    pub fn add_interface(&mut self, desc: &InterfaceDescription) -> Result<u32, Error> {
        let link_type = u16::try_from(desc.link_type.0).map_err(|_| {
            Error::Config(format!("link type {} does not fit pcap-ng", desc.link_type))
        })?;
        let mut options = desc.options.clone();
        let resolution = match find_option(&options, IF_TSRESOL) {
            Some(o) => o
                .value
                .first()
                .copied()
                .and_then(TsResolution::from_tsresol)
                .ok_or_else(|| Error::config("invalid if_tsresol option"))?,
            None => {
                options.push(PcapNGOption::new(IF_TSRESOL, vec![desc.resolution.tsresol()]));
                desc.resolution
            }
        };
        if !resolution.is_micro() && !resolution.is_nano() {
            return Err(Error::Config(format!(
                "unsupported interface resolution {}",
                resolution
            )));
        }
        if let Some(name) = &desc.name {
            if find_option(&options, IF_NAME).is_none() {
                options.insert(0, PcapNGOption::string(IF_NAME, name));
            }
        }
        let e = self.endianness;
        let mut body = Vec::with_capacity(8 + options_len(&options));
        e.write_u16(&mut body, link_type)?;
        e.write_u16(&mut body, 0)?;
        e.write_u32(&mut body, desc.snaplen)?;
        write_options(&mut body, e, &options)?;
        let block = encode_block(e, IDB_MAGIC, &body)?;
        self.sink()?.write_all(&block)?;
        let id = self.interfaces.len() as u32;
        self.interfaces.push(OutputInterface {
            snaplen: desc.snaplen,
            units_per_sec: resolution.units_per_sec().unwrap_or(1_000_000),
        });
        Ok(id)
    }

    /// Emit an Enhanced Packet Block, returning the number of bytes written
    ///
    /// `data` is truncated to the interface snaplen. A zero `origlen` defaults to
    /// the data length, a null timestamp to the current time.
    pub fn write_packet(
        &mut self,
        interface: u32,
        data: &[u8],
        origlen: u32,
        ts: Timestamp,
        options: &[PcapNGOption],
    ) -> Result<usize, Error> {
        self.encode_epb(interface, data, origlen, ts.or_now(), options)
    }

    /// Like [`write_packet`](Self::write_packet), but a null timestamp is kept
    /// as is. Used to copy records from another trace.
    pub fn write_record(
        &mut self,
        interface: u32,
        data: &[u8],
        origlen: u32,
        ts: Timestamp,
        options: &[PcapNGOption],
    ) -> Result<usize, Error> {
        self.encode_epb(interface, data, origlen, ts, options)
    }

    fn encode_epb(
        &mut self,
        interface: u32,
        data: &[u8],
        origlen: u32,
        ts: Timestamp,
        options: &[PcapNGOption],
    ) -> Result<usize, Error> {
        let iface = self
            .interfaces
            .get(interface as usize)
            .ok_or(Error::UnknownInterface(interface))?;
        let caplen = match iface.snaplen {
            0 => data.len(),
            snaplen => data.len().min(snaplen as usize),
        };
        let origlen = match origlen {
            0 => data.len() as u32,
            n => n,
        };
        if (origlen as usize) < caplen {
            return Err(Error::MalformedRecord(format!(
                "original length {} shorter than captured length {}",
                origlen, caplen
            )));
        }
        let ticks = ts.to_ticks(iface.units_per_sec);
        let e = self.endianness;
        let mut body = Vec::with_capacity(20 + caplen + 3 + options_len(options));
        e.write_u32(&mut body, interface)?;
        e.write_u32(&mut body, (ticks >> 32) as u32)?;
        e.write_u32(&mut body, (ticks & 0xffff_ffff) as u32)?;
        e.write_u32(&mut body, caplen as u32)?;
        e.write_u32(&mut body, origlen)?;
        body.extend_from_slice(&data[..caplen]);
        body.resize(body.len() + pad4(caplen), 0);
        write_options(&mut body, e, options)?;
        let block = encode_block(e, EPB_MAGIC, &body)?;
        self.sink()?.write_all(&block)?;
        Ok(block.len())
    }

    /// Emit an Interface Statistics Block with `isb_ifrecv` and `isb_ifdrop`
    pub fn write_interface_statistics(
        &mut self,
        interface: u32,
        ts: Timestamp,
        received: u64,
        dropped: u64,
    ) -> Result<usize, Error> {
        let iface = self
            .interfaces
            .get(interface as usize)
            .ok_or(Error::UnknownInterface(interface))?;
        let ticks = ts.to_ticks(iface.units_per_sec);
        let e = self.endianness;
        let options = [
            PcapNGOption::u64(ISB_IFRECV, e, received),
            PcapNGOption::u64(ISB_IFDROP, e, dropped),
        ];
        let mut body = Vec::with_capacity(12 + options_len(&options));
        e.write_u32(&mut body, interface)?;
        e.write_u32(&mut body, (ticks >> 32) as u32)?;
        e.write_u32(&mut body, (ticks & 0xffff_ffff) as u32)?;
        write_options(&mut body, e, &options)?;
        let block = encode_block(e, ISB_MAGIC, &body)?;
        self.sink()?.write_all(&block)?;
        Ok(block.len())
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
