use crate::input::open_input;
use clap::Args;
use libtracecap_tools::pcapng::Block;
use libtracecap_tools::{
    Endianness, Error, Linktype, Packet, Timestamp, TraceFormat, TraceReader, TsResolution,
};
use std::io::Read;
use time::OffsetDateTime;

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Input trace (`-` for stdin)
    input: String,
}

pub struct InterfaceInfo {
    pub link_type: Linktype,
    pub snaplen: u32,
    pub resolution: TsResolution,
    pub name: Option<String>,
    pub num_packets: usize,
}

pub struct TraceInfo {
    pub format: TraceFormat,
    pub version_major: u16,
    pub version_minor: u16,
    pub endianness: Endianness,
    pub num_sections: usize,
    pub interfaces: Vec<InterfaceInfo>,
    pub num_packets: usize,
    pub data_bytes: u64,
    pub first_packet: Option<Timestamp>,
    pub last_packet: Option<Timestamp>,
    pub strict_time_order: bool,
}

impl TraceInfo {
    fn new(format: TraceFormat, version: (u16, u16), endianness: Endianness) -> Self {
        TraceInfo {
            format,
            version_major: version.0,
            version_minor: version.1,
            endianness,
            num_sections: 1,
            interfaces: Vec::new(),
            num_packets: 0,
            data_bytes: 0,
            first_packet: None,
            last_packet: None,
            strict_time_order: true,
        }
    }

    fn add_packet(&mut self, packet: &Packet, iface: Option<usize>) {
        self.num_packets += 1;
        self.data_bytes += u64::from(packet.caplen);
        if let Some(info) = iface.and_then(|i| self.interfaces.get_mut(i)) {
            info.num_packets += 1;
        }
        if let Some(last) = self.last_packet {
            if packet.ts < last {
                self.strict_time_order = false;
            }
        }
        self.first_packet = Some(self.first_packet.map_or(packet.ts, |t| t.min(packet.ts)));
        self.last_packet = Some(self.last_packet.map_or(packet.ts, |t| t.max(packet.ts)));
    }
}

/// Read the whole trace and collect its properties
pub fn trace_info<R: Read>(input: R) -> Result<TraceInfo, Error> {
    match TraceReader::open(input)? {
        TraceReader::Pcap(mut reader) => {
            let h = reader.header().clone();
            let mut info = TraceInfo::new(
                TraceFormat::Pcap,
                (h.version_major, h.version_minor),
                h.endianness,
            );
            info.interfaces.push(InterfaceInfo {
                link_type: h.network,
                snaplen: h.snaplen,
                resolution: h.resolution,
                name: None,
                num_packets: 0,
            });
            while let Some(packet) = reader.read_packet()? {
                info.add_packet(&packet, Some(0));
            }
            Ok(info)
        }
        TraceReader::PcapNG(mut reader) => {
            let s = reader.section();
            let mut info = TraceInfo::new(
                TraceFormat::PcapNG,
                (s.major_version, s.minor_version),
                s.endianness,
            );
            // interfaces of previous sections
            let mut base = 0;
            while let Some(block) = reader.next_block()? {
                match block {
                    Block::SectionHeader(_) => {
                        info.num_sections += 1;
                        base = info.interfaces.len();
                    }
                    Block::InterfaceDescription(i) => info.interfaces.push(InterfaceInfo {
                        link_type: i.link_type,
                        snaplen: i.snaplen,
                        resolution: i.resolution,
                        name: i.name,
                        num_packets: 0,
                    }),
                    Block::EnhancedPacket(p) => {
                        let iface = base + p.interface as usize;
                        info.add_packet(&p, Some(iface));
                    }
                    Block::InterfaceStatistics(_) | Block::Unknown { .. } => (),
                }
            }
            Ok(info)
        }
    }
}

fn format_ts(ts: Timestamp) -> String {
    let nanos = i128::from(ts.secs) * 1_000_000_000 + i128::from(ts.nanos);
    match OffsetDateTime::from_unix_timestamp_nanos(nanos) {
        Ok(t) => format!("{} ({})", t, ts),
        Err(_) => ts.to_string(),
    }
}

pub fn run(args: InfoArgs) -> Result<(), Error> {
    let input = open_input(&args.input)?;
    let info = trace_info(input)?;

    println!("File name: {}", args.input);
    println!("File type: {}", info.format);
    println!("Version: {}.{}", info.version_major, info.version_minor);
    println!("Byte order: {:?}-endian", info.endianness);
    if info.format == TraceFormat::PcapNG {
        println!("Sections: {}", info.num_sections);
    }
    println!("Interfaces: {}", info.interfaces.len());
    for (idx, i) in info.interfaces.iter().enumerate() {
        println!(
            "  {}: {} link type {} snaplen {} resolution {} ({} packets)",
            idx,
            i.name.as_deref().unwrap_or("-"),
            i.link_type,
            i.snaplen,
            i.resolution,
            i.num_packets
        );
    }
    println!("Packets: {}", info.num_packets);
    println!("Data bytes: {}", info.data_bytes);
    if let (Some(first), Some(last)) = (info.first_packet, info.last_packet) {
        println!("First packet: {}", format_ts(first));
        println!("Last packet: {}", format_ts(last));
        if let Some(d) = last.checked_sub(first) {
            println!("Capture duration: {}.{:09}s", d.as_secs(), d.subsec_nanos());
        }
    }
    println!("Strict time order: {}", info.strict_time_order);
    Ok(())
}
