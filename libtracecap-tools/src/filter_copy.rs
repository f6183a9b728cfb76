//! Copy a trace, keeping only the packets accepted by a BPF program

use crate::bpf::BpfVm;
use crate::error::Error;
use crate::pcap::{PcapReader, PcapWriter, PcapWriterOptions, MAX_RECORD_LEN};
use crate::pcapng::{
    InterfaceDescription, PcapNGReader, PcapNGWriter, PcapNGWriterOptions, IF_TSOFFSET,
    IF_TSRESOL,
};
use crate::resolution::TsResolution;
use crate::traits::TraceReader;
use std::collections::HashMap;
use std::io::{Read, Write};

/// Copy packets from `input` to `output` if `vm` returns a non-zero verdict
///
/// The output has the format of the input. Packets are copied whole with their
/// timestamps, the verdict only decides whether a packet is kept. Returns the
/// number of packets written.
pub fn filter_copy<R: Read, W: Write>(input: R, output: W, vm: &BpfVm) -> Result<usize, Error> {
    match TraceReader::open(input)? {
        TraceReader::Pcap(reader) => copy_pcap(reader, output, vm),
        TraceReader::PcapNG(reader) => copy_pcapng(reader, output, vm),
    }
}

fn copy_pcap<R: Read, W: Write>(
    mut reader: PcapReader<R>,
    output: W,
    vm: &BpfVm,
) -> Result<usize, Error> {
    let header = reader.header().clone();
    let options = PcapWriterOptions {
        endianness: header.endianness,
        resolution: header.resolution,
        // unlimited input: advertise the largest record the reader accepts
        snaplen: match header.snaplen {
            0 => MAX_RECORD_LEN,
            n => n,
        },
        link_type: header.network,
        buffered: true,
        version_major: header.version_major,
        version_minor: header.version_minor,
        thiszone: header.thiszone,
        sigfigs: header.sigfigs,
    };
    let mut writer = PcapWriter::with_options(output, options)?;
    let (mut seen, mut kept) = (0usize, 0usize);
    while let Some(packet) = reader.read_packet()? {
        seen += 1;
        if vm.matches(&packet.data) {
            writer.write_record(&packet)?;
            kept += 1;
        }
    }
    writer.close()?;
    debug!("filter copy (pcap): kept {}/{} packets", kept, seen);
    Ok(kept)
}

fn copy_pcapng<R: Read, W: Write>(
    mut reader: PcapNGReader<R>,
    output: W,
    vm: &BpfVm,
) -> Result<usize, Error> {
    let options = PcapNGWriterOptions {
        endianness: reader.section().endianness,
        buffered: true,
        ..Default::default()
    };
    let mut writer = PcapNGWriter::with_options(output, options)?;
    // (section, source interface) -> output interface
    let mut if_map: HashMap<(usize, u32), u32> = HashMap::new();
    let (mut seen, mut kept) = (0usize, 0usize);
    while let Some(packet) = reader.read_packet()? {
        seen += 1;
        if !vm.matches(&packet.data) {
            continue;
        }
        let key = (reader.section_index(), packet.interface);
        let out_id = match if_map.get(&key) {
            Some(id) => *id,
            None => {
                let desc = match reader.interface(packet.interface) {
                    Some(src) => InterfaceDescription {
                        link_type: src.link_type,
                        snaplen: src.snaplen,
                        resolution: if src.resolution.is_finer_than_micro() {
                            TsResolution::NANO
                        } else {
                            TsResolution::MICRO
                        },
                        name: None,
                        // timestamps are rebased on read and re-encoded on write
                        options: src
                            .options
                            .iter()
                            .filter(|o| o.code != IF_TSRESOL && o.code != IF_TSOFFSET)
                            .cloned()
                            .collect(),
                    },
                    None => InterfaceDescription::default(),
                };
                let id = writer.add_interface(&desc)?;
                trace!("filter copy: interface {:?} -> {}", key, id);
                if_map.insert(key, id);
                id
            }
        };
        writer.write_record(
            out_id,
            &packet.data,
            packet.origlen,
            packet.ts,
            &packet.options,
        )?;
        kept += 1;
    }
    writer.close()?;
    debug!("filter copy (pcap-ng): kept {}/{} packets", kept, seen);
    Ok(kept)
}
