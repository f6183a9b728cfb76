use crate::pcapng::PcapNGOption;
use crate::timestamp::Timestamp;

/// A packet record read from, or to be written to, a trace file
///
/// `data` is owned: records are independent from the reader buffers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    /// Interface identifier (pcap-ng), always 0 for legacy pcap
    pub interface: u32,
    pub ts: Timestamp,
    /// Number of bytes stored in the file
    pub caplen: u32,
    /// Length of the packet on the wire
    pub origlen: u32,
    pub data: Vec<u8>,
    /// pcap-ng packet options (empty for legacy pcap)
    pub options: Vec<PcapNGOption>,
}

impl Packet {
    /// Build a packet from data, with lengths set to the data length
    pub fn new(ts: Timestamp, data: Vec<u8>) -> Packet {
        let len = data.len() as u32;
        Packet {
            interface: 0,
            ts,
            caplen: len,
            origlen: len,
            data,
            options: Vec::new(),
        }
    }
}
