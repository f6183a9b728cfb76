use libtracecap_tools::{Packet, Timestamp};

/// A packet received from a live handle
///
/// `data` is a private copy: it never aliases kernel or handle buffers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LivePacket {
    pub data: Vec<u8>,
    pub ts: Timestamp,
    /// Number of bytes in `data`
    pub caplen: u32,
    /// Length of the packet on the wire
    pub origlen: u32,
    /// Index of the interface the packet was received on
    pub if_index: u32,
}

impl LivePacket {
    /// Convert to a trace record for interface `interface`
    pub fn into_packet(self, interface: u32) -> Packet {
        Packet {
            interface,
            ts: self.ts,
            caplen: self.caplen,
            origlen: self.origlen.max(self.caplen),
            data: self.data,
            options: Vec::new(),
        }
    }
}

/// Receive counters of a live handle
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LiveStats {
    pub received: u64,
    pub dropped: u64,
}
