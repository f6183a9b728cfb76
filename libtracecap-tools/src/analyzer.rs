use crate::error::Error;
use crate::linktype::Linktype;
use crate::packet::Packet;
use crate::timestamp::Timestamp;
use crate::traits::TraceFormat;
use std::time::Duration;

/// Trace parsing context, passed with every packet
#[derive(Clone, Debug, Default)]
pub struct ParseContext {
    pub format: TraceFormat,
    /// Link type of the interface the current packet was captured on
    pub link_type: Linktype,
    /// Timestamp of first packet seen
    pub first_packet_ts: Timestamp,
    /// Timestamp of current packet, relative to the first one
    pub rel_ts: Duration,
    /// Index of current packet in the trace, starting at 1
    pub packet_index: usize,
}

/// Common trait for trace analyzers
pub trait PacketAnalyzer {
    /// Initialization function, called before reading data (optional)
    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Callback function for every packet
    fn handle_packet(&mut self, packet: &Packet, ctx: &ParseContext) -> Result<(), Error>;

    /// Teardown function, called after reading data (optional)
    fn teardown(&mut self) {}
}
