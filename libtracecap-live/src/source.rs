use crate::packet::{LivePacket, LiveStats};
use libtracecap_tools::bpf::BpfProgram;
use libtracecap_tools::{Error, Linktype};

/// A source of live packets
///
/// All methods take `&self`: a source is shared between its reader thread and
/// the code that closes it. After `close()`, `read_packet` returns
/// `Error::HandleClosed`.
pub trait PacketSource: Send + Sync {
    /// Interface name
    fn name(&self) -> &str;

    fn link_type(&self) -> Linktype;

    fn snaplen(&self) -> u32;

    /// Wait for the next packet
    ///
    /// Returns `Error::Timeout` when the read timeout expires, and
    /// `Error::HandleClosed` once the source is closed.
    fn read_packet(&self) -> Result<LivePacket, Error>;

    /// Send a raw frame on the interface
    fn write_packet_data(&self, _data: &[u8]) -> Result<usize, Error> {
        Err(Error::NotSupported("packet injection"))
    }

    /// Underlying file descriptor, if any
    fn raw_fd(&self) -> Option<i32> {
        None
    }

    /// Install `program` in the kernel
    ///
    /// Returns `Ok(false)` if the source cannot filter: the caller then has to
    /// filter in user space.
    fn attach_filter(&self, _program: &BpfProgram) -> Result<bool, Error> {
        Ok(false)
    }

    fn stats(&self) -> Result<LiveStats, Error>;

    /// Release the source. Closing twice is not an error.
    fn close(&self) -> Result<(), Error>;
}
