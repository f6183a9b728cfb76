//! Legacy pcap (tcpdump) file format
//!
//! A 24-byte file header followed by records made of a 16-byte header and the
//! captured bytes. See <https://www.tcpdump.org/manpages/pcap-savefile.5.html>.

mod header;
mod reader;
mod writer;

pub use header::*;
pub use reader::*;
pub use writer::*;
