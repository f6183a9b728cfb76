//! Live packet capture
//!
//! On Linux, [`open_live`] returns an `AF_PACKET` handle, optionally reading
//! through a memory-mapped TPACKET_V3 ring. Other platforms return
//! `Error::NotSupported`, but still report link information.
//!
//! [`Capture`] drives several sources at once and records them to a pcap or
//! pcap-ng trace.

#[macro_use]
extern crate tracing;

mod capture;
mod config;
mod link;
mod packet;
mod source;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod unsupported;

pub use capture::*;
pub use config::*;
pub use link::{link_info, LinkInfo};
pub use packet::*;
pub use source::PacketSource;

#[cfg(target_os = "linux")]
pub use linux::{open_live, LiveHandle};
#[cfg(not(target_os = "linux"))]
pub use unsupported::{open_live, LiveHandle};
