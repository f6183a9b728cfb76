//! Trace file codecs (pcap, pcap-ng), classic BPF interpreter and filtered copy
//!
//! Readers produce owned [`Packet`] records; writers implement the
//! [`TraceWriter`] trait so that capture code can target either format.

#![forbid(unsafe_code)]

#[macro_use]
extern crate tracing;

mod analyzer;
mod config;
mod endian;
mod engine;
mod error;
mod filter_copy;
mod io_util;
mod linktype;
mod packet;
mod resolution;
mod timestamp;
mod traits;

pub mod bpf;
pub mod pcap;
pub mod pcapng;

pub use analyzer::*;
pub use config::Config;
pub use endian::Endianness;
pub use engine::*;
pub use error::Error;
pub use filter_copy::filter_copy;
pub use linktype::Linktype;
pub use packet::Packet;
pub use pcap::{PcapReader, PcapWriter, PcapWriterOptions};
pub use pcapng::{InterfaceDescription, PcapNGReader, PcapNGWriter, PcapNGWriterOptions};
pub use resolution::TsResolution;
pub use timestamp::Timestamp;
pub use traits::*;
