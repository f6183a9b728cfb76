//! pcap-ng file format
//!
//! Only the blocks needed to store captures are interpreted: Section Header,
//! Interface Description, Enhanced Packet and Interface Statistics. Other blocks
//! are skipped by the reader.

mod block;
mod option;
mod reader;
mod writer;

pub use block::*;
pub use option::*;
pub use reader::*;
pub use writer::*;

pub const SHB_MAGIC: u32 = 0x0A0D_0D0A;
pub const IDB_MAGIC: u32 = 0x0000_0001;
pub const SPB_MAGIC: u32 = 0x0000_0003;
pub const NRB_MAGIC: u32 = 0x0000_0004;
pub const ISB_MAGIC: u32 = 0x0000_0005;
pub const EPB_MAGIC: u32 = 0x0000_0006;

/// Byte-order magic of the section header
pub const BOM_MAGIC: u32 = 0x1A2B_3C4D;

/// Largest block accepted by the reader
pub const MAX_BLOCK_LEN: u32 = 64 * 1024 * 1024;
