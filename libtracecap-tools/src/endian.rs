use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use std::io;

/// Byte order of a trace file (or of the current pcap-ng section)
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

impl Endianness {
    /// Byte order of the running host
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    #[inline]
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endianness::Big => BigEndian::read_u16(buf),
            Endianness::Little => LittleEndian::read_u16(buf),
        }
    }

    #[inline]
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endianness::Big => BigEndian::read_u32(buf),
            Endianness::Little => LittleEndian::read_u32(buf),
        }
    }

    #[inline]
    pub fn read_i32(self, buf: &[u8]) -> i32 {
        match self {
            Endianness::Big => BigEndian::read_i32(buf),
            Endianness::Little => LittleEndian::read_i32(buf),
        }
    }

    #[inline]
    pub fn read_u64(self, buf: &[u8]) -> u64 {
        match self {
            Endianness::Big => BigEndian::read_u64(buf),
            Endianness::Little => LittleEndian::read_u64(buf),
        }
    }

    #[inline]
    pub fn read_i64(self, buf: &[u8]) -> i64 {
        match self {
            Endianness::Big => BigEndian::read_i64(buf),
            Endianness::Little => LittleEndian::read_i64(buf),
        }
    }

    pub fn write_u16<W: io::Write>(self, w: &mut W, v: u16) -> io::Result<()> {
        match self {
            Endianness::Big => w.write_u16::<BigEndian>(v),
            Endianness::Little => w.write_u16::<LittleEndian>(v),
        }
    }

    pub fn write_u32<W: io::Write>(self, w: &mut W, v: u32) -> io::Result<()> {
        match self {
            Endianness::Big => w.write_u32::<BigEndian>(v),
            Endianness::Little => w.write_u32::<LittleEndian>(v),
        }
    }

    pub fn write_i32<W: io::Write>(self, w: &mut W, v: i32) -> io::Result<()> {
        match self {
            Endianness::Big => w.write_i32::<BigEndian>(v),
            Endianness::Little => w.write_i32::<LittleEndian>(v),
        }
    }

    pub fn write_u64<W: io::Write>(self, w: &mut W, v: u64) -> io::Result<()> {
        match self {
            Endianness::Big => w.write_u64::<BigEndian>(v),
            Endianness::Little => w.write_u64::<LittleEndian>(v),
        }
    }

    pub fn write_i64<W: io::Write>(self, w: &mut W, v: i64) -> io::Result<()> {
        match self {
            Endianness::Big => w.write_i64::<BigEndian>(v),
            Endianness::Little => w.write_i64::<LittleEndian>(v),
        }
    }
}
