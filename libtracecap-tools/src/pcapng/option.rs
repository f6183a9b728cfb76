use crate::endian::Endianness;
use crate::error::Error;
use crate::io_util::pad4;
use std::io::Write;

pub const OPT_ENDOFOPT: u16 = 0;
pub const OPT_COMMENT: u16 = 1;

pub const SHB_HARDWARE: u16 = 2;
pub const SHB_OS: u16 = 3;
pub const SHB_USERAPPL: u16 = 4;

pub const IF_NAME: u16 = 2;
pub const IF_DESCRIPTION: u16 = 3;
pub const IF_SPEED: u16 = 8;
pub const IF_TSRESOL: u16 = 9;
pub const IF_FILTER: u16 = 11;
pub const IF_OS: u16 = 12;
pub const IF_TSOFFSET: u16 = 14;

pub const EPB_FLAGS: u16 = 2;
pub const EPB_DROPCOUNT: u16 = 4;

pub const ISB_STARTTIME: u16 = 2;
pub const ISB_ENDTIME: u16 = 3;
pub const ISB_IFRECV: u16 = 4;
pub const ISB_IFDROP: u16 = 5;

/// A pcap-ng option, as a raw TLV
///
/// Values are stored without padding. Multi-byte integers are in the byte
/// order of the section they belong to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcapNGOption {
    pub code: u16,
    pub value: Vec<u8>,
}

impl PcapNGOption {
    pub fn new(code: u16, value: Vec<u8>) -> Self {
        PcapNGOption { code, value }
    }

    /// UTF-8 string option (`opt_comment`, `if_name`, `shb_userappl`, ...)
    pub fn string(code: u16, s: &str) -> Self {
        PcapNGOption::new(code, s.as_bytes().to_vec())
    }

    pub fn u64(code: u16, endianness: Endianness, v: u64) -> Self {
        let mut value = Vec::with_capacity(8);
        // writing to a Vec cannot fail
        let _ = endianness.write_u64(&mut value, v);
        PcapNGOption::new(code, value)
    }

    /// Value as a string, with trailing NUL bytes removed
    pub fn as_str(&self) -> Option<&str> {
        let end = self
            .value
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        std::str::from_utf8(&self.value[..end]).ok()
    }

    /// Value as a 64-bit integer, if exactly 8 bytes long
    pub fn as_u64(&self, endianness: Endianness) -> Option<u64> {
        (self.value.len() == 8).then(|| endianness.read_u64(&self.value))
    }

    pub fn as_i64(&self, endianness: Endianness) -> Option<i64> {
        (self.value.len() == 8).then(|| endianness.read_i64(&self.value))
    }
}

/// Find the first option with the given code
pub fn find_option(options: &[PcapNGOption], code: u16) -> Option<&PcapNGOption> {
    options.iter().find(|o| o.code == code)
}

/// Parse an option list. Parsing stops at the end-of-options sentinel or at the
/// end of the buffer.
pub(crate) fn parse_options(
    endianness: Endianness,
    mut buf: &[u8],
) -> Result<Vec<PcapNGOption>, Error> {
    let mut options = Vec::new();
    while buf.len() >= 4 {
        let code = endianness.read_u16(&buf[0..2]);
        let len = endianness.read_u16(&buf[2..4]) as usize;
        if code == OPT_ENDOFOPT {
            break;
        }
        if 4 + len > buf.len() {
            return Err(Error::MalformedRecord(format!(
                "option {} length {} overflows block",
                code, len
            )));
        }
        options.push(PcapNGOption::new(code, buf[4..4 + len].to_vec()));
        let next = (4 + len + pad4(len)).min(buf.len());
        buf = &buf[next..];
    }
    Ok(options)
}

/// Encoded size of an option list, including the sentinel
pub(crate) fn options_len(options: &[PcapNGOption]) -> usize {
    if options.is_empty() {
        return 0;
    }
    let body: usize = options
        .iter()
        .map(|o| 4 + o.value.len() + pad4(o.value.len()))
        .sum();
    body + 4
}

/// Encode an option list followed by the sentinel. An empty list encodes to nothing.
pub(crate) fn write_options<W: Write>(
    w: &mut W,
    endianness: Endianness,
    options: &[PcapNGOption],
) -> Result<(), Error> {
    if options.is_empty() {
        return Ok(());
    }
    for o in options {
        if o.code == OPT_ENDOFOPT {
            return Err(Error::config("option code 0 is reserved"));
        }
        let len = u16::try_from(o.value.len()).map_err(|_| {
            Error::MalformedRecord(format!("option {} value too long", o.code))
        })?;
        endianness.write_u16(w, o.code)?;
        endianness.write_u16(w, len)?;
        w.write_all(&o.value)?;
        w.write_all(&[0u8; 3][..pad4(o.value.len())])?;
    }
    endianness.write_u16(w, OPT_ENDOFOPT)?;
    endianness.write_u16(w, 0)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_padding() {
        let options = vec![
            PcapNGOption::string(IF_NAME, "eth0"),
            PcapNGOption::new(IF_TSRESOL, vec![9]),
            PcapNGOption::string(OPT_COMMENT, "hello"),
        ];
        let mut buf = Vec::new();
        write_options(&mut buf, Endianness::Little, &options).unwrap();
        // 4+4, 4+1+3, 4+5+3, sentinel
        assert_eq!(buf.len(), 8 + 8 + 12 + 4);
        assert_eq!(buf.len(), options_len(&options));
        assert_eq!(buf.len() % 4, 0);
        assert_eq!(&buf[buf.len() - 4..], &[0, 0, 0, 0]);
        assert_eq!(&buf[8..13], &[9, 0, 1, 0, 9]);
        let parsed = parse_options(Endianness::Little, &buf).unwrap();
        assert_eq!(parsed, options);
        assert_eq!(parsed[0].as_str(), Some("eth0"));
    }

    #[test]
    fn option_empty_list() {
        let mut buf = Vec::new();
        write_options(&mut buf, Endianness::Big, &[]).unwrap();
        assert!(buf.is_empty());
        assert_eq!(options_len(&[]), 0);
        assert!(parse_options(Endianness::Big, &[]).unwrap().is_empty());
    }

    #[test]
    fn option_overflow() {
        // code 2, length 16, but only 4 bytes of value
        let buf = [0, 2, 0, 16, b'a', b'b', b'c', b'd'];
        assert!(matches!(
            parse_options(Endianness::Big, &buf),
            Err(Error::MalformedRecord(_))
        ));
    }

    #[test]
    fn option_integers() {
        let o = PcapNGOption::u64(ISB_IFRECV, Endianness::Big, 0x0102);
        assert_eq!(o.value, vec![0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(o.as_u64(Endianness::Big), Some(0x0102));
        assert_eq!(PcapNGOption::new(IF_NAME, vec![1]).as_u64(Endianness::Big), None);
        let o = PcapNGOption::new(IF_NAME, b"lo\0\0".to_vec());
        assert_eq!(o.as_str(), Some("lo"));
    }
}
