use std::fmt;

/// Timestamp resolution, encoded like the pcap-ng `if_tsresol` option
///
/// If the most significant bit is 0, the remaining bits give a negative power
/// of 10 (6 is microseconds); otherwise a negative power of 2.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TsResolution(u8);

impl TsResolution {
    pub const MICRO: TsResolution = TsResolution(6);
    pub const NANO: TsResolution = TsResolution(9);

    /// Validate a raw `if_tsresol` value
    ///
    /// Returns `None` if the resolution cannot be represented as a 64-bit unit count.
    pub fn from_tsresol(v: u8) -> Option<TsResolution> {
        let r = TsResolution(v);
        r.units_per_sec().map(|_| r)
    }

    /// Raw `if_tsresol` value
    #[inline]
    pub const fn tsresol(self) -> u8 {
        self.0
    }

    /// Number of timestamp units per second
    pub fn units_per_sec(self) -> Option<u64> {
        let exp = u32::from(self.0 & 0x7f);
        if self.0 & 0x80 == 0 {
            10u64.checked_pow(exp)
        } else {
            1u64.checked_shl(exp).filter(|_| exp < 64)
        }
    }

    #[inline]
    pub fn is_micro(self) -> bool {
        self == TsResolution::MICRO
    }

    #[inline]
    pub fn is_nano(self) -> bool {
        self == TsResolution::NANO
    }

    /// True if this resolution is strictly finer than microseconds
    pub fn is_finer_than_micro(self) -> bool {
        self.units_per_sec().map_or(false, |u| u > 1_000_000)
    }
}

impl Default for TsResolution {
    fn default() -> Self {
        TsResolution::MICRO
    }
}

impl fmt::Display for TsResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TsResolution::MICRO => f.write_str("microseconds"),
            TsResolution::NANO => f.write_str("nanoseconds"),
            TsResolution(v) if v & 0x80 == 0 => write!(f, "10^-{}s", v),
            TsResolution(v) => write!(f, "2^-{}s", v & 0x7f),
        }
    }
}
