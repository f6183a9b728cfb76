use std::fmt;
use std::ops::Add;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Capture timestamp, as seconds and nanoseconds since the UNIX epoch (UTC)
///
/// Panic-free and partial reimplementation of `std::time::SystemTime`, only to
/// match our needs:
///   - expose fields
///   - a null value means "not set" (writers replace it with the current time)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Timestamp {
    pub secs: u64,
    pub nanos: u32,
}

pub const NANOS_PER_SEC: u32 = 1_000_000_000;
pub const MICROS_PER_SEC: u32 = 1_000_000;

impl Timestamp {
    /// Build Timestamp from secs and nanos. Nanoseconds overflowing one second
    /// are carried into `secs`.
    pub fn new(secs: u64, nanos: u32) -> Timestamp {
        if nanos >= NANOS_PER_SEC {
            Timestamp {
                secs: secs.wrapping_add(u64::from(nanos / NANOS_PER_SEC)),
                nanos: nanos % NANOS_PER_SEC,
            }
        } else {
            Timestamp { secs, nanos }
        }
    }

    /// Build Timestamp from secs and micros
    pub fn from_micros(secs: u64, micros: u32) -> Timestamp {
        let carry = u64::from(micros / MICROS_PER_SEC);
        Timestamp {
            secs: secs.wrapping_add(carry),
            nanos: (micros % MICROS_PER_SEC) * 1000,
        }
    }

    /// Current wall clock time
    pub fn now() -> Timestamp {
        SystemTime::now().into()
    }

    /// Test if Timestamp object is null
    #[inline]
    pub fn is_null(self) -> bool {
        self.secs == 0 && self.nanos == 0
    }

    /// Return `self`, or the current time if `self` is null
    #[inline]
    pub fn or_now(self) -> Timestamp {
        if self.is_null() {
            Timestamp::now()
        } else {
            self
        }
    }

    /// Sub-second part in microseconds (truncated)
    #[inline]
    pub fn micros(self) -> u32 {
        self.nanos / 1000
    }

    /// Convert a tick count at `units_per_sec` resolution
    ///
    /// Returns `None` if `units_per_sec` is zero.
    pub fn from_ticks(ticks: u64, units_per_sec: u64) -> Option<Timestamp> {
        if units_per_sec == 0 {
            return None;
        }
        let secs = ticks / units_per_sec;
        let frac = u128::from(ticks % units_per_sec);
        let nanos = (frac * u128::from(NANOS_PER_SEC) / u128::from(units_per_sec)) as u32;
        Some(Timestamp::new(secs, nanos))
    }

    /// Number of ticks since the epoch at `units_per_sec` resolution (truncated)
    ///
    /// Saturates at `u64::MAX`.
    pub fn to_ticks(self, units_per_sec: u64) -> u64 {
        let units = u128::from(units_per_sec);
        let ticks = u128::from(self.secs) * units
            + u128::from(self.nanos) * units / u128::from(NANOS_PER_SEC);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Time elapsed since `earlier`, or `None` if `earlier` is later than `self`
    pub fn checked_sub(self, earlier: Timestamp) -> Option<Duration> {
        if self < earlier {
            return None;
        }
        let (secs, nanos) = if self.nanos >= earlier.nanos {
            (self.secs - earlier.secs, self.nanos - earlier.nanos)
        } else {
            (
                self.secs - earlier.secs - 1,
                self.nanos + NANOS_PER_SEC - earlier.nanos,
            )
        };
        Some(Duration::new(secs, nanos))
    }
}

impl From<SystemTime> for Timestamp {
    fn from(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Timestamp::new(d.as_secs(), d.subsec_nanos()),
            // clock before 1970: clamp
            Err(_) => Timestamp::default(),
        }
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, d: Duration) -> Self::Output {
        let secs = self.secs.wrapping_add(d.as_secs());
        Timestamp::new(secs, self.nanos + d.subsec_nanos())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}
