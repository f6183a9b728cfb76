use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_SNAPLEN: u32 = 65535;
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024 * 1024;

pub const DEFAULT_BLOCK_SIZE: u32 = 1 << 20;
pub const DEFAULT_BLOCK_NR: u32 = 8;
pub const DEFAULT_FRAME_SIZE: u32 = 2048;
/// Time after which the kernel hands a partially filled ring block to user space
pub const DEFAULT_RETIRE_BLOCK_TOV_MS: u32 = 64;

/// Memory-mapped ring parameters (TPACKET_V3). Zero fields take the defaults.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    pub block_size: u32,
    pub block_nr: u32,
    pub frame_size: u32,
}

impl RingConfig {
    /// Frames per block times number of blocks
    pub fn frame_nr(&self) -> u32 {
        match self.frame_size {
            0 => 0,
            f => (self.block_size / f).saturating_mul(self.block_nr),
        }
    }

    /// Total size of the mapped ring, in bytes
    pub fn ring_size(&self) -> usize {
        self.block_size as usize * self.block_nr as usize
    }

    fn normalize(self) -> RingConfig {
        let or = |v: u32, d: u32| if v == 0 { d } else { v };
        RingConfig {
            block_size: or(self.block_size, DEFAULT_BLOCK_SIZE),
            block_nr: or(self.block_nr, DEFAULT_BLOCK_NR),
            frame_size: or(self.frame_size, DEFAULT_FRAME_SIZE),
        }
    }
}

/// Parameters of a live capture handle
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LiveConfig {
    /// Maximum number of bytes kept per packet (0: default)
    pub snaplen: u32,
    pub promiscuous: bool,
    /// Read timeout in milliseconds. 0 blocks until a packet arrives or the
    /// handle is closed; negative values are treated as 0.
    pub timeout_ms: i64,
    /// Socket receive buffer size in bytes (0: default)
    pub buffer_size: usize,
    /// Receive through a memory-mapped TPACKET_V3 ring
    pub tpacket_v3: bool,
    pub ring: RingConfig,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: true,
            timeout_ms: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            tpacket_v3: false,
            ring: RingConfig::default(),
        }
    }
}

impl LiveConfig {
    /// Replace unset values by their defaults
    pub fn normalize(self) -> LiveConfig {
        LiveConfig {
            snaplen: if self.snaplen == 0 {
                DEFAULT_SNAPLEN
            } else {
                self.snaplen
            },
            timeout_ms: self.timeout_ms.max(0),
            buffer_size: if self.buffer_size == 0 {
                DEFAULT_BUFFER_SIZE
            } else {
                self.buffer_size
            },
            ring: if self.tpacket_v3 {
                self.ring.normalize()
            } else {
                self.ring
            },
            ..self
        }
    }

    /// Read timeout, `None` meaning "block"
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            t if t > 0 => Some(Duration::from_millis(t as u64)),
            _ => None,
        }
    }
}
