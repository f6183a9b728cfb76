//! Live capture on platforms without `AF_PACKET`

use crate::config::LiveConfig;
use crate::packet::{LivePacket, LiveStats};
use crate::source::PacketSource;
use libtracecap_tools::{Error, Linktype};

/// Live capture handle. Cannot be constructed on this platform.
pub enum LiveHandle {}

pub fn open_live(name: &str, _config: &LiveConfig) -> Result<LiveHandle, Error> {
    debug!("{}: live capture requested", name);
    Err(Error::NotSupported("live capture requires Linux AF_PACKET"))
}

impl PacketSource for LiveHandle {
    fn name(&self) -> &str {
        match *self {}
    }

    fn link_type(&self) -> Linktype {
        match *self {}
    }

    fn snaplen(&self) -> u32 {
        match *self {}
    }

    fn read_packet(&self) -> Result<LivePacket, Error> {
        match *self {}
    }

    fn stats(&self) -> Result<LiveStats, Error> {
        match *self {}
    }

    fn close(&self) -> Result<(), Error> {
        match *self {}
    }
}
