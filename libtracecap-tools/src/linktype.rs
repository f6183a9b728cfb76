use std::fmt;

/// Data link type (DLT) of captured frames
///
/// See <https://www.tcpdump.org/linktypes.html>
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Linktype(pub u32);

impl Linktype {
    pub const NULL: Linktype = Linktype(0);
    pub const ETHERNET: Linktype = Linktype(1);
    pub const RAW: Linktype = Linktype(101);
    pub const IEEE802_11: Linktype = Linktype(105);
    pub const LOOP: Linktype = Linktype(108);
    pub const LINUX_SLL: Linktype = Linktype(113);
    pub const IPV4: Linktype = Linktype(228);
    pub const IPV6: Linktype = Linktype(229);
    pub const NFLOG: Linktype = Linktype(239);
    pub const LINUX_SLL2: Linktype = Linktype(276);

    pub fn name(self) -> Option<&'static str> {
        let s = match self {
            Linktype::NULL => "NULL",
            Linktype::ETHERNET => "ETHERNET",
            Linktype::RAW => "RAW",
            Linktype::IEEE802_11 => "IEEE802_11",
            Linktype::LOOP => "LOOP",
            Linktype::LINUX_SLL => "LINUX_SLL",
            Linktype::IPV4 => "IPV4",
            Linktype::IPV6 => "IPV6",
            Linktype::NFLOG => "NFLOG",
            Linktype::LINUX_SLL2 => "LINUX_SLL2",
            _ => return None,
        };
        Some(s)
    }
}

impl fmt::Display for Linktype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<u32> for Linktype {
    fn from(v: u32) -> Self {
        Linktype(v)
    }
}
