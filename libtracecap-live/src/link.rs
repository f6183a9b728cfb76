//! Link state of a network interface: MTU, speed and media state

use libtracecap_tools::Error;

/// Link parameters reported by the operating system
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LinkInfo {
    pub mtu: u32,
    /// Link speed in Mbit/s, if known
    pub speed_mbps: Option<u64>,
    /// Media connected (carrier present)
    pub connected: bool,
}

/// Query link information for interface `name`
pub fn link_info(name: &str) -> Result<LinkInfo, Error> {
    sys::link_info(name)
}

#[cfg(target_os = "linux")]
pub(crate) use self::sys::sysfs_attr;

#[cfg(target_os = "linux")]
mod sys {
    use super::LinkInfo;
    use libtracecap_tools::Error;
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};

    const SYSFS_NET: &str = "/sys/class/net";

    fn iface_dir(name: &str) -> Result<PathBuf, Error> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(Error::Config(format!("invalid interface name {:?}", name)));
        }
        Ok(Path::new(SYSFS_NET).join(name))
    }

    fn read_attr(dir: &Path, attr: &str) -> io::Result<String> {
        fs::read_to_string(dir.join(attr)).map(|s| s.trim().to_owned())
    }

    /// Read `/sys/class/net/<name>/<attr>`
    pub(crate) fn sysfs_attr(name: &str, attr: &str) -> Result<String, Error> {
        Ok(read_attr(&iface_dir(name)?, attr)?)
    }

    pub(super) fn link_info_from(dir: &Path) -> Result<LinkInfo, Error> {
        let mtu = read_attr(dir, "mtu")?
            .parse()
            .map_err(|_| Error::Config(format!("{}: unreadable mtu", dir.display())))?;
        // reading speed fails with EINVAL while the link is down, and reports -1
        // on virtual devices
        let speed_mbps = read_attr(dir, "speed")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|&s| s > 0)
            .map(|s| s as u64);
        let connected = match read_attr(dir, "carrier") {
            Ok(c) => c == "1",
            Err(_) => read_attr(dir, "operstate").map_or(false, |s| s == "up"),
        };
        Ok(LinkInfo {
            mtu,
            speed_mbps,
            connected,
        })
    }

    pub(super) fn link_info(name: &str) -> Result<LinkInfo, Error> {
        link_info_from(&iface_dir(name)?)
    }
}

#[cfg(windows)]
mod sys {
    use super::LinkInfo;
    use libtracecap_tools::Error;
    use std::ffi::CStr;
    use std::io;
    use std::ptr;
    use winapi::shared::ifdef::IfOperStatusUp;
    use winapi::shared::winerror::{ERROR_BUFFER_OVERFLOW, NO_ERROR};
    use winapi::shared::ws2def::AF_UNSPEC;
    use winapi::um::iphlpapi::GetAdaptersAddresses;
    use winapi::um::iptypes::{IP_ADAPTER_ADDRESSES, PIP_ADAPTER_ADDRESSES};

    unsafe fn wide_to_string(mut p: *const u16) -> String {
        let mut v = Vec::new();
        if !p.is_null() {
            while *p != 0 {
                v.push(*p);
                p = p.add(1);
            }
        }
        String::from_utf16_lossy(&v)
    }

    /// Match `name` against the adapter GUID name or its friendly name
    unsafe fn find(mut adapter: *const IP_ADAPTER_ADDRESSES, name: &str) -> Option<LinkInfo> {
        while !adapter.is_null() {
            let a = &*adapter;
            let guid = if a.AdapterName.is_null() {
                String::new()
            } else {
                CStr::from_ptr(a.AdapterName).to_string_lossy().into_owned()
            };
            if guid == name || wide_to_string(a.FriendlyName) == name {
                let speed = a.TransmitLinkSpeed;
                return Some(LinkInfo {
                    mtu: a.Mtu,
                    speed_mbps: if speed == 0 || speed == u64::MAX {
                        None
                    } else {
                        Some(speed / 1_000_000)
                    },
                    connected: a.OperStatus == IfOperStatusUp,
                });
            }
            adapter = a.Next;
        }
        None
    }

    pub(super) fn link_info(name: &str) -> Result<LinkInfo, Error> {
        let mut size: u32 = 16 * 1024;
        // u64 elements keep the buffer aligned for IP_ADAPTER_ADDRESSES
        let mut buf: Vec<u64> = Vec::new();
        for _ in 0..4 {
            buf.resize((size as usize + 7) / 8, 0);
            let ret = unsafe {
                GetAdaptersAddresses(
                    AF_UNSPEC as u32,
                    0,
                    ptr::null_mut(),
                    buf.as_mut_ptr() as PIP_ADAPTER_ADDRESSES,
                    &mut size,
                )
            };
            match ret {
                NO_ERROR => {
                    let first = buf.as_ptr() as *const IP_ADAPTER_ADDRESSES;
                    return unsafe { find(first, name) }.ok_or_else(|| {
                        Error::Io(io::Error::new(
                            io::ErrorKind::NotFound,
                            format!("no adapter named {}", name),
                        ))
                    });
                }
                ERROR_BUFFER_OVERFLOW => continue,
                e => return Err(Error::Io(io::Error::from_raw_os_error(e as i32))),
            }
        }
        Err(Error::Io(io::Error::new(
            io::ErrorKind::Other,
            "GetAdaptersAddresses: adapter list keeps growing",
        )))
    }
}

#[cfg(not(any(target_os = "linux", windows)))]
mod sys {
    use super::LinkInfo;
    use libtracecap_tools::Error;

    pub(super) fn link_info(_name: &str) -> Result<LinkInfo, Error> {
        Err(Error::NotSupported("link information on this platform"))
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::sys::link_info_from;
    use super::*;
    use std::fs;

    #[test]
    fn sysfs_link_info() {
        let dir = std::env::temp_dir().join(format!("tracecap-link-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("mtu"), "1500\n").expect("write");
        fs::write(dir.join("speed"), "-1\n").expect("write");
        fs::write(dir.join("operstate"), "up\n").expect("write");
        let info = link_info_from(&dir).expect("link info");
        assert_eq!(
            info,
            LinkInfo {
                mtu: 1500,
                speed_mbps: None,
                connected: true
            }
        );
        fs::write(dir.join("speed"), "10000\n").expect("write");
        fs::write(dir.join("carrier"), "0\n").expect("write");
        let info = link_info_from(&dir).expect("link info");
        assert_eq!(info.speed_mbps, Some(10000));
        assert!(!info.connected);
        fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn invalid_names() {
        assert!(matches!(link_info("../etc"), Err(Error::Config(_))));
        assert!(matches!(link_info(""), Err(Error::Config(_))));
        assert!(link_info("tracecap-nonexistent0").is_err());
    }
}
