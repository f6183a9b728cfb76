//! Live capture using Linux `AF_PACKET` sockets

mod bindings;
mod ring;

use self::bindings::*;
use self::ring::{check_ring_config, Ring};
use crate::config::{LiveConfig, DEFAULT_RETIRE_BLOCK_TOV_MS};
use crate::link::sysfs_attr;
use crate::packet::{LivePacket, LiveStats};
use crate::source::PacketSource;
use libtracecap_tools::bpf::BpfProgram;
use libtracecap_tools::{Error, Linktype, Timestamp};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Longest time a read holds the socket. Bounds the latency of `close()`.
const POLL_SLICE: Duration = Duration::from_millis(100);

enum Receiver {
    Socket(Vec<u8>),
    Ring(Ring),
    Closed,
}

/// Live capture handle bound to one interface
///
/// The socket sits behind a `RwLock`: reads share it for at most
/// [`POLL_SLICE`], `close()` takes it exclusively, so a peer thread can close
/// the handle while a read is in progress.
pub struct LiveHandle {
    name: String,
    if_index: u32,
    link_type: Linktype,
    config: LiveConfig,
    socket: RwLock<Option<OwnedFd>>,
    rx: Mutex<Receiver>,
    received: AtomicU64,
    /// Kernel counters, accumulated (reading them resets them)
    kernel_stats: Mutex<Option<LiveStats>>,
}

fn last_error() -> Error {
    Error::Io(io::Error::last_os_error())
}

fn setsockopt<T>(fd: RawFd, level: libc::c_int, name: libc::c_int, value: &T) -> io::Result<()> {
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            (value as *const T) as *const libc::c_void,
            mem::size_of::<T>() as libc::socklen_t,
        )
    };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Map an `ARPHRD_*` device type to the link type of frames read on `SOCK_RAW`
pub(crate) fn arphrd_linktype(arphrd: u32) -> Linktype {
    match arphrd {
        // ARPHRD_ETHER, ARPHRD_LOOPBACK
        1 | 772 => Linktype::ETHERNET,
        // ARPHRD_IEEE80211
        801 => Linktype::IEEE802_11,
        // ARPHRD_IEEE80211_RADIOTAP
        803 => Linktype(127),
        // ARPHRD_NONE (tun), ARPHRD_SIT, ARPHRD_IPGRE
        0xfffe | 776 | 778 => Linktype::RAW,
        other => {
            warn!("unknown device type {}, assuming Ethernet", other);
            Linktype::ETHERNET
        }
    }
}

fn membership(fd: RawFd, if_index: u32, op: libc::c_int) -> io::Result<()> {
    let mreq = packet_mreq {
        mr_ifindex: if_index as libc::c_int,
        mr_type: PACKET_MR_PROMISC,
        mr_alen: 0,
        mr_address: [0; 8],
    };
    setsockopt(fd, SOL_PACKET, op, &mreq)
}

/// Open a live capture handle on interface `name`
///
/// Requires `CAP_NET_RAW`.
pub fn open_live(name: &str, config: &LiveConfig) -> Result<LiveHandle, Error> {
    let config = config.normalize();
    let cname = CString::new(name)
        .map_err(|_| Error::Config(format!("invalid interface name {:?}", name)))?;
    let if_index = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if if_index == 0 {
        return Err(last_error());
    }
    if config.tpacket_v3 {
        check_ring_config(&config.ring)?;
    }

    let protocol = (libc::ETH_P_ALL as u16).to_be();
    let raw = unsafe {
        libc::socket(
            libc::AF_PACKET,
            libc::SOCK_RAW | libc::SOCK_CLOEXEC,
            libc::c_int::from(protocol),
        )
    };
    if raw == -1 {
        return Err(last_error());
    }
    // closed on every error path below
    let socket = unsafe { OwnedFd::from_raw_fd(raw) };
    let fd = socket.as_raw_fd();

    let mut sll: libc::sockaddr_ll = unsafe { mem::zeroed() };
    sll.sll_family = libc::AF_PACKET as libc::c_ushort;
    sll.sll_protocol = protocol;
    sll.sll_ifindex = if_index as libc::c_int;
    let ret = unsafe {
        libc::bind(
            fd,
            (&sll as *const libc::sockaddr_ll) as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if ret == -1 {
        return Err(last_error());
    }

    let rcvbuf = libc::c_int::try_from(config.buffer_size).unwrap_or(libc::c_int::MAX);
    setsockopt(fd, libc::SOL_SOCKET, libc::SO_RCVBUF, &rcvbuf)?;
    let timeout = config.timeout().unwrap_or_default();
    let tv = libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    };
    setsockopt(fd, libc::SOL_SOCKET, libc::SO_RCVTIMEO, &tv)?;
    if !config.tpacket_v3 {
        // kernel receive timestamps, fetched with SIOCGSTAMPNS after each read
        let on: libc::c_int = 1;
        if let Err(e) = setsockopt(fd, libc::SOL_SOCKET, SO_TIMESTAMPNS, &on) {
            debug!("{}: SO_TIMESTAMPNS: {}", name, e);
        }
    }
    if config.promiscuous {
        membership(fd, if_index, PACKET_ADD_MEMBERSHIP)?;
    }

    let rx = if config.tpacket_v3 {
        setsockopt(fd, SOL_PACKET, PACKET_VERSION, &TPACKET_V3)?;
        let req = tpacket_req3 {
            tp_block_size: config.ring.block_size,
            tp_block_nr: config.ring.block_nr,
            tp_frame_size: config.ring.frame_size,
            tp_frame_nr: config.ring.frame_nr(),
            tp_retire_blk_tov: DEFAULT_RETIRE_BLOCK_TOV_MS,
            tp_sizeof_priv: 0,
            tp_feature_req_word: 0,
        };
        setsockopt(fd, SOL_PACKET, PACKET_RX_RING, &req)?;
        Receiver::Ring(Ring::map(fd, &config.ring)?)
    } else {
        Receiver::Socket(vec![0; config.snaplen as usize])
    };

    let link_type = sysfs_attr(name, "type")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .map_or(Linktype::ETHERNET, arphrd_linktype);

    info!(
        "{}: capture opened (ifindex {}, link type {}, snaplen {}, {})",
        name,
        if_index,
        link_type,
        config.snaplen,
        if config.tpacket_v3 {
            "TPACKET_V3 ring"
        } else {
            "socket reads"
        }
    );
    Ok(LiveHandle {
        name: name.to_owned(),
        if_index,
        link_type,
        config,
        socket: RwLock::new(Some(socket)),
        rx: Mutex::new(rx),
        received: AtomicU64::new(0),
        kernel_stats: Mutex::new(None),
    })
}

fn timespec_timestamp(ts: &libc::timespec) -> Option<Timestamp> {
    let secs = u64::try_from(ts.tv_sec).ok()?;
    let nanos = u32::try_from(ts.tv_nsec)
        .ok()
        .filter(|&n| n < 1_000_000_000)?;
    Some(Timestamp::new(secs, nanos)).filter(|t| !t.is_null())
}

/// Kernel receive time of the last packet read from `fd`
fn socket_timestamp(fd: RawFd) -> Option<Timestamp> {
    let mut ts: libc::timespec = unsafe { mem::zeroed() };
    let ret = unsafe { libc::ioctl(fd, SIOCGSTAMPNS as _, &mut ts as *mut libc::timespec) };
    if ret == -1 {
        return None;
    }
    timespec_timestamp(&ts)
}

/// Wait until `fd` is readable. Returns `false` on timeout or interruption.
fn poll_in(fd: RawFd, wait: Duration) -> Result<bool, Error> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let ms = wait.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int;
    match unsafe { libc::poll(&mut pfd, 1, ms) } {
        -1 => {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                Ok(false)
            } else {
                Err(Error::Io(err))
            }
        }
        0 => Ok(false),
        _ if pfd.revents & libc::POLLNVAL != 0 => Err(Error::HandleClosed),
        _ if pfd.revents & libc::POLLERR != 0 && pfd.revents & libc::POLLIN == 0 => {
            Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "error condition on capture socket",
            )))
        }
        _ => Ok(true),
    }
}

impl LiveHandle {
    pub fn if_index(&self) -> u32 {
        self.if_index
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    fn recv(&self, fd: RawFd, buf: &mut [u8]) -> Result<Option<LivePacket>, Error> {
        let n = unsafe {
            libc::recvfrom(
                fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                libc::MSG_TRUNC | libc::MSG_DONTWAIT,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EINTR) | Some(libc::EAGAIN) => Ok(None),
                Some(libc::EBADF) => Err(Error::HandleClosed),
                _ => Err(Error::Io(err)),
            };
        }
        // with MSG_TRUNC, the wire length is returned even if larger than the buffer
        let origlen = n as usize;
        let caplen = origlen.min(buf.len());
        Ok(Some(LivePacket {
            data: buf[..caplen].to_vec(),
            ts: socket_timestamp(fd).unwrap_or_else(Timestamp::now),
            caplen: caplen as u32,
            origlen: u32::try_from(origlen).unwrap_or(u32::MAX),
            if_index: self.if_index,
        }))
    }

    /// One bounded read attempt
    fn try_read(&self, wait: Duration) -> Result<Option<LivePacket>, Error> {
        let socket = self.socket.read().unwrap_or_else(PoisonError::into_inner);
        let fd = socket.as_ref().ok_or(Error::HandleClosed)?.as_raw_fd();
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *rx {
            Receiver::Ring(ring) => {
                if let Some(p) = ring.next_packet(self.if_index, self.config.snaplen) {
                    return Ok(Some(p));
                }
                if poll_in(fd, wait)? {
                    Ok(ring.next_packet(self.if_index, self.config.snaplen))
                } else {
                    Ok(None)
                }
            }
            Receiver::Socket(buf) => {
                if poll_in(fd, wait)? {
                    self.recv(fd, buf)
                } else {
                    Ok(None)
                }
            }
            Receiver::Closed => Err(Error::HandleClosed),
        }
    }

    /// Read and reset the kernel counters, adding them to the accumulated values
    fn sample_kernel_stats(&self, fd: RawFd) -> Option<LiveStats> {
        let mut st = tpacket_stats_v3::default();
        let mut len = mem::size_of::<tpacket_stats_v3>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockopt(
                fd,
                SOL_PACKET,
                PACKET_STATISTICS,
                (&mut st as *mut tpacket_stats_v3) as *mut libc::c_void,
                &mut len,
            )
        };
        let mut acc = self
            .kernel_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if ret == -1 {
            trace!(
                "{}: PACKET_STATISTICS: {}",
                self.name,
                io::Error::last_os_error()
            );
            return *acc;
        }
        let total = acc.get_or_insert_with(LiveStats::default);
        total.received += u64::from(st.tp_packets);
        total.dropped += u64::from(st.tp_drops);
        Some(*total)
    }
}

impl PacketSource for LiveHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn link_type(&self) -> Linktype {
        self.link_type
    }

    fn snaplen(&self) -> u32 {
        self.config.snaplen
    }

    fn read_packet(&self) -> Result<LivePacket, Error> {
        let deadline = self.config.timeout().map(|t| Instant::now() + t);
        loop {
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::Timeout);
                    }
                    (deadline - now).min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };
            if let Some(packet) = self.try_read(wait)? {
                self.received.fetch_add(1, Ordering::Relaxed);
                return Ok(packet);
            }
        }
    }

    fn write_packet_data(&self, data: &[u8]) -> Result<usize, Error> {
        let socket = self.socket.read().unwrap_or_else(PoisonError::into_inner);
        let fd = socket.as_ref().ok_or(Error::HandleClosed)?.as_raw_fd();
        let n = unsafe { libc::send(fd, data.as_ptr() as *const libc::c_void, data.len(), 0) };
        if n < 0 {
            return Err(last_error());
        }
        Ok(n as usize)
    }

    fn raw_fd(&self) -> Option<i32> {
        let socket = self.socket.read().unwrap_or_else(PoisonError::into_inner);
        socket.as_ref().map(|s| s.as_raw_fd())
    }

    fn attach_filter(&self, program: &BpfProgram) -> Result<bool, Error> {
        let len = u16::try_from(program.len())
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| Error::Bpf(format!("cannot attach a program of length {}", program.len())))?;
        let socket = self.socket.read().unwrap_or_else(PoisonError::into_inner);
        let fd = socket.as_ref().ok_or(Error::HandleClosed)?.as_raw_fd();
        let fprog = sock_fprog {
            len,
            filter: program.instructions().as_ptr(),
        };
        setsockopt(fd, libc::SOL_SOCKET, SO_ATTACH_FILTER, &fprog)?;
        debug!("{}: kernel filter attached ({} instructions)", self.name, len);
        Ok(true)
    }

    fn stats(&self) -> Result<LiveStats, Error> {
        let socket = self.socket.read().unwrap_or_else(PoisonError::into_inner);
        let kernel = match socket.as_ref() {
            Some(s) => self.sample_kernel_stats(s.as_raw_fd()),
            None => *self
                .kernel_stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        };
        Ok(kernel.unwrap_or(LiveStats {
            received: self.received.load(Ordering::Relaxed),
            dropped: 0,
        }))
    }

    fn close(&self) -> Result<(), Error> {
        let mut socket = self.socket.write().unwrap_or_else(PoisonError::into_inner);
        let fd = match socket.take() {
            Some(fd) => fd,
            None => return Ok(()),
        };
        // keep the last counters readable after close
        self.sample_kernel_stats(fd.as_raw_fd());
        let mut result = Ok(());
        if self.config.promiscuous {
            if let Err(e) = membership(fd.as_raw_fd(), self.if_index, PACKET_DROP_MEMBERSHIP) {
                warn!("{}: dropping promiscuous membership: {}", self.name, e);
                result = Err(Error::Io(e));
            }
        }
        // unmaps the ring, if any
        *self.rx.lock().unwrap_or_else(PoisonError::into_inner) = Receiver::Closed;
        drop(fd);
        debug!("{}: capture closed", self.name);
        result
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
