use super::bindings::*;
use crate::config::RingConfig;
use crate::packet::LivePacket;
use libtracecap_tools::{Error, Timestamp};
use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, Ordering};

/// Memory-mapped TPACKET_V3 receive ring
///
/// Blocks are handed over by the kernel by setting `TP_STATUS_USER` in the
/// block descriptor, and given back by resetting it to `TP_STATUS_KERNEL`.
/// Packets are always copied out before the block is released.
pub(crate) struct Ring {
    base: NonNull<u8>,
    block_size: usize,
    block_nr: usize,
    mapped: bool,
    /// Index of the block currently read
    block: usize,
    cursor: Option<Cursor>,
}

#[derive(Clone, Copy, Debug)]
struct Cursor {
    offset: usize,
    remaining: u32,
}

// The mapping is owned by the ring, and only accessed through `&mut self`
unsafe impl Send for Ring {}

/// Check ring parameters the way the kernel will
pub(crate) fn check_ring_config(ring: &RingConfig) -> Result<(), Error> {
    let page_size = match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        n if n > 0 => n as u32,
        _ => 4096,
    };
    let min_frame = (mem::size_of::<tpacket3_hdr>() as u32).next_multiple_of(TPACKET_ALIGNMENT);
    if ring.block_size == 0 || ring.block_size % page_size != 0 {
        return Err(Error::Config(format!(
            "ring block size {} is not a multiple of the page size ({})",
            ring.block_size, page_size
        )));
    }
    if ring.frame_size < min_frame || ring.frame_size % TPACKET_ALIGNMENT != 0 {
        return Err(Error::Config(format!(
            "ring frame size {} must be a multiple of {} and at least {}",
            ring.frame_size, TPACKET_ALIGNMENT, min_frame
        )));
    }
    if ring.frame_size > ring.block_size || ring.block_nr == 0 {
        return Err(Error::Config(format!(
            "invalid ring geometry {}x{} (frame size {})",
            ring.block_nr, ring.block_size, ring.frame_size
        )));
    }
    Ok(())
}

impl Ring {
    /// Map the ring installed on `fd` with `PACKET_RX_RING`
    pub(crate) fn map(fd: RawFd, ring: &RingConfig) -> Result<Ring, Error> {
        let size = ring.ring_size();
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        let base = NonNull::new(addr as *mut u8)
            .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::Other, "mmap returned NULL")))?;
        debug!(
            "mapped rx ring: {} blocks of {} bytes",
            ring.block_nr, ring.block_size
        );
        Ok(Ring {
            base,
            block_size: ring.block_size as usize,
            block_nr: ring.block_nr as usize,
            mapped: true,
            block: 0,
            cursor: None,
        })
    }

    /// Walk a ring laid out in a caller-owned buffer
    #[cfg(test)]
    fn over(buf: &mut [u8], block_size: usize) -> Ring {
        assert!(block_size > 0 && buf.len() % block_size == 0);
        Ring {
            base: NonNull::new(buf.as_mut_ptr()).expect("non-null buffer"),
            block_size,
            block_nr: buf.len() / block_size,
            mapped: false,
            block: 0,
            cursor: None,
        }
    }

    fn block_ptr(&self) -> *mut u8 {
        // block < block_nr, so the offset stays inside the mapping
        unsafe { self.base.as_ptr().add(self.block * self.block_size) }
    }

    fn block_status(&self) -> u32 {
        let status = unsafe {
            ptr::read_volatile(self.block_ptr().add(BLOCK_STATUS_OFFSET) as *const u32)
        };
        fence(Ordering::Acquire);
        status
    }

    fn release_block(&mut self) {
        fence(Ordering::Release);
        unsafe {
            ptr::write_volatile(
                self.block_ptr().add(BLOCK_STATUS_OFFSET) as *mut u32,
                TP_STATUS_KERNEL,
            );
        }
        self.block = (self.block + 1) % self.block_nr;
        self.cursor = None;
    }

    /// Copy the next packet out of the ring
    ///
    /// Returns `None` when the next block is still owned by the kernel.
    pub(crate) fn next_packet(&mut self, if_index: u32, snaplen: u32) -> Option<LivePacket> {
        loop {
            let cursor = match self.cursor {
                Some(cursor) => cursor,
                None => {
                    if self.block_status() & TP_STATUS_USER == 0 {
                        return None;
                    }
                    let desc = unsafe {
                        ptr::read_unaligned(self.block_ptr() as *const tpacket_block_desc)
                    };
                    if desc.hdr.num_pkts == 0 {
                        self.release_block();
                        continue;
                    }
                    Cursor {
                        offset: desc.hdr.offset_to_first_pkt as usize,
                        remaining: desc.hdr.num_pkts,
                    }
                }
            };
            let (packet, next_offset) = match self.packet_at(cursor.offset, if_index, snaplen) {
                Some(p) => p,
                None => {
                    warn!(
                        "rx ring: corrupted packet offset {} in block {}, dropping block",
                        cursor.offset, self.block
                    );
                    self.release_block();
                    continue;
                }
            };
            let next = cursor.offset + next_offset;
            if cursor.remaining <= 1 || next_offset == 0 || next >= self.block_size {
                self.release_block();
            } else {
                self.cursor = Some(Cursor {
                    offset: next,
                    remaining: cursor.remaining - 1,
                });
            }
            return Some(packet);
        }
    }

    fn packet_at(&self, offset: usize, if_index: u32, snaplen: u32) -> Option<(LivePacket, usize)> {
        let hdr_end = offset.checked_add(mem::size_of::<tpacket3_hdr>())?;
        if offset < mem::size_of::<tpacket_block_desc>() || hdr_end > self.block_size {
            return None;
        }
        let block = self.block_ptr();
        let hdr = unsafe { ptr::read_unaligned(block.add(offset) as *const tpacket3_hdr) };
        let start = offset.checked_add(hdr.tp_mac as usize)?;
        let end = start.checked_add(hdr.tp_snaplen as usize)?;
        if start < hdr_end || end > self.block_size {
            return None;
        }
        let caplen = hdr.tp_snaplen.min(snaplen);
        let data = unsafe { std::slice::from_raw_parts(block.add(start), caplen as usize) }.to_vec();
        let packet = LivePacket {
            data,
            ts: Timestamp::new(u64::from(hdr.tp_sec), hdr.tp_nsec),
            caplen,
            origlen: hdr.tp_len.max(caplen),
            if_index,
        };
        Some((packet, hdr.tp_next_offset as usize))
    }
}

impl Drop for Ring {
    fn drop(&mut self) {
        if self.mapped {
            let size = self.block_size * self.block_nr;
            if unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, size) } != 0 {
                warn!("munmap rx ring: {}", io::Error::last_os_error());
            }
        }
    }
}
