//! AF_PACKET definitions from `<linux/if_packet.h>` and `<linux/filter.h>`

#![allow(non_camel_case_types)]

use libtracecap_tools::bpf::BpfInstruction;

pub const SOL_PACKET: libc::c_int = 263;
pub const SO_ATTACH_FILTER: libc::c_int = 26;
pub const SO_TIMESTAMPNS: libc::c_int = 35;
/// Receive time of the last packet read from the socket, from `<linux/sockios.h>`
pub const SIOCGSTAMPNS: libc::c_ulong = 0x8907;

pub const PACKET_ADD_MEMBERSHIP: libc::c_int = 1;
pub const PACKET_DROP_MEMBERSHIP: libc::c_int = 2;
pub const PACKET_RX_RING: libc::c_int = 5;
pub const PACKET_STATISTICS: libc::c_int = 6;
pub const PACKET_VERSION: libc::c_int = 10;

pub const PACKET_MR_PROMISC: libc::c_ushort = 1;

pub const TPACKET_V3: libc::c_int = 2;
pub const TPACKET_ALIGNMENT: u32 = 16;

pub const TP_STATUS_KERNEL: u32 = 0;
pub const TP_STATUS_USER: u32 = 1;

// man 7 packet
#[repr(C)]
pub struct packet_mreq {
    pub mr_ifindex: libc::c_int,
    pub mr_type: libc::c_ushort,
    pub mr_alen: libc::c_ushort,
    pub mr_address: [libc::c_uchar; 8],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct tpacket_req3 {
    pub tp_block_size: libc::c_uint,
    pub tp_block_nr: libc::c_uint,
    pub tp_frame_size: libc::c_uint,
    pub tp_frame_nr: libc::c_uint,
    pub tp_retire_blk_tov: libc::c_uint,
    pub tp_sizeof_priv: libc::c_uint,
    pub tp_feature_req_word: libc::c_uint,
}

/// Large enough for both `tpacket_stats` and `tpacket_stats_v3`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct tpacket_stats_v3 {
    pub tp_packets: libc::c_uint,
    pub tp_drops: libc::c_uint,
    pub tp_freeze_q_cnt: libc::c_uint,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct tpacket_bd_ts {
    pub ts_sec: u32,
    pub ts_nsec: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct tpacket_hdr_v1 {
    pub block_status: u32,
    pub num_pkts: u32,
    pub offset_to_first_pkt: u32,
    pub blk_len: u32,
    pub seq_num: u64,
    pub ts_first_pkt: tpacket_bd_ts,
    pub ts_last_pkt: tpacket_bd_ts,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct tpacket_block_desc {
    pub version: u32,
    pub offset_to_priv: u32,
    pub hdr: tpacket_hdr_v1,
}

/// Offset of `hdr.block_status` in a block descriptor
pub const BLOCK_STATUS_OFFSET: usize = 8;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct tpacket_hdr_variant1 {
    pub tp_rxhash: u32,
    pub tp_vlan_tci: u32,
    pub tp_vlan_tpid: u16,
    pub tp_padding: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct tpacket3_hdr {
    pub tp_next_offset: u32,
    pub tp_sec: u32,
    pub tp_nsec: u32,
    pub tp_snaplen: u32,
    pub tp_len: u32,
    pub tp_status: u32,
    pub tp_mac: u16,
    pub tp_net: u16,
    pub hv1: tpacket_hdr_variant1,
    pub tp_padding: [u8; 8],
}

/// `struct sock_filter` has the same layout as [`BpfInstruction`]
#[repr(C)]
pub struct sock_fprog {
    pub len: libc::c_ushort,
    pub filter: *const BpfInstruction,
}
