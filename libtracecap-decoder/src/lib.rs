//! Layered packet decoding: Ethernet (with 802.1Q / 802.1ad tags), IPv4, IPv6,
//! TCP, UDP and ICMP
//!
//! A [`DecoderTable`] maps layer types to decoders. A [`PacketDecoder`] uses it to
//! walk a frame from its outer layer down:
//!
//! ```
//! use libtracecap_decoder::{LayerType, PacketDecoder};
//!
//! let decoder = PacketDecoder::default();
//! // too short for an Ethernet header
//! assert!(decoder.decode_from(LayerType::Ethernet, &[0u8; 4]).is_err());
//! ```

#![forbid(unsafe_code)]

#[macro_use]
extern crate tracing;

mod composer;
mod error;
mod ethernet;
mod icmp;
mod ipv4;
mod ipv6;
mod layers;
mod registry;
mod tcp;
mod udp;

pub use composer::*;
pub use error::DecodeError;
pub use ethernet::*;
pub use icmp::*;
pub use ipv4::*;
pub use ipv6::*;
pub use layers::*;
pub use registry::*;
pub use tcp::*;
pub use udp::*;
