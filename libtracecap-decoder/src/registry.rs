use crate::error::DecodeError;
use crate::ethernet::decode_ethernet;
use crate::icmp::decode_icmp;
use crate::ipv4::decode_ipv4;
use crate::ipv6::decode_ipv6;
use crate::layers::{Layer, LayerType};
use crate::tcp::decode_tcp;
use crate::udp::decode_udp;
use std::collections::HashMap;
use std::fmt;

/// A decoder for one layer type
pub trait Decoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<Layer, DecodeError>;
}

impl<F> Decoder for F
where
    F: Fn(&[u8]) -> Result<Layer, DecodeError> + Send + Sync,
{
    fn decode(&self, data: &[u8]) -> Result<Layer, DecodeError> {
        self(data)
    }
}

/// Mapping from layer type to decoder
///
/// Built once, then shared read-only by [`PacketDecoder`](crate::PacketDecoder)s.
#[derive(Default)]
pub struct DecoderTable {
    decoders: HashMap<LayerType, Box<dyn Decoder>>,
}

impl DecoderTable {
    /// Empty table
    pub fn new() -> Self {
        DecoderTable::default()
    }

    /// Table with the built-in Ethernet, IPv4, IPv6, TCP, UDP and ICMP decoders
    pub fn with_defaults() -> Self {
        let mut table = DecoderTable::new();
        table.register(LayerType::Ethernet, |d: &[u8]| decode_ethernet(d).map(Layer::Ethernet));
        table.register(LayerType::Ipv4, |d: &[u8]| decode_ipv4(d).map(Layer::Ipv4));
        table.register(LayerType::Ipv6, |d: &[u8]| decode_ipv6(d).map(Layer::Ipv6));
        table.register(LayerType::Tcp, |d: &[u8]| decode_tcp(d).map(Layer::Tcp));
        table.register(LayerType::Udp, |d: &[u8]| decode_udp(d).map(Layer::Udp));
        table.register(LayerType::Icmp, |d: &[u8]| decode_icmp(d).map(Layer::Icmp));
        table
    }

    /// Register a decoder. A previous decoder for the same layer is replaced
    /// and returned.
    pub fn register<D>(&mut self, layer: LayerType, decoder: D) -> Option<Box<dyn Decoder>>
    where
        D: Decoder + 'static,
    {
        self.decoders.insert(layer, Box::new(decoder))
    }

    pub fn contains(&self, layer: LayerType) -> bool {
        self.decoders.contains_key(&layer)
    }

    /// Decode `data` as a `layer`
    pub fn decode_layer(&self, layer: LayerType, data: &[u8]) -> Result<Layer, DecodeError> {
        match self.decoders.get(&layer) {
            Some(d) => d.decode(data),
            None => Err(DecodeError::UnsupportedLayer(layer)),
        }
    }
}

impl fmt::Debug for DecoderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut layers: Vec<_> = self.decoders.keys().collect();
        layers.sort();
        f.debug_struct("DecoderTable").field("layers", &layers).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icmp::IcmpLayer;

    #[test]
    fn registry_dispatch() {
        let table = DecoderTable::with_defaults();
        let layer = table.decode_layer(LayerType::Icmp, &[0, 0, 0, 0]).unwrap();
        assert_eq!(layer.layer_type(), LayerType::Icmp);
        assert!(matches!(
            DecoderTable::new().decode_layer(LayerType::Tcp, &[0; 20]),
            Err(DecodeError::UnsupportedLayer(LayerType::Tcp))
        ));
    }

    #[test]
    fn registry_last_registration_wins() {
        let mut table = DecoderTable::with_defaults();
        let previous = table.register(LayerType::Icmp, |d: &[u8]| {
            Ok(Layer::Icmp(IcmpLayer {
                header: Vec::new(),
                payload: d.to_vec(),
                icmp_type: 0xff,
                code: 0,
                checksum: 0,
            }))
        });
        assert!(previous.is_some());
        match table.decode_layer(LayerType::Icmp, &[1, 2]).unwrap() {
            Layer::Icmp(l) => assert_eq!(l.icmp_type, 0xff),
            other => panic!("unexpected layer {:?}", other),
        }
    }
}
