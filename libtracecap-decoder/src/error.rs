use crate::layers::LayerType;
use thiserror::Error;

/// Errors raised while decoding a layer
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes for the layer header
    #[error("{layer}: truncated, {needed} bytes needed, {available} available")]
    Truncated {
        layer: LayerType,
        needed: usize,
        available: usize,
    },
    /// Header fields are inconsistent
    #[error("{layer}: {reason}")]
    Invalid { layer: LayerType, reason: String },
    /// No decoder registered for this layer
    #[error("no decoder for layer {0}")]
    UnsupportedLayer(LayerType),
}

impl DecodeError {
    pub(crate) fn truncated(layer: LayerType, needed: usize, available: usize) -> Self {
        DecodeError::Truncated {
            layer,
            needed,
            available,
        }
    }

    pub(crate) fn invalid<S: Into<String>>(layer: LayerType, reason: S) -> Self {
        DecodeError::Invalid {
            layer,
            reason: reason.into(),
        }
    }
}
