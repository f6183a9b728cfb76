use std::io;
use thiserror::Error;

/// Errors raised by trace codecs, live handles and the capture orchestrator
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or mutually exclusive options
    #[error("configuration error: {0}")]
    Config(String),
    /// The stream does not start with a known pcap magic
    #[error("bad magic 0x{0:08x}")]
    BadMagic(u32),
    /// pcap-ng section header missing or invalid
    #[error("bad section: {0}")]
    BadSection(&'static str),
    /// The stream ended in the middle of a header or record
    #[error("truncated input: {0}")]
    Truncated(&'static str),
    /// Record is structurally invalid (length fields inconsistent)
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    /// pcap-ng block total length is invalid, or leading and trailing lengths differ
    #[error("invalid block length {0}")]
    InvalidBlockLength(u32),
    /// pcap-ng packet references an interface not defined in the current section
    #[error("unknown interface id {0}")]
    UnknownInterface(u32),
    /// Live handle or trace writer was closed
    #[error("handle closed")]
    HandleClosed,
    /// Read timeout expired on a live handle
    #[error("timeout expired")]
    Timeout,
    /// Operation not available on this platform
    #[error("not supported: {0}")]
    NotSupported(&'static str),
    /// BPF program rejected
    #[error("bpf: {0}")]
    Bpf(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn config<S: Into<String>>(s: S) -> Self {
        Error::Config(s.into())
    }

    /// Returns true for the errors a live capture loop may retry or ignore
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

/// Map an unexpected end of file to `Truncated`, keeping other I/O errors
pub(crate) fn truncated_or_io(e: io::Error, what: &'static str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated(what)
    } else {
        Error::Io(e)
    }
}
