use std::io::{self, BufWriter, Read, Write};

/// Fill `buf` from `r`, stopping early only at end of stream
///
/// Returns the number of bytes read, which is less than `buf.len()` only if the
/// stream ended.
pub(crate) fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Padding needed to align `len` to 4 bytes
#[inline]
pub(crate) const fn pad4(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Output sink of trace writers, optionally buffered
pub(crate) enum Sink<W: Write> {
    Direct(W),
    Buffered(BufWriter<W>),
}

impl<W: Write> Sink<W> {
    pub(crate) fn new(w: W, buffered: bool) -> Self {
        if buffered {
            Sink::Buffered(BufWriter::new(w))
        } else {
            Sink::Direct(w)
        }
    }

    /// Flush and return the underlying writer
    pub(crate) fn into_inner(self) -> io::Result<W> {
        match self {
            Sink::Direct(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Sink::Buffered(b) => b.into_inner().map_err(|e| e.into_error()),
        }
    }
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Direct(w) => w.write(buf),
            Sink::Buffered(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Sink::Direct(w) => w.write_all(buf),
            Sink::Buffered(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Direct(w) => w.flush(),
            Sink::Buffered(w) => w.flush(),
        }
    }
}
