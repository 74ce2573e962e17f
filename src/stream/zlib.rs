//! Zlib compressing and decompressing decorators.
//!
//! Both decorators bridge to `flate2` through small adapters that let a
//! stream act as a `std::io` reader or writer. Errors from the wrapped
//! stream travel through `io::Error` and are unwrapped again on the way
//! out.

use std::io;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::trace;

use super::{ReadStream, State, StreamError, WriteStream};

//------------ ZlibReader ----------------------------------------------------

/// Decompresses zlib data read from the wrapped stream.
pub struct ZlibReader<R> {
    state: State<ZlibDecoder<IoReader<R>>>,
}

impl<R: ReadStream> ZlibReader<R> {
    pub fn new(inner: R) -> Self {
        ZlibReader {
            state: State::Open(ZlibDecoder::new(IoReader(inner))),
        }
    }

    /// Returns the number of compressed octets consumed so far.
    pub fn total_in(&self) -> u64 {
        self.state.get().map(ZlibDecoder::total_in).unwrap_or(0)
    }
}

impl<R: ReadStream> ReadStream for ZlibReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let decoder = self.state.get_mut()?;
        if buf.is_empty() {
            return Ok(0);
        }
        match io::Read::read(decoder, buf) {
            Ok(0) => Err(StreamError::EndOfStream),
            Ok(n) => Ok(n),
            Err(err) => Err(err.into()),
        }
    }

    fn close(&mut self) -> Result<(), StreamError> {
        trace!("Closing zlib reader");
        self.state.take()?.into_inner().0.close()
    }
}

//------------ ZlibWriter ----------------------------------------------------

/// Compresses everything written before passing it to the wrapped stream.
///
/// Closing the writer finishes the compressed stream and then closes the
/// wrapped stream.
pub struct ZlibWriter<W: WriteStream> {
    state: State<ZlibEncoder<IoWriter<W>>>,
}

impl<W: WriteStream> ZlibWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_level(inner, Compression::default().level())
    }

    /// Creates a writer using the given compression level from 0 to 9.
    pub fn with_level(inner: W, level: u32) -> Self {
        ZlibWriter {
            state: State::Open(ZlibEncoder::new(
                IoWriter(inner),
                Compression::new(level),
            )),
        }
    }
}

impl<W: WriteStream> WriteStream for ZlibWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        io::Write::write(self.state.get_mut()?, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        io::Write::flush(self.state.get_mut()?).map_err(Into::into)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        let encoder = self.state.take()?;
        trace!("Closing zlib writer after {} octets", encoder.total_in());
        let mut inner = encoder.finish()?.0;
        inner.close()
    }
}

//------------ IoReader and IoWriter -----------------------------------------

struct IoReader<R>(R);

impl<R: ReadStream> io::Read for IoReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.read(buf) {
            Ok(n) => Ok(n),
            Err(StreamError::EndOfStream) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}

struct IoWriter<W>(W);

impl<W: WriteStream> io::Write for IoWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush().map_err(Into::into)
    }
}

//============ Testing =======================================================
