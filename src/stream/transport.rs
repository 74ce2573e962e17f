//! Streams over `std::io` transports.

use std::io;

use tracing::trace;

use super::{ReadStream, State, StreamError, WriteStream};

//------------ Transport -----------------------------------------------------

/// A stream over anything implementing `std::io::Read` and/or
/// `std::io::Write`.
///
/// This is how a TCP connection or a file becomes a stream. Reads and
/// writes interrupted by a signal are retried; all other I/O errors –
/// including timeouts configured on the underlying socket – are reported
/// as [`StreamError::Io`].
///
/// If the transport is both readable and writable, both `close` methods
/// drop it. Use fully qualified syntax to pick one, e.g.
/// `WriteStream::close(&mut transport)` which flushes first.
#[derive(Debug)]
pub struct Transport<T> {
    state: State<T>,
}

impl<T> Transport<T> {
    pub fn new(inner: T) -> Self {
        Transport {
            state: State::Open(inner),
        }
    }

    /// Returns a reference to the transport unless the stream was closed.
    pub fn get_ref(&self) -> Option<&T> {
        self.state.get()
    }

    /// Returns the transport unless the stream was closed.
    pub fn into_inner(mut self) -> Option<T> {
        self.state.take().ok()
    }
}

impl<T: io::Read> ReadStream for Transport<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let inner = self.state.get_mut()?;
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match inner.read(buf) {
                Ok(0) => return Err(StreamError::EndOfStream),
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    continue
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn close(&mut self) -> Result<(), StreamError> {
        trace!("Closing readable transport");
        self.state.take().map(|_| ())
    }
}

impl<T: io::Write> WriteStream for Transport<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        let inner = self.state.get_mut()?;
        loop {
            match inner.write(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    continue
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        self.state.get_mut()?.flush().map_err(Into::into)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        trace!("Closing writable transport");
        let mut inner = self.state.take()?;
        inner.flush().map_err(Into::into)
    }
}

//============ Testing =======================================================
