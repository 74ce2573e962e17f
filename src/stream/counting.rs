//! A decorator counting the octets passing through a stream.

use super::{ReadStream, State, StreamError, WriteStream};

//------------ Counting ------------------------------------------------------

/// Counts the octets read from or written to the wrapped stream.
///
/// Closing the decorator closes the wrapped stream, too. The count remains
/// available afterwards.
#[derive(Debug)]
pub struct Counting<S> {
    state: State<S>,
    count: u64,
}

impl<S> Counting<S> {
    pub fn new(inner: S) -> Self {
        Counting {
            state: State::Open(inner),
            count: 0,
        }
    }

    /// Returns the number of octets passed through so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns a reference to the wrapped stream unless closed.
    pub fn get_ref(&self) -> Option<&S> {
        self.state.get()
    }

    /// Returns the wrapped stream unless closed.
    pub fn into_inner(mut self) -> Option<S> {
        self.state.take().ok()
    }
}

impl<S: ReadStream> ReadStream for Counting<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let n = self.state.get_mut()?.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn skip(&mut self, len: usize) -> Result<usize, StreamError> {
        let n = self.state.get_mut()?.skip(len)?;
        self.count += n as u64;
        Ok(n)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.state.take()?.close()
    }

    fn consumed(&self) -> Option<&[u8]> {
        self.state.get().and_then(ReadStream::consumed)
    }
}

impl<S: WriteStream> WriteStream for Counting<S> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        let n = self.state.get_mut()?.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        self.state.get_mut()?.flush()
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.state.take()?.close()
    }
}

//============ Testing =======================================================
