//! A decorator capping how many octets can be read.

use super::{ReadStream, State, StreamError};

//------------ Limited -------------------------------------------------------

/// Allows reading at most a given number of octets from a stream.
///
/// This confines a nested parser to a region of the stream, e.g., the
/// record data of a resource record to its declared length. Once the limit
/// is reached, further reads fail with [`StreamError::LimitExceeded`] so a
/// parser that wants more than it was given can be told apart from a
/// stream that actually ended.
///
/// A limited stream is a view: closing it only closes the view, not the
/// wrapped stream.
#[derive(Debug)]
pub struct Limited<R> {
    state: State<R>,
    remaining: usize,
}

impl<R> Limited<R> {
    pub fn new(inner: R, limit: usize) -> Self {
        Limited {
            state: State::Open(inner),
            remaining: limit,
        }
    }

    /// Returns how many more octets may be read.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Returns the wrapped stream unless the view was closed.
    pub fn into_inner(mut self) -> Option<R> {
        self.state.take().ok()
    }
}

impl<R: ReadStream> ReadStream for Limited<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let inner = self.state.get_mut()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            return Err(StreamError::LimitExceeded);
        }
        let len = core::cmp::min(buf.len(), self.remaining);
        let n = inner.read(&mut buf[..len])?;
        self.remaining -= n;
        Ok(n)
    }

    fn skip(&mut self, len: usize) -> Result<usize, StreamError> {
        let inner = self.state.get_mut()?;
        if len > self.remaining {
            return Err(StreamError::LimitExceeded);
        }
        let n = inner.skip(len)?;
        self.remaining -= n;
        Ok(n)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.state.take().map(|_| ())
    }

    fn consumed(&self) -> Option<&[u8]> {
        self.state.get().and_then(ReadStream::consumed)
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::{MemoryReader, ReadStreamExt};

    #[test]
    fn caps_reads() {
        let mut inner = MemoryReader::new(&b"\x00\x01\x00\x02rest"[..]);
        let mut limited = Limited::new(&mut inner, 3);
        assert_eq!(limited.read_u16().unwrap(), 1);
        assert!(matches!(
            limited.read_u16(),
            Err(StreamError::LimitExceeded)
        ));
        assert_eq!(limited.remaining(), 0);
        limited.close().unwrap();
        assert!(matches!(limited.read_u8(), Err(StreamError::Closed)));

        // The wrapped stream remains usable.
        assert_eq!(inner.read_u8().unwrap(), 2);
    }

    #[test]
    fn delegates_consumed() {
        let mut inner = MemoryReader::new(&b"\x01a\x00\xC0\x00"[..]);
        inner.skip_exact(3).unwrap();
        let mut limited = Limited::new(&mut inner, 2);
        assert_eq!(limited.read_name().unwrap().to_string(), "a.");
        assert_eq!(limited.remaining(), 0);
    }

    #[test]
    fn skip_beyond_limit() {
        let mut limited = Limited::new(MemoryReader::new(&b"abc"[..]), 2);
        assert!(matches!(limited.skip(3), Err(StreamError::LimitExceeded)));
        assert_eq!(limited.skip(2).unwrap(), 2);
    }
}
