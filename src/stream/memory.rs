//! Streams over in-memory buffers.

use bytes::{Bytes, BytesMut};

use super::{ReadStream, State, StreamError, WriteStream};

//------------ MemoryReader --------------------------------------------------

/// A readable stream over an in-memory buffer.
///
/// Because the whole buffer is available, the reader can provide the
/// octets consumed so far and thus resolve compressed domain names.
#[derive(Debug)]
pub struct MemoryReader {
    state: State<Cursor>,
}

#[derive(Debug)]
struct Cursor {
    data: Bytes,
    pos: usize,
}

impl MemoryReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        MemoryReader {
            state: State::Open(Cursor {
                data: data.into(),
                pos: 0,
            }),
        }
    }

    /// Returns the current read position.
    pub fn position(&self) -> usize {
        self.state.get().map(|cursor| cursor.pos).unwrap_or(0)
    }

    /// Returns the number of octets left to read.
    pub fn remaining(&self) -> usize {
        self.state
            .get()
            .map(|cursor| cursor.data.len() - cursor.pos)
            .unwrap_or(0)
    }
}

impl ReadStream for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let cursor = self.state.get_mut()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let left = &cursor.data[cursor.pos..];
        if left.is_empty() {
            return Err(StreamError::EndOfStream);
        }
        let len = core::cmp::min(left.len(), buf.len());
        buf[..len].copy_from_slice(&left[..len]);
        cursor.pos += len;
        Ok(len)
    }

    fn skip(&mut self, len: usize) -> Result<usize, StreamError> {
        let cursor = self.state.get_mut()?;
        let left = cursor.data.len() - cursor.pos;
        if left == 0 && len > 0 {
            return Err(StreamError::EndOfStream);
        }
        let len = core::cmp::min(left, len);
        cursor.pos += len;
        Ok(len)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.state.take().map(|_| ())
    }

    fn consumed(&self) -> Option<&[u8]> {
        self.state.get().map(|cursor| &cursor.data[..cursor.pos])
    }
}

//------------ MemoryWriter --------------------------------------------------

/// A writable stream collecting everything written into memory.
///
/// The collected data stays available after the writer was closed.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    buf: BytesMut,
    closed: bool,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the data written so far.
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_ref()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Converts the writer into the data written.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl WriteStream for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        self.closed = true;
        Ok(())
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::{ReadStreamExt, WriteStreamExt};

    #[test]
    fn read_and_consumed() {
        let mut reader = MemoryReader::new(&b"abcd"[..]);
        let mut buf = [0u8; 3];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(reader.consumed(), Some(&b"abc"[..]));
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert!(matches!(reader.read(&mut buf), Err(StreamError::EndOfStream)));
    }

    #[test]
    fn closed_reader_fails_deterministically() {
        let mut reader = MemoryReader::new(&b"abcd"[..]);
        reader.close().unwrap();
        assert!(matches!(reader.read_u8(), Err(StreamError::Closed)));
        assert!(matches!(reader.skip(1), Err(StreamError::Closed)));
        assert!(matches!(reader.close(), Err(StreamError::Closed)));
        assert_eq!(reader.consumed(), None);
    }

    #[test]
    fn closed_writer_keeps_data() {
        let mut writer = MemoryWriter::new();
        writer.write_all(b"data").unwrap();
        writer.close().unwrap();
        assert!(matches!(writer.write(b"more"), Err(StreamError::Closed)));
        assert!(matches!(writer.flush(), Err(StreamError::Closed)));
        assert!(matches!(writer.close(), Err(StreamError::Closed)));
        assert_eq!(writer.into_bytes().as_ref(), b"data");
    }
}
