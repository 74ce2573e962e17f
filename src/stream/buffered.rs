//! Buffering decorators.

use super::wire::WriteStreamExt;
use super::{ReadStream, State, StreamError, WriteStream};

const DEFAULT_CAPACITY: usize = 8 * 1024;

//------------ BufferedReader ------------------------------------------------

/// Reads from the wrapped stream in large chunks.
#[derive(Debug)]
pub struct BufferedReader<R> {
    state: State<R>,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
}

impl<R> BufferedReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, inner)
    }

    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        BufferedReader {
            state: State::Open(inner),
            buf: vec![0u8; core::cmp::max(capacity, 1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }
}

impl<R: ReadStream> ReadStream for BufferedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let inner = self.state.get_mut()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos == self.filled {
            // Large reads bypass the buffer.
            if buf.len() >= self.buf.len() {
                return inner.read(buf);
            }
            self.filled = inner.read(&mut self.buf)?;
            self.pos = 0;
        }
        let len = core::cmp::min(buf.len(), self.filled - self.pos);
        buf[..len].copy_from_slice(&self.buf[self.pos..self.pos + len]);
        self.pos += len;
        Ok(len)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.pos = 0;
        self.filled = 0;
        self.state.take()?.close()
    }
}

//------------ BufferedWriter ------------------------------------------------

/// Collects small writes before passing them to the wrapped stream.
#[derive(Debug)]
pub struct BufferedWriter<W> {
    state: State<W>,
    buf: Vec<u8>,
    capacity: usize,
}

impl<W> BufferedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, inner)
    }

    pub fn with_capacity(capacity: usize, inner: W) -> Self {
        BufferedWriter {
            state: State::Open(inner),
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }
}

impl<W: WriteStream> BufferedWriter<W> {
    fn flush_buf(&mut self) -> Result<(), StreamError> {
        let inner = self.state.get_mut()?;
        if !self.buf.is_empty() {
            inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl<W: WriteStream> WriteStream for BufferedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        if self.state.is_closed() {
            return Err(StreamError::Closed);
        }
        if self.buf.len() + buf.len() > self.capacity {
            self.flush_buf()?;
        }
        if buf.len() >= self.capacity {
            return self.state.get_mut()?.write(buf);
        }
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        self.flush_buf()?;
        self.state.get_mut()?.flush()
    }

    fn close(&mut self) -> Result<(), StreamError> {
        let res = self.flush_buf();
        let mut inner = self.state.take()?;
        res?;
        inner.close()
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::{
        Counting, MemoryReader, MemoryWriter, ReadStreamExt,
    };

    #[test]
    fn buffered_reads() {
        let data: Vec<u8> = (0..=255).collect();
        let mut reader =
            BufferedReader::with_capacity(16, MemoryReader::new(data));
        let mut total = 0usize;
        while let Ok(byte) = reader.read_u8() {
            assert_eq!(usize::from(byte), total);
            total += 1;
        }
        assert_eq!(total, 256);
        reader.close().unwrap();
        assert!(matches!(reader.read_u8(), Err(StreamError::Closed)));
    }

    #[test]
    fn buffered_writes_reach_inner_on_flush() {
        let mut writer =
            BufferedWriter::with_capacity(8, Counting::new(MemoryWriter::new()));
        writer.write_all(b"abc").unwrap();
        assert_eq!(writer.state.get().map(Counting::count), Some(0));
        writer.flush().unwrap();
        assert_eq!(writer.state.get().map(Counting::count), Some(3));
        writer.write_all(b"0123456789").unwrap();
        assert_eq!(writer.state.get().map(Counting::count), Some(13));
        writer.close().unwrap();
        assert!(matches!(writer.flush(), Err(StreamError::Closed)));
    }
}
