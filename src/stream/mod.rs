//! Readable and writable octet streams.
//!
//! Transfers are parsed from and composed onto streams of octets without
//! fixing what is actually behind them. The [`ReadStream`] and
//! [`WriteStream`] traits define the minimal contract; everything else –
//! reading exactly a given number of octets, big-endian integers, domain
//! names, lines of text – is built on top of that contract by the
//! extension traits [`ReadStreamExt`] and [`WriteStreamExt`].
//!
//! The module provides the following implementations:
//!
//! * [`MemoryReader`] and [`MemoryWriter`] for in-memory buffers,
//! * [`Transport`] for anything implementing `std::io::Read` or
//!   `std::io::Write`, e.g. a TCP connection or a file,
//! * [`Counting`], a decorator tracking the number of octets passed through,
//! * [`Limited`], a decorator capping how much can be read through it,
//! * [`BufferedReader`] and [`BufferedWriter`], buffering decorators, and
//! * `ZlibReader` and `ZlibWriter`, decompressing and compressing
//!   decorators, if the `zlib` feature is enabled.
//!
//! # Closing
//!
//! Every stream can be closed. A closed stream enters an explicit closed
//! state: all further operations, including closing it again, fail with
//! [`StreamError::Closed`].
//!
//! # End of stream versus truncation
//!
//! A read that finds the stream exhausted before it could produce a single
//! octet reports [`StreamError::EndOfStream`]. The helpers that need a
//! fixed amount of data report [`StreamError::Truncated`] instead if the
//! stream ended after some but not all of that data was read. Callers use
//! this distinction to tell a stream that ended cleanly at a record
//! boundary from one that was cut off in the middle of a record.

mod buffered;
mod counting;
mod limited;
mod memory;
mod transport;
mod wire;
#[cfg(feature = "zlib")]
mod zlib;

pub use self::buffered::{BufferedReader, BufferedWriter};
pub use self::counting::Counting;
pub use self::limited::Limited;
pub use self::memory::{MemoryReader, MemoryWriter};
pub use self::transport::Transport;
pub use self::wire::{ReadStreamExt, WriteStreamExt};
#[cfg(feature = "zlib")]
pub use self::zlib::{ZlibReader, ZlibWriter};

use std::{fmt, io};

//------------ ReadStream ----------------------------------------------------

/// A readable stream of octets.
pub trait ReadStream {
    /// Reads some octets into `buf`.
    ///
    /// Returns the number of octets read which is only zero if `buf` is
    /// empty. If the stream is exhausted, returns
    /// [`StreamError::EndOfStream`].
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;

    /// Skips over up to `len` octets.
    ///
    /// Returns the number of octets actually skipped which is less than
    /// `len` only if the stream ended. If the stream was already exhausted,
    /// returns [`StreamError::EndOfStream`].
    fn skip(&mut self, len: usize) -> Result<usize, StreamError> {
        let mut scratch = [0u8; 512];
        let mut skipped = 0;
        while skipped < len {
            let chunk = core::cmp::min(len - skipped, scratch.len());
            match self.read(&mut scratch[..chunk]) {
                Ok(n) => skipped += n,
                Err(StreamError::EndOfStream) if skipped > 0 => break,
                Err(err) => return Err(err),
            }
        }
        Ok(skipped)
    }

    /// Closes the stream.
    fn close(&mut self) -> Result<(), StreamError>;

    /// Returns the octets of the current message consumed so far.
    ///
    /// Streams that keep the message they are reading from in memory return
    /// everything from the start of the message up to the current position.
    /// This is what compressed domain names point into. Streams that don’t
    /// return `None` and can’t be used to read compressed names.
    fn consumed(&self) -> Option<&[u8]> {
        None
    }
}

impl<R: ReadStream + ?Sized> ReadStream for &mut R {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        (**self).read(buf)
    }

    fn skip(&mut self, len: usize) -> Result<usize, StreamError> {
        (**self).skip(len)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        (**self).close()
    }

    fn consumed(&self) -> Option<&[u8]> {
        (**self).consumed()
    }
}

impl<R: ReadStream + ?Sized> ReadStream for Box<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        (**self).read(buf)
    }

    fn skip(&mut self, len: usize) -> Result<usize, StreamError> {
        (**self).skip(len)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        (**self).close()
    }

    fn consumed(&self) -> Option<&[u8]> {
        (**self).consumed()
    }
}

//------------ WriteStream ---------------------------------------------------

/// A writable stream of octets.
pub trait WriteStream {
    /// Writes some of the octets in `buf`.
    ///
    /// Returns the number of octets written.
    fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError>;

    /// Flushes any buffered data to the underlying sink.
    fn flush(&mut self) -> Result<(), StreamError>;

    /// Flushes and closes the stream.
    fn close(&mut self) -> Result<(), StreamError>;
}

impl<W: WriteStream + ?Sized> WriteStream for &mut W {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<(), StreamError> {
        (**self).close()
    }
}

impl<W: WriteStream + ?Sized> WriteStream for Box<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<(), StreamError> {
        (**self).close()
    }
}

//------------ State ---------------------------------------------------------

/// The open or closed state of a stream.
///
/// Stream implementations keep whatever they wrap in here. Once closed, the
/// wrapped value is dropped and every access fails with
/// [`StreamError::Closed`].
#[derive(Debug)]
pub(crate) enum State<S> {
    Open(S),
    Closed,
}

impl<S> State<S> {
    pub fn get(&self) -> Option<&S> {
        match self {
            State::Open(inner) => Some(inner),
            State::Closed => None,
        }
    }

    pub fn get_mut(&mut self) -> Result<&mut S, StreamError> {
        match self {
            State::Open(inner) => Ok(inner),
            State::Closed => Err(StreamError::Closed),
        }
    }

    /// Moves the wrapped value out and leaves the state closed.
    pub fn take(&mut self) -> Result<S, StreamError> {
        match core::mem::replace(self, State::Closed) {
            State::Open(inner) => Ok(inner),
            State::Closed => Err(StreamError::Closed),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, State::Closed)
    }
}

//------------ StreamError ---------------------------------------------------

/// An error happened while reading from or writing to a stream.
#[derive(Debug)]
pub enum StreamError {
    /// The stream ended before any octet could be read.
    EndOfStream,

    /// The stream ended after only part of the required data was read.
    Truncated { expected: usize, read: usize },

    /// The stream has been closed.
    Closed,

    /// A limit imposed on the stream was reached.
    LimitExceeded,

    /// A domain name label was longer than 63 octets.
    LongLabel,

    /// A domain name was longer than 255 octets.
    LongName,

    /// A domain name contained a label type other than normal or pointer.
    BadLabelType(u8),

    /// A compression pointer pointed forward, at itself, or couldn’t be
    /// resolved.
    BadPointer(u16),

    /// A line of text exceeded the allowed length.
    LongLine,

    /// A line of text wasn’t valid UTF-8.
    BadText,

    /// The underlying transport failed.
    Io(io::Error),
}

impl StreamError {
    /// Returns whether this is a clean end of stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, StreamError::EndOfStream)
    }

    /// Converts a clean end of stream into a truncation.
    ///
    /// This is used once the first octet of a unit of data has been read:
    /// from then on, the stream ending is always a truncation.
    pub fn into_truncated(self, expected: usize, read: usize) -> Self {
        match self {
            StreamError::EndOfStream => {
                StreamError::Truncated { expected, read }
            }
            err => err,
        }
    }
}

//--- From

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        // Errors produced by our own streams travel through io::Error when
        // wrapped by std based adapters. Unwrap them again.
        if err.get_ref().map(|inner| inner.is::<StreamError>()) == Some(true)
        {
            if let Some(Ok(inner)) =
                err.into_inner().map(|inner| inner.downcast::<StreamError>())
            {
                return *inner;
            }
            return StreamError::Io(io::ErrorKind::Other.into());
        }
        StreamError::Io(err)
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(err) => err,
            StreamError::EndOfStream => {
                io::Error::new(io::ErrorKind::UnexpectedEof, err)
            }
            err => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}

//--- Display and Error

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::EndOfStream => f.write_str("end of stream"),
            StreamError::Truncated { expected, read } => write!(
                f,
                "stream truncated after {read} of {expected} octets"
            ),
            StreamError::Closed => f.write_str("stream closed"),
            StreamError::LimitExceeded => f.write_str("stream limit exceeded"),
            StreamError::LongLabel => f.write_str("label exceeds 63 octets"),
            StreamError::LongName => f.write_str("name exceeds 255 octets"),
            StreamError::BadLabelType(ltype) => {
                write!(f, "illegal label type 0x{ltype:02x}")
            }
            StreamError::BadPointer(ptr) => {
                write!(f, "illegal compression pointer to offset {ptr}")
            }
            StreamError::LongLine => f.write_str("line too long"),
            StreamError::BadText => f.write_str("line is not valid UTF-8"),
            StreamError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Io(err) => Some(err),
            _ => None,
        }
    }
}
