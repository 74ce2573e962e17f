//! Reading and writing DNS wire format primitives on streams.

use bytes::Bytes;
use std::io;

use crate::base::name::{Name, NameBuilder, NameError};

use super::{ReadStream, StreamError, WriteStream};

//------------ ReadStreamExt -------------------------------------------------

/// Typed reading helpers for every [`ReadStream`].
///
/// All helpers are built from [`ReadStream::read`] alone (plus
/// [`ReadStream::consumed`] for resolving compressed names).
pub trait ReadStreamExt: ReadStream {
    /// Fills all of `buf`.
    ///
    /// Returns [`StreamError::EndOfStream`] if the stream ended before the
    /// first octet and [`StreamError::Truncated`] if it ended later.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(n) => filled += n,
                Err(err) if filled == 0 => return Err(err),
                Err(err) => return Err(err.into_truncated(buf.len(), filled)),
            }
        }
        Ok(())
    }

    /// Skips exactly `len` octets.
    fn skip_exact(&mut self, len: usize) -> Result<(), StreamError> {
        if len == 0 {
            return Ok(());
        }
        let skipped = self.skip(len)?;
        if skipped < len {
            return Err(StreamError::Truncated {
                expected: len,
                read: skipped,
            });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, StreamError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads a big-endian `u16`.
    fn read_u16(&mut self) -> Result<u16, StreamError> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Reads a big-endian `u32`.
    fn read_u32(&mut self) -> Result<u32, StreamError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Reads exactly `len` octets into a new buffer.
    fn read_octets(&mut self, len: usize) -> Result<Bytes, StreamError> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf.into())
    }

    /// Reads a possibly compressed domain name.
    ///
    /// Compression pointers are resolved against [`ReadStream::consumed`].
    /// A pointer must point to an earlier position than the pointer itself
    /// and every further pointer followed must point further back still.
    /// The resulting name is checked against the label and name length
    /// limits.
    fn read_name(&mut self) -> Result<Name, StreamError> {
        let mut builder = NameBuilder::new();
        let mut read = 0;
        loop {
            let ltype = match self.read_u8() {
                Ok(ltype) => ltype,
                Err(err) if read == 0 => return Err(err),
                Err(err) => return Err(err.into_truncated(read + 1, read)),
            };
            read += 1;
            match ltype & 0xC0 {
                0x00 if ltype == 0 => break,
                0x00 => {
                    let len = usize::from(ltype);
                    let mut label = [0u8; Name::MAX_LABEL_LEN];
                    self.read_exact(&mut label[..len])
                        .map_err(|err| err.into_truncated(read + len, read))?;
                    read += len;
                    builder.push_label(&label[..len]).map_err(name_error)?;
                }
                0xC0 => {
                    let low = self
                        .read_u8()
                        .map_err(|err| err.into_truncated(read + 1, read))?;
                    let ptr = (u16::from(ltype & 0x3F) << 8) | u16::from(low);
                    let message =
                        self.consumed().ok_or(StreamError::BadPointer(ptr))?;
                    let here = message
                        .len()
                        .checked_sub(2)
                        .ok_or(StreamError::BadPointer(ptr))?;
                    resolve_pointer(message, ptr, here, &mut builder)?;
                    break;
                }
                _ => return Err(StreamError::BadLabelType(ltype)),
            }
        }
        builder.finish().map_err(name_error)
    }

    /// Reads a line of text of at most `max_len` octets.
    ///
    /// The line terminator – a line feed optionally preceded by a carriage
    /// return – is not included. A final line without terminator is
    /// accepted.
    fn read_line(&mut self, max_len: usize) -> Result<String, StreamError> {
        let mut line = Vec::new();
        loop {
            let ch = match self.read_u8() {
                Ok(ch) => ch,
                Err(StreamError::EndOfStream) if !line.is_empty() => break,
                Err(err) => return Err(err),
            };
            if ch == b'\n' {
                break;
            }
            // One more octet than allowed may still be the carriage return.
            if line.len() > max_len {
                return Err(StreamError::LongLine);
            }
            line.push(ch);
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > max_len {
            return Err(StreamError::LongLine);
        }
        String::from_utf8(line).map_err(|_| StreamError::BadText)
    }
}

impl<R: ReadStream + ?Sized> ReadStreamExt for R {}

/// Follows the compression pointer `ptr` found at position `here`.
fn resolve_pointer(
    message: &[u8],
    mut ptr: u16,
    here: usize,
    builder: &mut NameBuilder,
) -> Result<(), StreamError> {
    let mut limit = here;
    loop {
        let start = usize::from(ptr);
        if start >= limit {
            return Err(StreamError::BadPointer(ptr));
        }
        let mut pos = start;
        loop {
            let ltype = *message.get(pos).ok_or(StreamError::BadPointer(ptr))?;
            match ltype & 0xC0 {
                0x00 if ltype == 0 => return Ok(()),
                0x00 => {
                    let end = pos + 1 + usize::from(ltype);
                    let label = message
                        .get(pos + 1..end)
                        .ok_or(StreamError::BadPointer(ptr))?;
                    builder.push_label(label).map_err(name_error)?;
                    pos = end;
                }
                0xC0 => {
                    let low =
                        *message.get(pos + 1).ok_or(StreamError::BadPointer(ptr))?;
                    limit = start;
                    ptr = (u16::from(ltype & 0x3F) << 8) | u16::from(low);
                    break;
                }
                _ => return Err(StreamError::BadLabelType(ltype)),
            }
        }
    }
}

fn name_error(err: NameError) -> StreamError {
    match err {
        NameError::LongLabel => StreamError::LongLabel,
        _ => StreamError::LongName,
    }
}

//------------ WriteStreamExt ------------------------------------------------

/// Typed writing helpers for every [`WriteStream`].
pub trait WriteStreamExt: WriteStream {
    /// Writes all of `buf`.
    fn write_all(&mut self, mut buf: &[u8]) -> Result<(), StreamError> {
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => {
                    return Err(StreamError::Io(io::ErrorKind::WriteZero.into()))
                }
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }

    fn write_u8(&mut self, value: u8) -> Result<(), StreamError> {
        self.write_all(&[value])
    }

    /// Writes a big-endian `u16`.
    fn write_u16(&mut self, value: u16) -> Result<(), StreamError> {
        self.write_all(&value.to_be_bytes())
    }

    /// Writes a big-endian `u32`.
    fn write_u32(&mut self, value: u32) -> Result<(), StreamError> {
        self.write_all(&value.to_be_bytes())
    }

    /// Writes an uncompressed domain name.
    fn write_name(&mut self, name: &Name) -> Result<(), StreamError> {
        self.write_all(name.as_wire())
    }

    /// Writes a line of text followed by a line feed.
    fn write_line(&mut self, line: &str) -> Result<(), StreamError> {
        self.write_all(line.as_bytes())?;
        self.write_all(b"\n")
    }
}

impl<W: WriteStream + ?Sized> WriteStreamExt for W {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::{MemoryReader, MemoryWriter};
    use core::str::FromStr;

    #[test]
    fn exact_reads_distinguish_end_from_truncation() {
        let mut stream = MemoryReader::new(&b"\x00\x01\x02"[..]);
        assert_eq!(stream.read_u16().unwrap(), 1);
        assert!(matches!(
            stream.read_u16(),
            Err(StreamError::Truncated {
                expected: 2,
                read: 1
            })
        ));
        assert!(matches!(stream.read_u8(), Err(StreamError::EndOfStream)));
    }

    #[test]
    fn skip_exact() {
        let mut stream = MemoryReader::new(&b"abcdef"[..]);
        stream.skip_exact(4).unwrap();
        assert_eq!(stream.read_u8().unwrap(), b'e');
        assert!(matches!(
            stream.skip_exact(3),
            Err(StreamError::Truncated {
                expected: 3,
                read: 1
            })
        ));
    }

    #[test]
    fn integers_round_trip() {
        let mut out = MemoryWriter::new();
        out.write_u8(7).unwrap();
        out.write_u16(0x1234).unwrap();
        out.write_u32(0xDEAD_BEEF).unwrap();
        let mut input = MemoryReader::new(out.into_bytes());
        assert_eq!(input.read_u8().unwrap(), 7);
        assert_eq!(input.read_u16().unwrap(), 0x1234);
        assert_eq!(input.read_u32().unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn compressed_names() {
        // example. at 0, a.<ptr to 0> at 9, b.<ptr to 9> at 13.
        let msg = b"\x07example\x00\x01a\xC0\x00\x01b\xC0\x09";
        let mut stream = MemoryReader::new(&msg[..]);
        assert_eq!(
            stream.read_name().unwrap(),
            Name::from_str("example.").unwrap()
        );
        assert_eq!(
            stream.read_name().unwrap(),
            Name::from_str("a.example.").unwrap()
        );
        assert_eq!(
            stream.read_name().unwrap(),
            Name::from_str("b.a.example.").unwrap()
        );
    }

    #[test]
    fn forward_and_self_pointers_are_rejected() {
        // Pointer to itself.
        let mut stream = MemoryReader::new(&b"\xC0\x00"[..]);
        assert!(matches!(
            stream.read_name(),
            Err(StreamError::BadPointer(0))
        ));

        // Pointer forward.
        let mut stream = MemoryReader::new(&b"\xC0\x02\x00"[..]);
        assert!(matches!(
            stream.read_name(),
            Err(StreamError::BadPointer(2))
        ));

        // A loop: the name at 2 points to 0 which points to 2.
        let mut stream = MemoryReader::new(&b"\xC0\x02\xC0\x00"[..]);
        stream.skip_exact(2).unwrap();
        assert!(matches!(stream.read_name(), Err(StreamError::BadPointer(_))));
    }

    #[test]
    fn bad_labels_are_rejected() {
        let mut stream = MemoryReader::new(&b"\x41x\x00"[..]);
        assert!(matches!(
            stream.read_name(),
            Err(StreamError::BadLabelType(0x41))
        ));

        let mut wire = Vec::new();
        for _ in 0..5 {
            wire.push(63);
            wire.extend_from_slice(&[b'a'; 63]);
        }
        wire.push(0);
        let mut stream = MemoryReader::new(wire);
        assert!(matches!(stream.read_name(), Err(StreamError::LongName)));
    }

    #[test]
    fn truncated_name() {
        let mut stream = MemoryReader::new(&b"\x07exam"[..]);
        assert!(matches!(
            stream.read_name(),
            Err(StreamError::Truncated { .. })
        ));
        let mut stream = MemoryReader::new(&b""[..]);
        assert!(matches!(stream.read_name(), Err(StreamError::EndOfStream)));
    }

    #[test]
    fn lines() {
        let mut stream = MemoryReader::new(&b"first\r\nsecond\nlast"[..]);
        assert_eq!(stream.read_line(16).unwrap(), "first");
        assert_eq!(stream.read_line(16).unwrap(), "second");
        assert_eq!(stream.read_line(16).unwrap(), "last");
        assert!(matches!(stream.read_line(16), Err(StreamError::EndOfStream)));

        let mut stream = MemoryReader::new(&b"much too long\n"[..]);
        assert!(matches!(stream.read_line(4), Err(StreamError::LongLine)));

        let mut stream = MemoryReader::new(&b"four\r\nfive5\n"[..]);
        assert_eq!(stream.read_line(4).unwrap(), "four");
        assert!(matches!(stream.read_line(4), Err(StreamError::LongLine)));
        let mut stream = MemoryReader::new(&b"four\r"[..]);
        assert_eq!(stream.read_line(4).unwrap(), "four");

        let mut out = MemoryWriter::new();
        out.write_line("hello").unwrap();
        assert_eq!(out.as_slice(), b"hello\n");
    }
}
