//! Zone snapshot files.
//!
//! A snapshot persists one generation of a zone. It consists of a single
//! header line
//!
//! ```text
//! $SNAPSHOT <origin> <serial> <count>
//! ```
//!
//! followed by `count` records in uncompressed wire format, the SOA record
//! first. Snapshots are read from and written to streams, so wrapping the
//! file in a [`ZlibWriter`] or [`ZlibReader`] gives compressed snapshots.
//!
//! [`ZlibWriter`]: crate::stream::ZlibWriter
//! [`ZlibReader`]: crate::stream::ZlibReader

use core::fmt;
use core::str::FromStr;
use std::string::String;
use std::vec::Vec;

use tracing::{debug, info};

use crate::base::name::Name;
use crate::base::record::{Record, RecordError};
use crate::base::serial::Serial;
use crate::stream::{
    ReadStream, ReadStreamExt, StreamError, WriteStream, WriteStreamExt,
};

use super::error::StoreError;
use super::traits::ZoneStore;
use super::types::{GenerationToken, ZoneVersion};

const MAGIC: &str = "$SNAPSHOT";

/// The longest header line accepted.
const MAX_HEADER_LEN: usize = 512;

//------------ Snapshot ------------------------------------------------------

/// The content of a snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Snapshot {
    pub origin: Name,
    pub soa: Record,
    pub records: Vec<Record>,
}

impl Snapshot {
    pub fn serial(&self) -> Serial {
        self.soa.soa().map(|soa| soa.serial()).unwrap_or(Serial(0))
    }

    /// Reads a snapshot from a stream.
    ///
    /// The stream must end right after the last record.
    pub fn read<R: ReadStream + ?Sized>(
        stream: &mut R,
    ) -> Result<Self, SnapshotError> {
        let line = stream.read_line(MAX_HEADER_LEN)?;
        let (origin, serial, count) = parse_header(&line)?;
        let soa = Record::read(stream)?;
        match soa.soa() {
            Some(data) if data.serial() == serial => {}
            Some(data) => {
                return Err(SnapshotError::BadHeader(format!(
                    "header serial {} differs from SOA serial {}",
                    serial,
                    data.serial()
                )))
            }
            None => return Err(SnapshotError::MissingSoa),
        }
        let mut records = Vec::with_capacity(count.saturating_sub(1));
        for found in 1..count {
            match Record::read(stream) {
                Ok(record) => records.push(record),
                Err(err) if err.is_end_of_stream() => {
                    return Err(SnapshotError::CountMismatch {
                        expected: count,
                        found,
                    })
                }
                Err(err) => return Err(err.into()),
            }
        }
        match stream.read_u8() {
            Err(StreamError::EndOfStream) => {}
            Err(err) => return Err(err.into()),
            Ok(_) => return Err(SnapshotError::TrailingData),
        }
        Ok(Snapshot {
            origin,
            soa,
            records,
        })
    }

    /// Writes the snapshot to a stream.
    ///
    /// The stream is flushed but not closed.
    pub fn write<W: WriteStream + ?Sized>(
        &self,
        stream: &mut W,
    ) -> Result<(), StreamError> {
        write_records(
            stream,
            &self.origin,
            self.serial(),
            self.records.len() + 1,
            core::iter::once(&self.soa).chain(&self.records),
        )
    }
}

fn parse_header(line: &str) -> Result<(Name, Serial, usize), SnapshotError> {
    let bad = || SnapshotError::BadHeader(line.into());
    let mut words = line.split_whitespace();
    if words.next() != Some(MAGIC) {
        return Err(bad());
    }
    let origin = words.next().and_then(|s| Name::from_str(s).ok());
    let serial = words.next().and_then(|s| Serial::from_str(s).ok());
    let count = words.next().and_then(|s| usize::from_str(s).ok());
    match (origin, serial, count, words.next()) {
        (Some(origin), Some(serial), Some(count), None) if count > 0 => {
            Ok((origin, serial, count))
        }
        _ => Err(bad()),
    }
}

fn write_records<'a, W: WriteStream + ?Sized>(
    stream: &mut W,
    origin: &Name,
    serial: Serial,
    count: usize,
    records: impl Iterator<Item = &'a Record>,
) -> Result<(), StreamError> {
    stream.write_line(&format!("{MAGIC} {origin} {serial} {count}"))?;
    for record in records {
        record.write(stream)?;
    }
    stream.flush()
}

//------------ save and load -------------------------------------------------

/// Writes the current generation of a zone to a stream.
///
/// Returns the version that was written.
pub fn save<S: ZoneStore + ?Sized, W: WriteStream + ?Sized>(
    store: &S,
    origin: &Name,
    stream: &mut W,
) -> Result<ZoneVersion, SnapshotError> {
    let version = store.current_soa(origin)?;
    let records: Vec<_> = store.enumerate(origin, version.token)?.collect();
    write_records(
        stream,
        origin,
        version.serial,
        records.len(),
        records.iter(),
    )?;
    info!(
        "Saved snapshot of zone {} at serial {} with {} records",
        origin,
        version.serial,
        records.len()
    );
    Ok(version)
}

/// Reads a snapshot and commits it as the new content of its zone.
///
/// The zone must exist in the store.
pub fn load<S: ZoneStore + ?Sized, R: ReadStream + ?Sized>(
    store: &S,
    stream: &mut R,
) -> Result<(Name, GenerationToken), SnapshotError> {
    let snapshot = Snapshot::read(stream)?;
    debug!(
        "Loading snapshot of zone {} at serial {}",
        snapshot.origin,
        snapshot.serial()
    );
    let token =
        store.commit_full(&snapshot.origin, snapshot.soa, snapshot.records)?;
    Ok((snapshot.origin, token))
}

//------------ SnapshotError -------------------------------------------------

/// A snapshot could not be read or written.
#[derive(Debug)]
pub enum SnapshotError {
    Stream(StreamError),
    Record(RecordError),
    Store(StoreError),

    /// The header line was malformed.
    BadHeader(String),

    /// The first record was not a SOA record.
    MissingSoa,

    /// The snapshot ended before all announced records were read.
    CountMismatch { expected: usize, found: usize },

    /// There was data after the last record.
    TrailingData,
}

impl From<StreamError> for SnapshotError {
    fn from(err: StreamError) -> Self {
        SnapshotError::Stream(err)
    }
}

impl From<RecordError> for SnapshotError {
    fn from(err: RecordError) -> Self {
        SnapshotError::Record(err)
    }
}

impl From<StoreError> for SnapshotError {
    fn from(err: StoreError) -> Self {
        SnapshotError::Store(err)
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SnapshotError::Stream(err) => write!(f, "Snapshot stream: {err}"),
            SnapshotError::Record(err) => write!(f, "Snapshot record: {err}"),
            SnapshotError::Store(err) => write!(f, "Snapshot store: {err}"),
            SnapshotError::BadHeader(line) => {
                write!(f, "Bad snapshot header: {line}")
            }
            SnapshotError::MissingSoa => {
                write!(f, "Snapshot does not start with a SOA record")
            }
            SnapshotError::CountMismatch { expected, found } => write!(
                f,
                "Snapshot announced {expected} records but has {found}"
            ),
            SnapshotError::TrailingData => {
                write!(f, "Trailing data after snapshot")
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Stream(err) => Some(err),
            SnapshotError::Record(err) => Some(err),
            SnapshotError::Store(err) => Some(err),
            _ => None,
        }
    }
}

//============ Testing =======================================================
