use core::fmt;
use std::vec::Vec;

use crate::base::record::Record;
use crate::base::serial::Serial;

use super::error::StoreError;

//------------ GenerationToken -----------------------------------------------

/// Identifies one published generation of a zone.
///
/// Tokens are handed out by a store in increasing order. They are only
/// meaningful to the store that issued them.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GenerationToken(u64);

impl GenerationToken {
    pub fn new(value: u64) -> Self {
        GenerationToken(value)
    }

    pub fn into_int(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//------------ ZoneVersion ---------------------------------------------------

/// The current generation of a zone and its SOA record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZoneVersion {
    pub token: GenerationToken,
    pub serial: Serial,
    pub soa: Record,
}

//------------ ZoneDiff ------------------------------------------------------

/// The difference between two consecutive versions of a zone.
///
/// A diff starts at the SOA record of the older version and ends at the SOA
/// record of the newer one. The SOA records themselves are not part of the
/// removed or added records.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZoneDiff {
    from_soa: Record,
    to_soa: Record,
    from: Serial,
    to: Serial,
    removed: Vec<Record>,
    added: Vec<Record>,
}

impl ZoneDiff {
    /// Creates an empty diff between two SOA records.
    pub fn new(from_soa: Record, to_soa: Record) -> Result<Self, StoreError> {
        let from = from_soa.soa().ok_or(StoreError::MissingSoa)?.serial();
        let to = to_soa.soa().ok_or(StoreError::MissingSoa)?.serial();
        Ok(ZoneDiff {
            from_soa,
            to_soa,
            from,
            to,
            removed: Vec::new(),
            added: Vec::new(),
        })
    }

    pub fn from_serial(&self) -> Serial {
        self.from
    }

    pub fn to_serial(&self) -> Serial {
        self.to
    }

    pub fn from_soa(&self) -> &Record {
        &self.from_soa
    }

    pub fn to_soa(&self) -> &Record {
        &self.to_soa
    }

    pub fn removed(&self) -> &[Record] {
        &self.removed
    }

    pub fn added(&self) -> &[Record] {
        &self.added
    }

    pub fn push_removed(&mut self, record: Record) {
        self.removed.push(record)
    }

    pub fn push_added(&mut self, record: Record) {
        self.added.push(record)
    }

    /// Returns whether neither records were removed nor added.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// Returns the number of records the diff occupies in an IXFR answer.
    ///
    /// This includes the two SOA records framing the diff.
    pub fn record_count(&self) -> usize {
        self.removed.len() + self.added.len() + 2
    }
}

/// Returns whether `diffs` lead from serial `from` to serial `to` step by
/// step without gaps.
pub fn is_contiguous(diffs: &[ZoneDiff], from: Serial, to: Serial) -> bool {
    let mut current = from;
    for diff in diffs {
        if diff.from != current {
            return false;
        }
        current = diff.to;
    }
    current == to
}

//============ Testing =======================================================
