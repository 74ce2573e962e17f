//! Immutable zone generations and the history of changes between them.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::vec::Vec;

use crate::base::iana::{Class, Rtype};
use crate::base::name::Name;
use crate::base::record::{Record, RecordData};
use crate::base::serial::Serial;
use crate::zonetree::error::StoreError;
use crate::zonetree::types::{
    is_contiguous, GenerationToken, ZoneDiff, ZoneVersion,
};

//------------ Generation ----------------------------------------------------

/// The complete content of a zone at one serial.
#[derive(Debug)]
pub struct Generation {
    token: GenerationToken,
    serial: Serial,
    soa: Record,
    records: Vec<Record>,
}

impl Generation {
    /// Creates a generation from a SOA record and the remaining records.
    pub fn new(
        token: GenerationToken,
        origin: &Name,
        soa: Record,
        records: Vec<Record>,
    ) -> Result<Self, StoreError> {
        let serial = soa.soa().ok_or(StoreError::MissingSoa)?.serial();
        if soa.owner() != origin {
            return Err(StoreError::Rejected(format!(
                "SOA record owner {} is not the apex {}",
                soa.owner(),
                origin
            )));
        }
        for record in &records {
            check_record(origin, soa.class(), record)?;
        }
        Ok(Generation {
            token,
            serial,
            soa,
            records: dedup(records),
        })
    }

    pub fn token(&self) -> GenerationToken {
        self.token
    }

    pub fn serial(&self) -> Serial {
        self.serial
    }

    pub fn version(&self) -> ZoneVersion {
        ZoneVersion {
            token: self.token,
            serial: self.serial,
            soa: self.soa.clone(),
        }
    }

    /// Returns the number of records including the SOA record.
    pub fn len(&self) -> usize {
        self.records.len() + 1
    }

    /// Creates the generation resulting from applying `diffs`.
    ///
    /// The diffs must form a contiguous chain starting at this generation’s
    /// serial. Removing a record that isn’t present is not an error.
    pub fn apply(
        &self,
        token: GenerationToken,
        origin: &Name,
        diffs: &[ZoneDiff],
    ) -> Result<Self, StoreError> {
        let last = match diffs.last() {
            Some(last) => last,
            None => {
                return Err(StoreError::Rejected("empty delta".into()));
            }
        };
        if !is_contiguous(diffs, self.serial, last.to_serial()) {
            return Err(StoreError::Rejected(format!(
                "delta chain does not start at serial {}",
                self.serial
            )));
        }
        let mut records = self.records.clone();
        for diff in diffs {
            for record in diff.added() {
                check_record(origin, self.soa.class(), record)?;
            }

            // Replaced records are removed first so the added version with
            // its new TTL takes their place.
            let replaced: HashSet<_> = diff
                .removed()
                .iter()
                .chain(diff.added())
                .map(RecordKey::new)
                .collect();
            if !replaced.is_empty() {
                records.retain(|record| {
                    !replaced.contains(&RecordKey::new(record))
                });
            }
            records.extend(dedup(diff.added().to_vec()));
        }
        Generation::new(token, origin, last.to_soa().clone(), records)
    }
}

fn check_record(
    origin: &Name,
    class: Class,
    record: &Record,
) -> Result<(), StoreError> {
    if record.rtype() == Rtype::SOA {
        return Err(StoreError::Rejected(format!(
            "unexpected SOA record for {}",
            record.owner()
        )));
    }
    if !record.owner().ends_with(origin) {
        return Err(StoreError::Rejected(format!(
            "record {} outside of zone {}",
            record.owner(),
            origin
        )));
    }
    if record.class() != class {
        return Err(StoreError::Rejected(format!(
            "record {} has class {}, zone has class {}",
            record.owner(),
            record.class(),
            class
        )));
    }
    Ok(())
}

/// Removes records with the same data, keeping the last one.
fn dedup(mut records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    let mut keep: Vec<bool> = records
        .iter()
        .rev()
        .map(|record| seen.insert(RecordKey::new(record)))
        .collect();
    drop(seen);
    keep.reverse();
    let mut keep = keep.into_iter();
    records.retain(|_| keep.next().unwrap_or(true));
    records
}

//------------ RecordKey -----------------------------------------------------

/// The identity of a record within a zone, i.e., everything but the TTL.
#[derive(Debug, Eq, Hash, PartialEq)]
struct RecordKey<'a> {
    owner: &'a Name,
    class: Class,
    data: &'a RecordData,
}

impl<'a> RecordKey<'a> {
    fn new(record: &'a Record) -> Self {
        RecordKey {
            owner: record.owner(),
            class: record.class(),
            data: record.data(),
        }
    }
}

//------------ GenerationRecords ---------------------------------------------

/// An iterator over all records of a generation, SOA first.
///
/// The iterator holds on to the generation.
#[derive(Debug)]
pub struct GenerationRecords {
    generation: Arc<Generation>,
    pos: usize,
}

impl GenerationRecords {
    pub(super) fn new(generation: Arc<Generation>) -> Self {
        GenerationRecords { generation, pos: 0 }
    }

    pub fn token(&self) -> GenerationToken {
        self.generation.token
    }
}

impl Iterator for GenerationRecords {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let res = match self.pos {
            0 => self.generation.soa.clone(),
            pos => self.generation.records.get(pos - 1)?.clone(),
        };
        self.pos += 1;
        Some(res)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.generation.len().saturating_sub(self.pos);
        (len, Some(len))
    }
}

impl ExactSizeIterator for GenerationRecords {}

//------------ History -------------------------------------------------------

/// The most recent diffs of a zone.
#[derive(Debug, Default)]
pub struct History {
    diffs: VecDeque<ZoneDiff>,
    max_len: usize,
}

impl History {
    pub fn new(max_len: usize) -> Self {
        History {
            diffs: VecDeque::new(),
            max_len,
        }
    }

    pub fn push(&mut self, diffs: impl IntoIterator<Item = ZoneDiff>) {
        self.diffs.extend(diffs);
        while self.diffs.len() > self.max_len {
            self.diffs.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.diffs.clear()
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    /// Returns the chain of diffs from `from` to `to` if available.
    pub fn chain(&self, from: Serial, to: Serial) -> Option<Vec<ZoneDiff>> {
        if from == to {
            return Some(Vec::new());
        }
        let start = self
            .diffs
            .iter()
            .rposition(|diff| diff.from_serial() == from)?;
        let mut res = Vec::new();
        for diff in self.diffs.range(start..) {
            res.push(diff.clone());
            if diff.to_serial() == to {
                break;
            }
        }
        if is_contiguous(&res, from, to) {
            Some(res)
        } else {
            None
        }
    }
}

//============ Testing =======================================================
