use std::vec::Vec;

use crate::base::name::Name;
use crate::base::record::Record;
use crate::base::serial::Serial;

use super::error::StoreError;
use super::types::{GenerationToken, ZoneDiff, ZoneVersion};

//------------ ZoneStore -----------------------------------------------------

/// Storage for the zones transferred in and out.
///
/// A store keeps a sequence of generations per zone. Readers always see one
/// complete generation: a generation once published never changes and a
/// commit replaces the current generation atomically. Commits for the same
/// zone are serialised by the store.
pub trait ZoneStore: Send + Sync {
    /// The iterator returned by [`enumerate`][Self::enumerate].
    type Records: Iterator<Item = Record>;

    /// Returns the current generation of a zone.
    ///
    /// Returns [`StoreError::MissingSoa`] if the zone exists but has no
    /// content yet.
    fn current_soa(&self, origin: &Name) -> Result<ZoneVersion, StoreError>;

    /// Returns all records of a generation, starting with its SOA record.
    ///
    /// The iterator keeps the generation alive, so commits happening while
    /// it is in use don’t affect it.
    fn enumerate(
        &self,
        origin: &Name,
        token: GenerationToken,
    ) -> Result<Self::Records, StoreError>;

    /// Returns the diffs leading from serial `from` to serial `to`.
    ///
    /// Returns `Ok(None)` if the store can’t provide a complete chain.
    fn delta(
        &self,
        origin: &Name,
        from: Serial,
        to: Serial,
    ) -> Result<Option<Vec<ZoneDiff>>, StoreError>;

    /// Replaces the content of a zone.
    ///
    /// The records must not contain the SOA record.
    fn commit_full(
        &self,
        origin: &Name,
        soa: Record,
        records: Vec<Record>,
    ) -> Result<GenerationToken, StoreError>;

    /// Applies a sequence of diffs to a zone.
    ///
    /// Fails with [`StoreError::SerialMismatch`] if the zone isn’t at
    /// `expected_from` when the commit happens.
    fn commit_delta(
        &self,
        origin: &Name,
        expected_from: Serial,
        diffs: Vec<ZoneDiff>,
    ) -> Result<GenerationToken, StoreError>;
}
