//! An in-memory backing store for zones.
//!
//! Every zone keeps its current generation behind an [`ArcSwapOption`] so
//! readers never block and always observe one complete generation. Commits
//! for a zone are serialised by a per-zone mutex; the new generation is
//! built aside and then published with a single store.
//!
//! Besides the current generation, the store keeps a bounded number of
//! previous generations so that a transfer that learned a generation token
//! just before a commit can still enumerate it, and a bounded history of
//! diffs for answering incremental transfers.
mod versioned;

pub use self::versioned::GenerationRecords;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::vec::Vec;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::base::name::Name;
use crate::base::record::Record;
use crate::base::serial::Serial;

use self::versioned::{Generation, History};
use super::error::StoreError;
use super::traits::ZoneStore;
use super::types::{GenerationToken, ZoneDiff, ZoneVersion};

//------------ InMemoryConfig ------------------------------------------------

/// Configuration of an [`InMemoryZoneStore`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct InMemoryConfig {
    /// How many diffs to keep per zone for incremental transfers.
    pub max_deltas: usize,

    /// How many previous generations stay available for enumeration.
    pub retained_generations: usize,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        InMemoryConfig {
            max_deltas: 64,
            retained_generations: 4,
        }
    }
}

//------------ InMemoryZoneStore ---------------------------------------------

/// A zone store keeping everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryZoneStore {
    config: InMemoryConfig,
    zones: RwLock<HashMap<Name, Arc<ZoneEntry>>>,
    next_token: AtomicU64,
}

#[derive(Debug)]
struct ZoneEntry {
    current: ArcSwapOption<Generation>,

    /// Holding this lock serialises commits.
    state: Mutex<ZoneState>,
}

#[derive(Debug)]
struct ZoneState {
    history: History,
    retained: VecDeque<Arc<Generation>>,
}

impl InMemoryZoneStore {
    pub fn new(config: InMemoryConfig) -> Self {
        InMemoryZoneStore {
            config,
            zones: Default::default(),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &InMemoryConfig {
        &self.config
    }

    /// Adds an empty zone.
    ///
    /// Fails if the zone already exists.
    pub fn add_zone(&self, origin: Name) -> Result<(), StoreError> {
        let mut zones = self.zones.write();
        if zones.contains_key(&origin) {
            return Err(StoreError::Rejected(format!(
                "zone {origin} already exists"
            )));
        }
        debug!("Adding zone {origin}");
        zones.insert(
            origin,
            Arc::new(ZoneEntry {
                current: ArcSwapOption::empty(),
                state: Mutex::new(ZoneState {
                    history: History::new(self.config.max_deltas),
                    retained: VecDeque::new(),
                }),
            }),
        );
        Ok(())
    }

    /// Removes a zone and all its generations.
    ///
    /// Iterators still holding on to a generation remain valid.
    pub fn remove_zone(&self, origin: &Name) -> Result<(), StoreError> {
        self.zones
            .write()
            .remove(origin)
            .map(|_| ())
            .ok_or_else(|| StoreError::UnknownZone(origin.clone()))
    }

    /// Returns the names of all zones.
    pub fn zones(&self) -> Vec<Name> {
        self.zones.read().keys().cloned().collect()
    }

    /// Returns the number of diffs kept for a zone.
    pub fn history_len(&self, origin: &Name) -> Result<usize, StoreError> {
        Ok(self.zone(origin)?.state.lock().history.len())
    }

    fn zone(&self, origin: &Name) -> Result<Arc<ZoneEntry>, StoreError> {
        self.zones
            .read()
            .get(origin)
            .cloned()
            .ok_or_else(|| StoreError::UnknownZone(origin.clone()))
    }

    fn next_token(&self) -> GenerationToken {
        GenerationToken::new(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Publishes a new generation. The caller must hold the zone’s lock.
    fn publish(
        &self,
        zone: &ZoneEntry,
        state: &mut ZoneState,
        generation: Generation,
    ) -> GenerationToken {
        let token = generation.token();
        if let Some(previous) = zone.current.swap(Some(Arc::new(generation)))
        {
            state.retained.push_back(previous);
            while state.retained.len() > self.config.retained_generations {
                state.retained.pop_front();
            }
        }
        token
    }
}

impl ZoneStore for InMemoryZoneStore {
    type Records = GenerationRecords;

    fn current_soa(&self, origin: &Name) -> Result<ZoneVersion, StoreError> {
        self.zone(origin)?
            .current
            .load_full()
            .map(|generation| generation.version())
            .ok_or(StoreError::MissingSoa)
    }

    fn enumerate(
        &self,
        origin: &Name,
        token: GenerationToken,
    ) -> Result<GenerationRecords, StoreError> {
        let zone = self.zone(origin)?;
        if let Some(current) = zone.current.load_full() {
            if current.token() == token {
                return Ok(GenerationRecords::new(current));
            }
        }
        let state = zone.state.lock();
        state
            .retained
            .iter()
            .find(|generation| generation.token() == token)
            .cloned()
            .map(GenerationRecords::new)
            .ok_or(StoreError::UnknownGeneration(token))
    }

    fn delta(
        &self,
        origin: &Name,
        from: Serial,
        to: Serial,
    ) -> Result<Option<Vec<ZoneDiff>>, StoreError> {
        Ok(self.zone(origin)?.state.lock().history.chain(from, to))
    }

    fn commit_full(
        &self,
        origin: &Name,
        soa: Record,
        records: Vec<Record>,
    ) -> Result<GenerationToken, StoreError> {
        let zone = self.zone(origin)?;
        let mut state = zone.state.lock();
        let generation = Generation::new(self.next_token(), origin, soa, records)?;
        let serial = generation.serial();
        let count = generation.len();

        // A full replacement breaks the chain of diffs.
        state.history.clear();
        let token = self.publish(&zone, &mut state, generation);
        info!(
            "Committed zone {origin} at serial {serial} with {count} records \
             as generation {token}"
        );
        Ok(token)
    }

    fn commit_delta(
        &self,
        origin: &Name,
        expected_from: Serial,
        diffs: Vec<ZoneDiff>,
    ) -> Result<GenerationToken, StoreError> {
        let zone = self.zone(origin)?;
        let mut state = zone.state.lock();
        let current = zone.current.load_full().ok_or(StoreError::MissingSoa)?;
        if current.serial() != expected_from {
            return Err(StoreError::SerialMismatch {
                expected: expected_from,
                found: current.serial(),
            });
        }
        if diffs.is_empty() {
            debug!("Empty delta for zone {origin}, nothing to commit");
            return Ok(current.token());
        }
        let generation = current.apply(self.next_token(), origin, &diffs)?;
        let serial = generation.serial();
        let steps = diffs.len();
        state.history.push(diffs);
        let token = self.publish(&zone, &mut state, generation);
        info!(
            "Committed {steps} diffs to zone {origin} from serial \
             {expected_from} to {serial} as generation {token}"
        );
        Ok(token)
    }
}

//============ Testing =======================================================
