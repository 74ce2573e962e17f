//! Storing zones and their history.
//!
//! The transfer code talks to zone storage through the [`ZoneStore`]
//! trait only. A store publishes generations of a zone, each identified by
//! a [`GenerationToken`], and keeps the diffs between them as [`ZoneDiff`]s
//! for incremental transfers.
//!
//! The [`InMemoryZoneStore`] is a complete implementation keeping all data
//! in memory. The [`snapshot`] module persists a generation to a stream and
//! loads it back.

mod error;
mod in_memory;
mod traits;
mod types;

pub mod snapshot;

pub use self::error::StoreError;
pub use self::in_memory::{
    GenerationRecords, InMemoryConfig, InMemoryZoneStore,
};
pub use self::traits::ZoneStore;
pub use self::types::{is_contiguous, GenerationToken, ZoneDiff, ZoneVersion};
