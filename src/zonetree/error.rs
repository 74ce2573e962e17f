//! Zone store errors.

use std::fmt::Display;
use std::string::String;

use crate::base::name::Name;
use crate::base::serial::Serial;

use super::types::GenerationToken;

//------------ StoreError ----------------------------------------------------

/// A zone store operation failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreError {
    /// The store does not know the zone.
    UnknownZone(Name),

    /// The generation is no longer or was never available.
    UnknownGeneration(GenerationToken),

    /// The zone is not at the serial a change was based on.
    SerialMismatch { expected: Serial, found: Serial },

    /// A SOA record was required but missing.
    ///
    /// This is also returned for the SOA of a zone that has no content yet.
    MissingSoa,

    /// The store refused the data.
    Rejected(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StoreError::UnknownZone(name) => write!(f, "Unknown zone {name}"),
            StoreError::UnknownGeneration(token) => {
                write!(f, "Unknown zone generation {token}")
            }
            StoreError::SerialMismatch { expected, found } => write!(
                f,
                "Serial mismatch: expected {expected}, found {found}"
            ),
            StoreError::MissingSoa => write!(f, "Missing SOA record"),
            StoreError::Rejected(reason) => {
                write!(f, "Data rejected: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
