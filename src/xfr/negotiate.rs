//! Deciding between AXFR and IXFR.

use core::fmt;

use tracing::debug;

use crate::base::name::Name;
use crate::base::serial::{self, Serial};

use super::types::TransferPlan;

/// Decides how to bring a secondary at `secondary` up to `primary`.
///
/// Only if the primary is strictly newer and can provide the diffs since
/// the secondary’s serial is an incremental transfer possible. Serials
/// exactly 2^31 apart can’t be ordered and also lead to a full transfer.
pub fn plan_transfer(
    secondary: Serial,
    primary: Serial,
    delta_available: bool,
) -> TransferPlan {
    negotiate(Some(secondary), primary, delta_available).plan
}

/// Decides on a transfer and explains why a full transfer was chosen.
///
/// A secondary without a copy of the zone passes `None`.
pub fn negotiate(
    secondary: Option<Serial>,
    primary: Serial,
    delta_available: bool,
) -> Negotiation {
    let secondary = match secondary {
        Some(secondary) => secondary,
        None => {
            return Negotiation::fallback(SerialPolicyFallback::NoLocalCopy)
        }
    };
    if secondary == primary {
        return Negotiation {
            plan: TransferPlan::UpToDate,
            fallback: None,
        };
    }
    if !serial::greater(primary.into_int(), secondary.into_int()) {
        return Negotiation::fallback(
            if serial::less(primary.into_int(), secondary.into_int()) {
                SerialPolicyFallback::SecondaryNotOlder
            } else {
                SerialPolicyFallback::SerialsIncomparable
            },
        );
    }
    if !delta_available {
        return Negotiation::fallback(SerialPolicyFallback::DeltaUnavailable);
    }
    Negotiation {
        plan: TransferPlan::Ixfr,
        fallback: None,
    }
}

//------------ Negotiation ---------------------------------------------------

/// The outcome of negotiating a transfer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Negotiation {
    pub plan: TransferPlan,

    /// Why the plan is a full transfer, if it is.
    pub fallback: Option<SerialPolicyFallback>,
}

impl Negotiation {
    fn fallback(reason: SerialPolicyFallback) -> Self {
        Negotiation {
            plan: TransferPlan::Axfr,
            fallback: Some(reason),
        }
    }

    /// Logs the decision for the given zone.
    pub(super) fn log(&self, origin: &Name) {
        match self.fallback {
            Some(reason) => {
                debug!("Zone {origin}: falling back to AXFR: {reason}")
            }
            None => debug!("Zone {origin}: transfer plan is {}", self.plan),
        }
    }
}

//------------ SerialPolicyFallback ------------------------------------------

/// The reason a full transfer is needed.
///
/// This is not an error. It explains a routing decision.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SerialPolicyFallback {
    /// The secondary has no copy of the zone.
    NoLocalCopy,

    /// The secondary’s serial is newer than the primary’s.
    SecondaryNotOlder,

    /// The serials are exactly 2^31 apart.
    SerialsIncomparable,

    /// The primary can’t provide the diffs since the secondary’s serial.
    DeltaUnavailable,
}

impl fmt::Display for SerialPolicyFallback {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SerialPolicyFallback::NoLocalCopy => {
                f.write_str("secondary has no copy of the zone")
            }
            SerialPolicyFallback::SecondaryNotOlder => {
                f.write_str("secondary serial is not older than primary")
            }
            SerialPolicyFallback::SerialsIncomparable => {
                f.write_str("serials cannot be compared")
            }
            SerialPolicyFallback::DeltaUnavailable => {
                f.write_str("no diffs available")
            }
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(8, 8, true, TransferPlan::UpToDate)]
    #[case(8, 8, false, TransferPlan::UpToDate)]
    #[case(8, 9, true, TransferPlan::Ixfr)]
    #[case(9, 8, true, TransferPlan::Axfr)]
    #[case(8, 9, false, TransferPlan::Axfr)]
    #[case(0xFFFF_FFFF, 1, true, TransferPlan::Ixfr)]
    #[case(1, 0xFFFF_FFFF, true, TransferPlan::Axfr)]
    #[case(0, 0x8000_0000, true, TransferPlan::Axfr)]
    fn plans(
        #[case] secondary: u32,
        #[case] primary: u32,
        #[case] delta_available: bool,
        #[case] expected: TransferPlan,
    ) {
        assert_eq!(
            plan_transfer(Serial(secondary), Serial(primary), delta_available),
            expected
        );
    }

    #[test]
    fn fallback_reasons() {
        assert_eq!(
            negotiate(None, Serial(1), true).fallback,
            Some(SerialPolicyFallback::NoLocalCopy)
        );
        assert_eq!(
            negotiate(Some(Serial(2)), Serial(1), true).fallback,
            Some(SerialPolicyFallback::SecondaryNotOlder)
        );
        assert_eq!(
            negotiate(Some(Serial(0)), Serial(0x8000_0000), true).fallback,
            Some(SerialPolicyFallback::SerialsIncomparable)
        );
        assert_eq!(
            negotiate(Some(Serial(1)), Serial(2), false).fallback,
            Some(SerialPolicyFallback::DeltaUnavailable)
        );
        assert_eq!(negotiate(Some(Serial(1)), Serial(2), true).fallback, None);
    }
}
