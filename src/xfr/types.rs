use core::fmt;

use crate::base::iana::Rtype;
use crate::base::serial::Serial;
use crate::zonetree::GenerationToken;

//------------ XfrType -------------------------------------------------------

/// The type of zone transfer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum XfrType {
    /// RFC 5936 AXFR.
    ///
    /// A complete snapshot of a zone at a particular version.
    Axfr,

    /// RFC 1995 IXFR.
    ///
    /// An incremental diff of the zone from one version to another.
    Ixfr,
}

impl XfrType {
    pub fn rtype(self) -> Rtype {
        match self {
            XfrType::Axfr => Rtype::AXFR,
            XfrType::Ixfr => Rtype::IXFR,
        }
    }
}

impl TryFrom<Rtype> for XfrType {
    type Error = ();

    fn try_from(rtype: Rtype) -> Result<Self, Self::Error> {
        match rtype {
            Rtype::AXFR => Ok(Self::Axfr),
            Rtype::IXFR => Ok(Self::Ixfr),
            _ => Err(()),
        }
    }
}

impl From<XfrType> for Rtype {
    fn from(xfr_type: XfrType) -> Self {
        xfr_type.rtype()
    }
}

impl fmt::Display for XfrType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            XfrType::Axfr => f.write_str("AXFR"),
            XfrType::Ixfr => f.write_str("IXFR"),
        }
    }
}

//------------ TransferPlan --------------------------------------------------

/// How a secondary is brought up to date.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferPlan {
    /// The secondary already has the primary’s version.
    UpToDate,

    /// The secondary receives the diffs since its version.
    Ixfr,

    /// The secondary receives the complete zone.
    Axfr,
}

impl TransferPlan {
    /// Returns the transfer type for the plan, if a transfer is needed.
    pub fn xfr_type(self) -> Option<XfrType> {
        match self {
            TransferPlan::UpToDate => None,
            TransferPlan::Ixfr => Some(XfrType::Ixfr),
            TransferPlan::Axfr => Some(XfrType::Axfr),
        }
    }
}

impl fmt::Display for TransferPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransferPlan::UpToDate => f.write_str("up to date"),
            TransferPlan::Ixfr => f.write_str("IXFR"),
            TransferPlan::Axfr => f.write_str("AXFR"),
        }
    }
}

//------------ XfrConfig -----------------------------------------------------

/// Limits and framing options for producing and consuming transfers.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct XfrConfig {
    /// The size a produced message should not exceed.
    ///
    /// This is a soft limit: a single record that is larger than this is
    /// still sent in a message of its own.
    pub max_message_size: usize,

    /// The maximum number of answer records in a produced message.
    pub max_records_per_message: u16,

    /// Whether a produced AXFR answer ends with a copy of the SOA record.
    ///
    /// RFC 5936 requires this. Without it, the end of the answer is
    /// signalled by the end of the stream.
    pub axfr_closing_soa: bool,

    /// Whether a produced IXFR answer starts with the current SOA record.
    ///
    /// RFC 1995 requires this. Without it, the answer starts directly with
    /// the first diff.
    pub ixfr_leading_soa: bool,

    /// The maximum number of records accepted in a consumed transfer.
    pub max_transfer_records: Option<usize>,
}

impl Default for XfrConfig {
    fn default() -> Self {
        XfrConfig {
            max_message_size: 16384,
            max_records_per_message: 500,
            axfr_closing_soa: false,
            ixfr_leading_soa: false,
            max_transfer_records: None,
        }
    }
}

//------------ ProducerStats -------------------------------------------------

/// What a producer sent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProducerStats {
    /// The plan the answer followed.
    pub plan: TransferPlan,

    /// The serial of the zone version that was sent.
    pub serial: Serial,

    /// The number of messages written.
    pub messages: usize,

    /// The number of answer records written.
    pub records: usize,

    /// The number of octets written including length prefixes.
    pub octets: usize,
}

//------------ TransferOutcome -----------------------------------------------

/// The result of a successful incoming transfer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferOutcome {
    /// The secondary already had the primary’s version.
    UpToDate { serial: Serial },

    /// A new generation was committed.
    Committed {
        serial: Serial,
        token: GenerationToken,
        kind: XfrType,

        /// The number of records received.
        records: usize,
    },
}

impl TransferOutcome {
    /// Returns the serial the secondary is at after the transfer.
    pub fn serial(&self) -> Serial {
        match *self {
            TransferOutcome::UpToDate { serial } => serial,
            TransferOutcome::Committed { serial, .. } => serial,
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn xfr_type_from_rtype() {
        assert_eq!(XfrType::try_from(Rtype::AXFR), Ok(XfrType::Axfr));
        assert_eq!(XfrType::try_from(Rtype::IXFR), Ok(XfrType::Ixfr));
        assert!(XfrType::try_from(Rtype::SOA).is_err());
        assert_eq!(Rtype::from(XfrType::Ixfr), Rtype::IXFR);
    }
}
