//! Transfer errors.

use core::fmt;

use crate::base::iana::{Opcode, Rcode, Rtype};
use crate::base::message::PushError;
use crate::base::name::Name;
use crate::base::record::RecordError;
use crate::base::serial::Serial;
use crate::stream::StreamError;
use crate::zonetree::StoreError;

//------------ XfrStage ------------------------------------------------------

/// The part of a transfer session that failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum XfrStage {
    /// Deciding on and building the request.
    Request,

    /// Sending an answer.
    Produce,

    /// Receiving an answer.
    Consume,

    /// Committing the received data.
    Commit,
}

impl fmt::Display for XfrStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            XfrStage::Request => f.write_str("request"),
            XfrStage::Produce => f.write_str("produce"),
            XfrStage::Consume => f.write_str("consume"),
            XfrStage::Commit => f.write_str("commit"),
        }
    }
}

//------------ XfrError ------------------------------------------------------

/// A transfer session failed.
///
/// The session is over. Nothing was committed unless the error happened
/// during the commit itself, in which case the store kept its previous
/// generation.
#[derive(Debug)]
pub struct XfrError {
    pub origin: Name,
    pub stage: XfrStage,
    pub kind: XfrErrorKind,
}

impl XfrError {
    pub fn new(
        origin: Name,
        stage: XfrStage,
        kind: impl Into<XfrErrorKind>,
    ) -> Self {
        XfrError {
            origin,
            stage,
            kind: kind.into(),
        }
    }

    /// Returns the protocol violation if that is what happened.
    pub fn violation(&self) -> Option<&ProtocolViolation> {
        match self.kind {
            XfrErrorKind::Protocol(ref violation) => Some(violation),
            _ => None,
        }
    }
}

impl fmt::Display for XfrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Transfer of zone {} failed during {}: {}",
            self.origin, self.stage, self.kind
        )
    }
}

impl std::error::Error for XfrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind {
            XfrErrorKind::Stream(ref err) => Some(err),
            XfrErrorKind::Protocol(ref err) => Some(err),
            XfrErrorKind::Storage(ref err) => Some(err),
            XfrErrorKind::Compose(ref err) => Some(err),
            XfrErrorKind::Busy => None,
        }
    }
}

//------------ XfrErrorKind --------------------------------------------------

#[derive(Debug)]
pub enum XfrErrorKind {
    /// Reading from or writing to the stream failed.
    Stream(StreamError),

    /// The other side didn’t follow the protocol.
    Protocol(ProtocolViolation),

    /// The zone store failed or refused the data.
    Storage(StoreError),

    /// A message could not be assembled.
    Compose(PushError),

    /// Another transfer into the same zone is in progress.
    Busy,
}

impl From<StreamError> for XfrErrorKind {
    fn from(err: StreamError) -> Self {
        XfrErrorKind::Stream(err)
    }
}

impl From<ProtocolViolation> for XfrErrorKind {
    fn from(err: ProtocolViolation) -> Self {
        XfrErrorKind::Protocol(err)
    }
}

impl From<StoreError> for XfrErrorKind {
    fn from(err: StoreError) -> Self {
        XfrErrorKind::Storage(err)
    }
}

impl From<PushError> for XfrErrorKind {
    fn from(err: PushError) -> Self {
        XfrErrorKind::Compose(err)
    }
}

impl From<RecordError> for XfrErrorKind {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Stream(err) => XfrErrorKind::Stream(err),
            RecordError::RdataLength { rtype, declared } => {
                XfrErrorKind::Protocol(ProtocolViolation::RdataLength {
                    rtype,
                    declared,
                })
            }
            RecordError::LongRdata => {
                XfrErrorKind::Protocol(ProtocolViolation::Malformed)
            }
        }
    }
}

impl fmt::Display for XfrErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            XfrErrorKind::Stream(err) => write!(f, "stream error: {err}"),
            XfrErrorKind::Protocol(err) => write!(f, "protocol error: {err}"),
            XfrErrorKind::Storage(err) => write!(f, "storage error: {err}"),
            XfrErrorKind::Compose(err) => {
                write!(f, "cannot compose message: {err}")
            }
            XfrErrorKind::Busy => {
                f.write_str("another transfer is in progress")
            }
        }
    }
}

//------------ ProtocolViolation ---------------------------------------------

/// The transfer answer or request didn’t follow the protocol.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProtocolViolation {
    /// The message is not a response.
    NotResponse,

    /// The response ID doesn’t match the request.
    IdMismatch { expected: u16, found: u16 },

    /// The opcode is not QUERY.
    BadOpcode(Opcode),

    /// The response carries an error code.
    ErrorResponse(Rcode),

    /// The TC flag is set.
    Truncated,

    /// The question doesn’t match the request.
    QuestionMismatch,

    /// A record that should have been a SOA record wasn’t.
    NotSoa(Rtype),

    /// A SOA record for a different zone.
    WrongOrigin { expected: Name, found: Name },

    /// A SOA record had a serial that doesn’t fit where it appeared.
    UnexpectedSerial { expected: Serial, found: Serial },

    /// A record’s RDATA length didn’t match its content.
    RdataLength { rtype: Rtype, declared: u16 },

    /// A record could not be parsed.
    Malformed,

    /// Records followed the end of the transfer.
    TrailingRecords,

    /// The answer ended before the transfer was complete.
    Incomplete,

    /// The transfer exceeded the configured number of records.
    TooManyRecords { limit: usize },

    /// The transfer was aborted by an earlier violation.
    Aborted,
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolViolation::NotResponse => {
                f.write_str("message is not a response")
            }
            ProtocolViolation::IdMismatch { expected, found } => {
                write!(f, "expected message ID {expected}, found {found}")
            }
            ProtocolViolation::BadOpcode(opcode) => {
                write!(f, "unexpected opcode {opcode}")
            }
            ProtocolViolation::ErrorResponse(rcode) => {
                write!(f, "error response {rcode}")
            }
            ProtocolViolation::Truncated => {
                f.write_str("message has the TC flag set")
            }
            ProtocolViolation::QuestionMismatch => {
                f.write_str("question does not match request")
            }
            ProtocolViolation::NotSoa(rtype) => {
                write!(f, "expected SOA record, found {rtype}")
            }
            ProtocolViolation::WrongOrigin { expected, found } => {
                write!(f, "expected SOA record for {expected}, found {found}")
            }
            ProtocolViolation::UnexpectedSerial { expected, found } => {
                write!(f, "expected SOA serial {expected}, found {found}")
            }
            ProtocolViolation::RdataLength { rtype, declared } => write!(
                f,
                "{rtype} record data does not match declared length {declared}"
            ),
            ProtocolViolation::Malformed => f.write_str("malformed record"),
            ProtocolViolation::TrailingRecords => {
                f.write_str("records after the end of the transfer")
            }
            ProtocolViolation::Incomplete => {
                f.write_str("transfer ended prematurely")
            }
            ProtocolViolation::TooManyRecords { limit } => {
                write!(f, "transfer exceeds {limit} records")
            }
            ProtocolViolation::Aborted => {
                f.write_str("transfer already aborted")
            }
        }
    }
}

impl std::error::Error for ProtocolViolation {}
