//! Zone transfers.
//!
//! This module implements both sides of AXFR ([RFC 5936]) and IXFR
//! ([RFC 1995]) over a pair of streams.
//!
//! A primary answers transfer requests with an [`XfrProducer`]. It decides
//! whether the requesting secondary is up to date, can receive the diffs
//! since its version, or needs the complete zone, and writes the answer as
//! a sequence of length-prefixed messages.
//!
//! A secondary uses an [`XfrConsumer`] to create the request for a zone and
//! to receive the answer. The received data is checked and collected
//! completely and only committed to the zone store once the transfer has
//! finished successfully.
//!
//! Which transfer to use is decided by [`negotiate`] based on the serials
//! of both sides, following the rules of [RFC 1982] serial number
//! arithmetic.
//!
//! [RFC 1982]: https://tools.ietf.org/html/rfc1982
//! [RFC 1995]: https://tools.ietf.org/html/rfc1995
//! [RFC 5936]: https://tools.ietf.org/html/rfc5936

mod batcher;
mod consumer;
mod error;
mod negotiate;
mod producer;
mod request;
mod types;

pub use self::consumer::{SessionGuard, SessionRegistry, XfrConsumer};
pub use self::error::{ProtocolViolation, XfrError, XfrErrorKind, XfrStage};
pub use self::negotiate::{
    negotiate, plan_transfer, Negotiation, SerialPolicyFallback,
};
pub use self::producer::{AnswerPlan, XfrProducer};
pub use self::request::{RequestError, XfrRequest};
pub use self::types::{
    ProducerStats, TransferOutcome, TransferPlan, XfrConfig, XfrType,
};
