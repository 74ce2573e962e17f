//! Receiving transfers.
//!
//! A transfer answer is a sequence of records framed by SOA records. An
//! AXFR answer starts with the SOA record of the zone followed by all other
//! records and optionally ends with a copy of the SOA record. An IXFR
//! answer consists of one or more diffs, each starting with the SOA record
//! of the older version followed by the removed records, then the SOA
//! record of the newer version followed by the added records. The diffs are
//! followed by the SOA record of the newest version and, following RFC
//! 1995, may also be preceded by it.
//!
//! A primary may answer an IXFR request with a complete zone. The consumer
//! tells the two apart by looking at the serials of the first SOA records.

use core::mem;
use std::collections::HashSet;
use std::sync::Arc;
use std::vec::Vec;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::base::iana::{Opcode, Rcode};
use crate::base::message::{read_framed, MessageReader, Section};
use crate::base::name::Name;
use crate::base::record::Record;
use crate::base::serial::{self, Serial};
use crate::stream::{Counting, ReadStream};
use crate::zonetree::{StoreError, ZoneDiff, ZoneStore};

use super::error::{ProtocolViolation, XfrError, XfrErrorKind, XfrStage};
use super::negotiate::negotiate;
use super::request::XfrRequest;
use super::types::{TransferOutcome, TransferPlan, XfrConfig, XfrType};

//------------ XfrConsumer ---------------------------------------------------

/// Receives transfers into a zone store.
///
/// Received data is collected completely before anything is committed. If
/// the transfer fails for any reason, the zone stays untouched. Only one
/// transfer per zone can be in progress at any time.
#[derive(Debug)]
pub struct XfrConsumer<'a, S: ?Sized> {
    store: &'a S,
    config: XfrConfig,
    sessions: Arc<SessionRegistry>,
}

impl<'a, S: ZoneStore + ?Sized> XfrConsumer<'a, S> {
    pub fn new(store: &'a S, config: XfrConfig) -> Self {
        Self::with_sessions(store, config, Default::default())
    }

    /// Creates a consumer sharing the session registry with others.
    pub fn with_sessions(
        store: &'a S,
        config: XfrConfig,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        XfrConsumer {
            store,
            config,
            sessions,
        }
    }

    pub fn config(&self) -> &XfrConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Creates the request for bringing a zone up to date.
    ///
    /// If the primary’s serial is known, it is used to decide whether a
    /// transfer is necessary at all. Returns `Ok(None)` if it isn’t.
    /// Otherwise an IXFR is requested if there is a local copy of the zone
    /// that is older than the primary’s and an AXFR if there isn’t.
    pub fn request(
        &self,
        origin: &Name,
        id: u16,
        primary: Option<Serial>,
    ) -> Result<Option<XfrRequest>, XfrError> {
        let local = match self.store.current_soa(origin) {
            Ok(version) => Some(version),
            Err(StoreError::MissingSoa) => None,
            Err(err) => {
                return Err(XfrError::new(
                    origin.clone(),
                    XfrStage::Request,
                    err,
                ))
            }
        };
        let plan = match primary {
            Some(primary) => {
                let negotiation = negotiate(
                    local.as_ref().map(|version| version.serial),
                    primary,
                    true,
                );
                negotiation.log(origin);
                negotiation.plan
            }
            None if local.is_some() => TransferPlan::Ixfr,
            None => TransferPlan::Axfr,
        };
        let request = match (plan, local) {
            (TransferPlan::UpToDate, _) => return Ok(None),
            (TransferPlan::Ixfr, Some(local)) => {
                XfrRequest::ixfr(id, origin.clone(), local.soa)
            }
            _ => XfrRequest::axfr(id, origin.clone()),
        };
        Ok(Some(match primary {
            Some(primary) => request.with_target(primary),
            None => request,
        }))
    }

    /// Receives the answer to `request` from `stream` and commits it.
    ///
    /// The answer is read as a sequence of length-prefixed messages until
    /// the transfer is complete or the stream ends.
    pub fn transfer<R: ReadStream + ?Sized>(
        &self,
        request: &XfrRequest,
        stream: &mut R,
    ) -> Result<TransferOutcome, XfrError> {
        let origin = &request.origin;
        let _session = self.sessions.begin(origin).ok_or_else(|| {
            debug!("Refusing {request}: transfer already in progress");
            XfrError::new(origin.clone(), XfrStage::Consume, XfrErrorKind::Busy)
        })?;
        info!("Starting {request}");

        let mut stream = Counting::new(stream);
        let (transfer, records) = match self.receive(request, &mut stream) {
            Ok(res) => res,
            Err(err) => {
                warn!(
                    "Aborted transfer of zone {origin} after {} octets: {err}",
                    stream.count()
                );
                return Err(XfrError::new(
                    origin.clone(),
                    XfrStage::Consume,
                    err,
                ));
            }
        };
        debug!(
            "Received {records} records in {} octets for zone {origin}",
            stream.count()
        );
        self.commit(origin, transfer, records).map_err(|err| {
            warn!("Failed to commit transfer of zone {origin}: {err}");
            XfrError::new(origin.clone(), XfrStage::Commit, err)
        })
    }

    fn receive<R: ReadStream + ?Sized>(
        &self,
        request: &XfrRequest,
        stream: &mut R,
    ) -> Result<(Transfer, usize), XfrErrorKind> {
        let mut processor = RecordProcessor::new(
            request.origin.clone(),
            request.xfr_type,
            request.client_serial(),
            self.config.max_transfer_records,
        )
        .with_target(request.target_serial);
        let mut messages = 0;
        while !processor.is_finished() {
            let message = match read_framed(stream)? {
                Some(message) => message,
                None => break,
            };
            messages += 1;
            let mut reader = MessageReader::new(message)?;
            check_response(request, &reader)?;
            for question in reader.read_questions()? {
                if question.qname() != &request.origin
                    || question.qtype() != request.xfr_type.rtype()
                {
                    return Err(ProtocolViolation::QuestionMismatch.into());
                }
            }
            let mut answers = 0;
            while let Some((section, record)) = reader.next_record()? {
                // Other sections may carry TSIG or OPT records.
                if section == Section::Answer {
                    processor.process_record(record)?;
                    answers += 1;
                }
            }
            trace!("Received message {messages} with {answers} records");
        }
        let records = processor.rr_count();
        Ok((processor.finish()?, records))
    }

    fn commit(
        &self,
        origin: &Name,
        transfer: Transfer,
        records: usize,
    ) -> Result<TransferOutcome, XfrErrorKind> {
        match transfer {
            Transfer::UpToDate(serial) => {
                info!("Zone {origin} is up to date at serial {serial}");
                Ok(TransferOutcome::UpToDate { serial })
            }
            Transfer::Full {
                target,
                soa,
                records: content,
            } => {
                let found = soa_serial(&soa)?;
                if found != target {
                    return Err(ProtocolViolation::UnexpectedSerial {
                        expected: target,
                        found,
                    }
                    .into());
                }
                let token = self.store.commit_full(origin, soa, content)?;
                info!("Committed AXFR of zone {origin} at serial {target}");
                Ok(TransferOutcome::Committed {
                    serial: target,
                    token,
                    kind: XfrType::Axfr,
                    records,
                })
            }
            Transfer::Delta { from, target, diffs } => {
                let found = diffs.last().map(ZoneDiff::to_serial);
                if found != Some(target) {
                    return Err(ProtocolViolation::UnexpectedSerial {
                        expected: target,
                        found: found.unwrap_or(from),
                    }
                    .into());
                }
                let steps = diffs.len();
                let token = self.store.commit_delta(origin, from, diffs)?;
                info!(
                    "Committed IXFR of zone {origin} from serial {from} to \
                     {target} in {steps} steps"
                );
                Ok(TransferOutcome::Committed {
                    serial: target,
                    token,
                    kind: XfrType::Ixfr,
                    records,
                })
            }
        }
    }
}

/// Checks the header of a response message.
fn check_response(
    request: &XfrRequest,
    reader: &MessageReader,
) -> Result<(), ProtocolViolation> {
    let header = reader.header();
    if !header.qr() {
        return Err(ProtocolViolation::NotResponse);
    }
    if header.id() != request.id {
        return Err(ProtocolViolation::IdMismatch {
            expected: request.id,
            found: header.id(),
        });
    }
    if header.opcode() != Opcode::QUERY {
        return Err(ProtocolViolation::BadOpcode(header.opcode()));
    }
    if header.rcode() != Rcode::NOERROR {
        return Err(ProtocolViolation::ErrorResponse(header.rcode()));
    }
    if header.tc() {
        return Err(ProtocolViolation::Truncated);
    }
    Ok(())
}

fn soa_serial(record: &Record) -> Result<Serial, ProtocolViolation> {
    record
        .soa()
        .map(|soa| soa.serial())
        .ok_or(ProtocolViolation::NotSoa(record.rtype()))
}

//------------ Transfer ------------------------------------------------------

/// The complete content of a received transfer.
#[derive(Debug, Eq, PartialEq)]
pub(super) enum Transfer {
    /// The secondary’s version is current.
    UpToDate(Serial),

    /// The complete zone.
    Full {
        target: Serial,
        soa: Record,
        records: Vec<Record>,
    },

    /// The diffs from the secondary’s version to the target.
    Delta {
        from: Serial,
        target: Serial,
        diffs: Vec<ZoneDiff>,
    },
}

//------------ RecordProcessor -----------------------------------------------

/// The state machine interpreting the records of a transfer answer.
#[derive(Debug)]
pub(super) struct RecordProcessor {
    origin: Name,

    /// The type of transfer requested.
    ///
    /// The actual answer can be a full transfer even if IXFR was requested.
    requested: XfrType,

    /// The serial of the secondary’s version for an IXFR request.
    old_serial: Option<Serial>,

    /// The primary’s serial if it was known before the request.
    ///
    /// An IXFR answer without leading SOA record must not end before it.
    expected_target: Option<Serial>,

    max_records: Option<usize>,
    state: State,

    /// The number of records processed so far.
    rr_count: usize,
}

#[derive(Debug)]
enum State {
    /// Nothing has been received yet.
    ExpectFirstSoa,

    /// An IXFR answer started with the primary’s SOA record.
    ///
    /// A second SOA record with the secondary’s serial means it is an
    /// IXFR answer with RFC 1995 framing. Anything else means a full zone.
    ExpectSecondRecord { first: Record, target: Serial },

    /// Collecting the records of a full zone.
    CollectingRecords {
        target: Serial,
        soa: Record,
        records: Vec<Record>,
    },

    /// Inside the diffs of an IXFR answer.
    ExpectRemoveOrAddSoa { ixfr: IxfrProgress, block: Block },

    /// An IXFR answer without leading SOA record may be complete.
    ///
    /// The last diff has been closed by the SOA record of its newer
    /// version. If the answer ends here, that version is the target.
    /// Otherwise the SOA record opens the next diff.
    MaybeFinished { ixfr: IxfrProgress, soa: Record },

    /// The final SOA record has been received.
    Finished(Transfer),

    /// A violation has been found.
    Aborted,
}

#[derive(Debug)]
struct IxfrProgress {
    from: Serial,

    /// The primary’s serial if it was given in a leading SOA record.
    target: Option<Serial>,

    diffs: Vec<ZoneDiff>,
}

#[derive(Debug)]
enum Block {
    /// Records are removed.
    Deleting { from_soa: Record, removed: Vec<Record> },

    /// Records are added.
    Adding(ZoneDiff),
}

impl RecordProcessor {
    pub fn new(
        origin: Name,
        requested: XfrType,
        old_serial: Option<Serial>,
        max_records: Option<usize>,
    ) -> Self {
        RecordProcessor {
            origin,
            requested,
            old_serial,
            expected_target: None,
            max_records,
            state: State::ExpectFirstSoa,
            rr_count: 0,
        }
    }

    pub fn with_target(mut self, target: Option<Serial>) -> Self {
        self.expected_target = target;
        self
    }

    pub fn rr_count(&self) -> usize {
        self.rr_count
    }

    /// Returns whether the final SOA record has been seen.
    ///
    /// If an answer doesn’t have a final SOA record, the transfer is only
    /// known to be complete once the stream ends.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished(_))
    }

    /// Processes the next record of the answer.
    ///
    /// After an error, the processor stays aborted.
    pub fn process_record(
        &mut self,
        record: Record,
    ) -> Result<(), ProtocolViolation> {
        if matches!(self.state, State::Aborted) {
            return Err(ProtocolViolation::Aborted);
        }
        self.rr_count += 1;
        trace!("Processing record {}: {}", self.rr_count, record);
        let state = mem::replace(&mut self.state, State::Aborted);
        self.state = self.step(state, record)?;
        Ok(())
    }

    /// Finishes processing when the answer has ended.
    pub fn finish(self) -> Result<Transfer, ProtocolViolation> {
        match self.state {
            State::Finished(transfer) => Ok(transfer),
            State::CollectingRecords {
                target,
                soa,
                records,
            } => Ok(Transfer::Full {
                target,
                soa,
                records,
            }),
            // A lone newer SOA record is a zone without any other records.
            State::ExpectSecondRecord { first, target } => Ok(Transfer::Full {
                target,
                soa: first,
                records: Vec::new(),
            }),
            State::MaybeFinished { ixfr, soa } => {
                let target = soa_serial(&soa)?;
                // Without a leading SOA record, an answer cut between two
                // diffs looks complete. Only the known serial tells.
                if let Some(expected) = self.expected_target {
                    if target.is_older_than(expected) {
                        return Err(ProtocolViolation::Incomplete);
                    }
                }
                Ok(Transfer::Delta {
                    from: ixfr.from,
                    target,
                    diffs: ixfr.diffs,
                })
            }
            State::ExpectRemoveOrAddSoa {
                ixfr,
                block: Block::Deleting { .. },
            } if self.rr_count == 1 => Ok(Transfer::UpToDate(ixfr.from)),
            State::ExpectFirstSoa | State::ExpectRemoveOrAddSoa { .. } => {
                Err(ProtocolViolation::Incomplete)
            }
            State::Aborted => Err(ProtocolViolation::Aborted),
        }
    }

    fn step(
        &self,
        state: State,
        record: Record,
    ) -> Result<State, ProtocolViolation> {
        if let Some(limit) = self.max_records {
            if self.rr_count > limit {
                return Err(ProtocolViolation::TooManyRecords { limit });
            }
        }
        let serial = self.check_soa(&record)?;
        match state {
            State::ExpectFirstSoa => self.first_record(record, serial),
            State::ExpectSecondRecord { first, target } => {
                match (serial, self.old_serial) {
                    (Some(serial), Some(old)) if serial == old => {
                        Ok(State::ExpectRemoveOrAddSoa {
                            ixfr: IxfrProgress {
                                from: old,
                                target: Some(target),
                                diffs: Vec::new(),
                            },
                            block: Block::Deleting {
                                from_soa: record,
                                removed: Vec::new(),
                            },
                        })
                    }
                    _ => {
                        debug!(
                            "IXFR request for zone {} answered with a full \
                             zone",
                            self.origin
                        );
                        Self::axfr_record(
                            target,
                            first,
                            Vec::new(),
                            record,
                            serial,
                        )
                    }
                }
            }
            State::CollectingRecords {
                target,
                soa,
                records,
            } => Self::axfr_record(target, soa, records, record, serial),
            State::ExpectRemoveOrAddSoa { ixfr, block } => {
                Self::ixfr_record(ixfr, block, record, serial)
            }
            State::MaybeFinished { ixfr, soa } => Self::ixfr_record(
                ixfr,
                Block::Deleting {
                    from_soa: soa,
                    removed: Vec::new(),
                },
                record,
                serial,
            ),
            State::Finished(_) => Err(ProtocolViolation::TrailingRecords),
            State::Aborted => Err(ProtocolViolation::Aborted),
        }
    }

    /// Checks that a SOA record is for the zone and returns its serial.
    ///
    /// Returns `None` for all other records.
    fn check_soa(
        &self,
        record: &Record,
    ) -> Result<Option<Serial>, ProtocolViolation> {
        let soa = match record.soa() {
            Some(soa) => soa,
            None => return Ok(None),
        };
        if record.owner() != &self.origin {
            return Err(ProtocolViolation::WrongOrigin {
                expected: self.origin.clone(),
                found: record.owner().clone(),
            });
        }
        Ok(Some(soa.serial()))
    }

    fn first_record(
        &self,
        record: Record,
        serial: Option<Serial>,
    ) -> Result<State, ProtocolViolation> {
        let serial = serial.ok_or(ProtocolViolation::NotSoa(record.rtype()))?;
        match (self.requested, self.old_serial) {
            // Either the only record of an up-to-date answer or the start
            // of the first diff of an answer without leading SOA.
            (XfrType::Ixfr, Some(old)) if serial == old => {
                Ok(State::ExpectRemoveOrAddSoa {
                    ixfr: IxfrProgress {
                        from: old,
                        target: None,
                        diffs: Vec::new(),
                    },
                    block: Block::Deleting {
                        from_soa: record,
                        removed: Vec::new(),
                    },
                })
            }
            // The primary’s serial. Whether an IXFR or a full zone follows
            // is decided by the second record. A primary that is behind the
            // secondary or exactly half the serial space away from it
            // answers with a full zone.
            (XfrType::Ixfr, Some(_)) => Ok(State::ExpectSecondRecord {
                first: record,
                target: serial,
            }),
            _ => Ok(State::CollectingRecords {
                target: serial,
                soa: record,
                records: Vec::new(),
            }),
        }
    }

    fn axfr_record(
        target: Serial,
        soa: Record,
        mut records: Vec<Record>,
        record: Record,
        serial: Option<Serial>,
    ) -> Result<State, ProtocolViolation> {
        match serial {
            None => {
                records.push(record);
                Ok(State::CollectingRecords {
                    target,
                    soa,
                    records,
                })
            }
            Some(found) if found == target => {
                Ok(State::Finished(Transfer::Full {
                    target,
                    soa,
                    records,
                }))
            }
            Some(found) => Err(ProtocolViolation::UnexpectedSerial {
                expected: target,
                found,
            }),
        }
    }

    fn ixfr_record(
        mut ixfr: IxfrProgress,
        block: Block,
        record: Record,
        serial: Option<Serial>,
    ) -> Result<State, ProtocolViolation> {
        let found = match (block, serial) {
            (Block::Deleting { from_soa, mut removed }, None) => {
                removed.push(record);
                return Ok(State::ExpectRemoveOrAddSoa {
                    ixfr,
                    block: Block::Deleting { from_soa, removed },
                });
            }
            (Block::Adding(mut diff), None) => {
                diff.push_added(record);
                return Ok(State::ExpectRemoveOrAddSoa {
                    ixfr,
                    block: Block::Adding(diff),
                });
            }
            (Block::Deleting { from_soa, removed }, Some(found)) => {
                // The SOA record of the newer version opens the additions.
                let mut diff = ZoneDiff::new(from_soa, record)
                    .map_err(|_| ProtocolViolation::Malformed)?;
                let from = diff.from_serial();
                if !serial::greater_or_equal(found.into_int(), from.into_int())
                {
                    return Err(ProtocolViolation::UnexpectedSerial {
                        expected: from,
                        found,
                    });
                }
                if let Some(target) = ixfr.target {
                    if !serial::less_or_equal(
                        found.into_int(),
                        target.into_int(),
                    ) {
                        return Err(ProtocolViolation::UnexpectedSerial {
                            expected: target,
                            found,
                        });
                    }
                }
                for record in removed {
                    diff.push_removed(record);
                }
                return Ok(State::ExpectRemoveOrAddSoa {
                    ixfr,
                    block: Block::Adding(diff),
                });
            }
            (Block::Adding(diff), Some(found)) => {
                if found != diff.to_serial() {
                    return Err(ProtocolViolation::UnexpectedSerial {
                        expected: diff.to_serial(),
                        found,
                    });
                }
                ixfr.diffs.push(diff);
                found
            }
        };

        // The additions are closed by the SOA record of their version.
        match ixfr.target {
            Some(target) if target == found => {
                Ok(State::Finished(Transfer::Delta {
                    from: ixfr.from,
                    target,
                    diffs: ixfr.diffs,
                }))
            }
            Some(_) => Ok(State::ExpectRemoveOrAddSoa {
                ixfr,
                block: Block::Deleting {
                    from_soa: record,
                    removed: Vec::new(),
                },
            }),
            None => Ok(State::MaybeFinished { ixfr, soa: record }),
        }
    }
}

//------------ SessionRegistry -----------------------------------------------

/// Keeps track of the zones currently being transferred in.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: Mutex<HashSet<Name>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session for a zone.
    ///
    /// Returns `None` if there already is one. The session ends when the
    /// returned guard is dropped.
    pub fn begin(&self, origin: &Name) -> Option<SessionGuard<'_>> {
        if self.active.lock().insert(origin.clone()) {
            Some(SessionGuard {
                registry: self,
                origin: origin.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, origin: &Name) -> bool {
        self.active.lock().contains(origin)
    }
}

//------------ SessionGuard --------------------------------------------------

/// An active transfer session.
#[derive(Debug)]
pub struct SessionGuard<'a> {
    registry: &'a SessionRegistry,
    origin: Name,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.registry.active.lock().remove(&self.origin);
    }
}

//============ Testing =======================================================
