//! Sending transfers.

use std::vec::Vec;

use tracing::{debug, info, warn};

use crate::base::iana::{Opcode, Rcode};
use crate::base::message::{write_framed, Header, MessageBuilder};
use crate::base::name::Name;
use crate::base::serial;
use crate::stream::WriteStream;
use crate::zonetree::{is_contiguous, StoreError, ZoneDiff, ZoneStore, ZoneVersion};

use super::batcher::MessageBatcher;
use super::error::{XfrError, XfrErrorKind, XfrStage};
use super::negotiate::{negotiate, Negotiation};
use super::request::XfrRequest;
use super::types::{ProducerStats, TransferPlan, XfrConfig, XfrType};

//------------ XfrProducer ---------------------------------------------------

/// Answers transfer requests from a zone store.
///
/// The producer takes the current version of the zone when it starts
/// answering and sends exactly that version even if the zone changes while
/// the answer is being written.
#[derive(Debug)]
pub struct XfrProducer<'a, S: ?Sized> {
    store: &'a S,
    config: XfrConfig,
}

impl<'a, S: ZoneStore + ?Sized> XfrProducer<'a, S> {
    pub fn new(store: &'a S, config: XfrConfig) -> Self {
        XfrProducer { store, config }
    }

    pub fn config(&self) -> &XfrConfig {
        &self.config
    }

    /// Decides how to answer a request.
    ///
    /// Diffs are only used if the store has a contiguous chain from the
    /// client’s serial to the current one.
    pub fn plan(&self, request: &XfrRequest) -> Result<AnswerPlan, XfrError> {
        let origin = &request.origin;
        let error = |err: StoreError| {
            XfrError::new(origin.clone(), XfrStage::Produce, err)
        };
        let version = self.store.current_soa(origin).map_err(error)?;

        let client = match (request.xfr_type, request.client_serial()) {
            (XfrType::Ixfr, Some(client)) => client,
            _ => {
                return Ok(AnswerPlan {
                    version,
                    negotiation: Negotiation {
                        plan: TransferPlan::Axfr,
                        fallback: None,
                    },
                    diffs: Vec::new(),
                })
            }
        };

        let diffs = if serial::greater(
            version.serial.into_int(),
            client.into_int(),
        ) {
            self.store
                .delta(origin, client, version.serial)
                .map_err(error)?
                .filter(|diffs| is_contiguous(diffs, client, version.serial))
        } else {
            None
        };
        let negotiation =
            negotiate(Some(client), version.serial, diffs.is_some());
        Ok(AnswerPlan {
            version,
            negotiation,
            diffs: match negotiation.plan {
                TransferPlan::Ixfr => diffs.unwrap_or_default(),
                _ => Vec::new(),
            },
        })
    }

    /// Answers a request.
    ///
    /// The answer is written as a sequence of length-prefixed messages. If
    /// the zone is unknown or has no content, a NOTAUTH response is written
    /// instead and the error is returned. A write error ends the answer
    /// immediately; whatever was written before stays written.
    pub fn serve<W: WriteStream + ?Sized>(
        &self,
        request: &XfrRequest,
        stream: &mut W,
    ) -> Result<ProducerStats, XfrError> {
        let origin = &request.origin;
        let plan = match self.plan(request) {
            Ok(plan) => plan,
            Err(err) => {
                if matches!(
                    err.kind,
                    XfrErrorKind::Storage(
                        StoreError::UnknownZone(_) | StoreError::MissingSoa
                    )
                ) {
                    debug!("{request} refused: zone not available");
                    self.refuse(request, stream, Rcode::NOTAUTH);
                }
                return Err(err);
            }
        };
        plan.negotiation.log(origin);
        info!(
            "Serving {} for zone {} at serial {}",
            plan.negotiation.plan, origin, plan.version.serial
        );

        let mut header = Header::new();
        header.set_id(request.id);
        header.set_qr(true);
        header.set_opcode(Opcode::QUERY);
        header.set_aa(true);
        let mut batcher = MessageBatcher::new(
            stream,
            header,
            request.question(),
            self.config.max_message_size,
            self.config.max_records_per_message,
        );

        let res = self
            .write_answer(&mut batcher, origin, &plan)
            .and_then(|()| batcher.finish());
        match res {
            Ok((messages, records, octets)) => {
                info!(
                    "Sent {} for zone {} at serial {}: {} records in {} \
                     messages",
                    plan.negotiation.plan,
                    origin,
                    plan.version.serial,
                    records,
                    messages
                );
                Ok(ProducerStats {
                    plan: plan.negotiation.plan,
                    serial: plan.version.serial,
                    messages,
                    records,
                    octets,
                })
            }
            Err(err) => {
                warn!("Aborted sending transfer of zone {origin}: {err}");
                Err(XfrError::new(origin.clone(), XfrStage::Produce, err))
            }
        }
    }

    fn write_answer<W: WriteStream + ?Sized>(
        &self,
        batcher: &mut MessageBatcher<W>,
        origin: &Name,
        plan: &AnswerPlan,
    ) -> Result<(), XfrErrorKind> {
        let soa = &plan.version.soa;
        match plan.negotiation.plan {
            TransferPlan::UpToDate => batcher.push(soa),
            TransferPlan::Axfr => {
                // The enumeration starts with the SOA record.
                for record in self.store.enumerate(origin, plan.version.token)?
                {
                    batcher.push(&record)?;
                }
                if self.config.axfr_closing_soa {
                    batcher.push(soa)?;
                }
                Ok(())
            }
            TransferPlan::Ixfr => {
                if self.config.ixfr_leading_soa {
                    batcher.push(soa)?;
                }
                for diff in &plan.diffs {
                    batcher.push(diff.from_soa())?;
                    for record in diff.removed() {
                        batcher.push(record)?;
                    }
                    batcher.push(diff.to_soa())?;
                    for record in diff.added() {
                        batcher.push(record)?;
                    }
                }
                batcher.push(soa)
            }
        }
    }

    /// Writes an error response. Failures are only logged.
    fn refuse<W: WriteStream + ?Sized>(
        &self,
        request: &XfrRequest,
        stream: &mut W,
        rcode: Rcode,
    ) {
        let mut header = Header::new();
        header.set_id(request.id);
        header.set_qr(true);
        header.set_opcode(Opcode::QUERY);
        header.set_rcode(rcode);
        let mut builder = MessageBuilder::new(header);
        let res = builder
            .push_question(&request.question())
            .map_err(XfrErrorKind::from)
            .and_then(|()| {
                write_framed(stream, &builder.finish())?;
                stream.flush()?;
                Ok(())
            });
        if let Err(err) = res {
            warn!("Failed to send {rcode} for {request}: {err}");
        }
    }
}

//------------ AnswerPlan ----------------------------------------------------

/// How a request is going to be answered.
#[derive(Clone, Debug)]
pub struct AnswerPlan {
    /// The version of the zone that will be sent.
    pub version: ZoneVersion,

    pub negotiation: Negotiation,

    /// The diffs to send for an incremental transfer.
    pub diffs: Vec<ZoneDiff>,
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::iana::Class;
    use crate::base::message::{read_framed, MessageReader};
    use crate::base::record::{Record, Soa};
    use crate::base::serial::Serial;
    use crate::logging::init_logging;
    use crate::stream::{MemoryReader, MemoryWriter};
    use crate::xfr::negotiate::SerialPolicyFallback;
    use crate::zonetree::InMemoryZoneStore;
    use core::str::FromStr;
    use std::net::Ipv4Addr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn soa(serial: u32) -> Record {
        Record::new(
            name("example."),
            Class::IN,
            3600,
            Soa::new(
                name("ns.example."),
                name("admin.example."),
                Serial(serial),
                1,
                2,
                3,
                4,
            )
            .into(),
        )
    }

    fn a(addr: [u8; 4]) -> Record {
        Record::new(
            name("a.example."),
            Class::IN,
            300,
            Ipv4Addr::from(addr).into(),
        )
    }

    fn store() -> InMemoryZoneStore {
        init_logging();
        let store = InMemoryZoneStore::default();
        let origin = name("example.");
        store.add_zone(origin.clone()).unwrap();
        store.commit_full(&origin, soa(8), vec![]).unwrap();
        let mut diff = ZoneDiff::new(soa(8), soa(9)).unwrap();
        diff.push_added(a([1, 2, 3, 4]));
        store.commit_delta(&origin, Serial(8), vec![diff]).unwrap();
        store
    }

    fn answer_records(out: MemoryWriter) -> (Vec<Rcode>, Vec<Record>) {
        let mut input = MemoryReader::new(out.into_bytes());
        let mut rcodes = Vec::new();
        let mut records = Vec::new();
        while let Some(message) = read_framed(&mut input).unwrap() {
            let mut reader = MessageReader::new(message).unwrap();
            assert!(reader.header().qr());
            rcodes.push(reader.header().rcode());
            while let Some((_, record)) = reader.next_record().unwrap() {
                records.push(record);
            }
        }
        (rcodes, records)
    }

    #[test]
    fn plans() {
        let store = store();
        let producer = XfrProducer::new(&store, XfrConfig::default());
        let origin = name("example.");

        let plan = producer
            .plan(&XfrRequest::ixfr(1, origin.clone(), soa(8)))
            .unwrap();
        assert_eq!(plan.negotiation.plan, TransferPlan::Ixfr);
        assert_eq!(plan.diffs.len(), 1);

        let plan = producer
            .plan(&XfrRequest::ixfr(1, origin.clone(), soa(9)))
            .unwrap();
        assert_eq!(plan.negotiation.plan, TransferPlan::UpToDate);

        let plan = producer
            .plan(&XfrRequest::ixfr(1, origin.clone(), soa(7)))
            .unwrap();
        assert_eq!(
            plan.negotiation.fallback,
            Some(SerialPolicyFallback::DeltaUnavailable)
        );

        let plan = producer
            .plan(&XfrRequest::ixfr(1, origin.clone(), soa(10)))
            .unwrap();
        assert_eq!(
            plan.negotiation.fallback,
            Some(SerialPolicyFallback::SecondaryNotOlder)
        );

        let plan = producer.plan(&XfrRequest::axfr(1, origin)).unwrap();
        assert_eq!(plan.negotiation.plan, TransferPlan::Axfr);
    }

    #[test]
    fn up_to_date_is_single_soa() {
        let store = store();
        let producer = XfrProducer::new(&store, XfrConfig::default());
        let mut out = MemoryWriter::new();
        let stats = producer
            .serve(&XfrRequest::ixfr(1, name("example."), soa(9)), &mut out)
            .unwrap();
        assert_eq!(stats.plan, TransferPlan::UpToDate);
        assert_eq!(stats.messages, 1);
        assert_eq!(answer_records(out).1, vec![soa(9)]);
    }

    #[test]
    fn axfr_with_closing_soa() {
        let store = store();
        let producer = XfrProducer::new(
            &store,
            XfrConfig {
                axfr_closing_soa: true,
                ..Default::default()
            },
        );
        let mut out = MemoryWriter::new();
        producer
            .serve(&XfrRequest::axfr(1, name("example.")), &mut out)
            .unwrap();
        assert_eq!(
            answer_records(out).1,
            vec![soa(9), a([1, 2, 3, 4]), soa(9)]
        );
    }

    #[test]
    fn ixfr_with_leading_soa() {
        let store = store();
        let producer = XfrProducer::new(
            &store,
            XfrConfig {
                ixfr_leading_soa: true,
                ..Default::default()
            },
        );
        let mut out = MemoryWriter::new();
        producer
            .serve(&XfrRequest::ixfr(1, name("example."), soa(8)), &mut out)
            .unwrap();
        assert_eq!(
            answer_records(out).1,
            vec![soa(9), soa(8), soa(9), a([1, 2, 3, 4]), soa(9)]
        );
    }

    #[test]
    fn unknown_zone_is_notauth() {
        let store = store();
        let producer = XfrProducer::new(&store, XfrConfig::default());
        let mut out = MemoryWriter::new();
        let err = producer
            .serve(&XfrRequest::axfr(1, name("example.org.")), &mut out)
            .unwrap_err();
        assert_eq!(err.stage, XfrStage::Produce);
        assert!(matches!(
            err.kind,
            XfrErrorKind::Storage(StoreError::UnknownZone(_))
        ));
        let (rcodes, records) = answer_records(out);
        assert_eq!(rcodes, vec![Rcode::NOTAUTH]);
        assert!(records.is_empty());
    }
}
