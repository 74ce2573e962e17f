//! Transfers between a primary and a secondary store.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::str::FromStr;

use rstest::rstest;

use domain_xfr::base::iana::{Class, Rcode, Rtype};
use domain_xfr::base::message::{
    read_framed, write_framed, MessageReader, Section,
};
use domain_xfr::base::name::Name;
use domain_xfr::base::record::{Record, RecordData, Soa, UnknownData};
use domain_xfr::base::serial::Serial;
use domain_xfr::stream::{
    BufferedReader, BufferedWriter, MemoryReader, MemoryWriter, StreamError,
    WriteStream,
};
#[cfg(feature = "zlib")]
use domain_xfr::stream::{ZlibReader, ZlibWriter};
use domain_xfr::xfr::{
    plan_transfer, ProtocolViolation, TransferOutcome, TransferPlan,
    XfrConfig, XfrConsumer, XfrErrorKind, XfrProducer, XfrRequest, XfrStage,
    XfrType,
};
use domain_xfr::zonetree::{InMemoryZoneStore, ZoneDiff, ZoneStore};

//------------ Helpers -------------------------------------------------------

fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

fn origin() -> Name {
    name("example.")
}

fn soa(serial: u32) -> Record {
    Record::new(
        origin(),
        Class::IN,
        3600,
        Soa::new(
            name("ns1.example."),
            name("hostmaster.example."),
            Serial(serial),
            7200,
            3600,
            1209600,
            300,
        )
        .into(),
    )
}

fn a(owner: &str, addr: [u8; 4]) -> Record {
    Record::new(name(owner), Class::IN, 300, Ipv4Addr::from(addr).into())
}

fn ns(target: &str) -> Record {
    Record::new(origin(), Class::IN, 3600, RecordData::Ns(name(target)))
}

/// A zone with a bit of everything.
fn zone_content() -> Vec<Record> {
    let mut records = vec![
        ns("ns1.example."),
        ns("ns2.example."),
        a("ns1.example.", [192, 0, 2, 1]),
        a("ns2.example.", [192, 0, 2, 2]),
        Record::new(
            origin(),
            Class::IN,
            3600,
            RecordData::Mx {
                preference: 10,
                exchange: name("mail.example."),
            },
        ),
        Record::new(
            name("sig.example."),
            Class::IN,
            3600,
            RecordData::Unknown(
                UnknownData::new(Rtype::from_int(46), vec![7u8; 120])
                    .unwrap(),
            ),
        ),
    ];
    for i in 0..100 {
        records.push(a(&format!("host{i}.example."), [198, 51, 100, i]));
    }
    records
}

fn empty_store() -> InMemoryZoneStore {
    let store = InMemoryZoneStore::default();
    store.add_zone(origin()).unwrap();
    store
}

/// The primary of the end-to-end scenario.
///
/// It is at serial 10 and has the diffs from 8 via 9.
fn primary() -> InMemoryZoneStore {
    let store = empty_store();
    store.commit_full(&origin(), soa(8), vec![]).unwrap();
    let mut first = ZoneDiff::new(soa(8), soa(9)).unwrap();
    first.push_added(a("a.example.", [1, 2, 3, 4]));
    store.commit_delta(&origin(), Serial(8), vec![first]).unwrap();
    let mut second = ZoneDiff::new(soa(9), soa(10)).unwrap();
    second.push_removed(a("a.example.", [1, 2, 3, 4]));
    second.push_added(a("a.example.", [5, 6, 7, 8]));
    store.commit_delta(&origin(), Serial(9), vec![second]).unwrap();
    store
}

fn secondary_at(serial: u32) -> InMemoryZoneStore {
    let store = empty_store();
    store.commit_full(&origin(), soa(serial), vec![]).unwrap();
    store
}

/// Runs a request through a producer and returns the written answer.
fn produce(
    store: &InMemoryZoneStore,
    config: XfrConfig,
    request: &XfrRequest,
) -> MemoryWriter {
    let mut out = MemoryWriter::new();
    XfrProducer::new(store, config)
        .serve(request, &mut out)
        .unwrap();
    out
}

/// Returns all answer records of a written answer.
fn answer_records(out: &MemoryWriter) -> Vec<Record> {
    let mut input = MemoryReader::new(out.as_slice().to_vec());
    let mut res = Vec::new();
    while let Some(message) = read_framed(&mut input).unwrap() {
        let mut reader = MessageReader::new(message).unwrap();
        reader.read_questions().unwrap();
        while let Some((section, record)) = reader.next_record().unwrap() {
            assert_eq!(section, Section::Answer);
            res.push(record);
        }
    }
    res
}

/// Splits a written answer into its messages.
fn messages(out: MemoryWriter) -> Vec<Vec<u8>> {
    let mut input = MemoryReader::new(out.into_bytes());
    let mut res = Vec::new();
    while let Some(message) = read_framed(&mut input).unwrap() {
        res.push(message.to_vec());
    }
    res
}

/// Frames messages into a stream to read from.
fn framed(messages: &[Vec<u8>]) -> MemoryReader {
    let mut out = MemoryWriter::new();
    for message in messages {
        write_framed(&mut out, message).unwrap();
    }
    MemoryReader::new(out.into_bytes())
}

fn zone_set(store: &InMemoryZoneStore) -> HashSet<Record> {
    let version = store.current_soa(&origin()).unwrap();
    store.enumerate(&origin(), version.token).unwrap().collect()
}

//------------ Tests ---------------------------------------------------------

#[rstest]
#[case(10, 10, true, TransferPlan::UpToDate)]
#[case(8, 10, true, TransferPlan::Ixfr)]
#[case(8, 10, false, TransferPlan::Axfr)]
#[case(10, 8, true, TransferPlan::Axfr)]
#[case(0xFFFF_FFFF, 1, true, TransferPlan::Ixfr)]
#[case(0, 0x8000_0000, true, TransferPlan::Axfr)]
fn negotiation(
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
fn incremental_end_to_end() {
    let primary = primary();
    let secondary = secondary_at(8);
    let consumer = XfrConsumer::new(&secondary, XfrConfig::default());

    let request = consumer
        .request(&origin(), 42, Some(Serial(10)))
        .unwrap()
        .unwrap();
    assert_eq!(request.xfr_type, XfrType::Ixfr);

    let producer = XfrProducer::new(&primary, XfrConfig::default());
    assert_eq!(
        producer.plan(&request).unwrap().negotiation.plan,
        TransferPlan::Ixfr
    );

    // The request goes over the wire, too.
    let mut wire = MemoryWriter::new();
    request.write(&mut wire).unwrap();
    let received =
        XfrRequest::read(&mut MemoryReader::new(wire.into_bytes()))
            .unwrap()
            .unwrap();
    assert_eq!(received.client_serial(), Some(Serial(8)));

    let out = produce(&primary, XfrConfig::default(), &received);
    assert_eq!(
        answer_records(&out),
        vec![
            soa(8),
            soa(9),
            a("a.example.", [1, 2, 3, 4]),
            soa(9),
            a("a.example.", [1, 2, 3, 4]),
            soa(10),
            a("a.example.", [5, 6, 7, 8]),
            soa(10),
        ]
    );

    let outcome = consumer
        .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
        .unwrap();
    assert!(matches!(
        outcome,
        TransferOutcome::Committed {
            serial: Serial(10),
            kind: XfrType::Ixfr,
            records: 8,
            ..
        }
    ));
    let current = secondary.current_soa(&origin()).unwrap();
    assert_eq!(current.serial, Serial(10));
    let a_records: Vec<_> = zone_set(&secondary)
        .into_iter()
        .filter(|record| record.owner() == &name("a.example."))
        .collect();
    assert_eq!(a_records, vec![a("a.example.", [5, 6, 7, 8])]);
}

#[rstest]
#[case(false, false)]
#[case(true, false)]
#[case(false, true)]
#[case(true, true)]
fn framing_options(#[case] closing_soa: bool, #[case] leading_soa: bool) {
    let config = XfrConfig {
        axfr_closing_soa: closing_soa,
        ixfr_leading_soa: leading_soa,
        ..Default::default()
    };
    let primary = primary();

    let secondary = secondary_at(8);
    let request = XfrRequest::ixfr(1, origin(), soa(8));
    let out = produce(&primary, config.clone(), &request);
    let records = answer_records(&out);
    let first = if leading_soa { soa(10) } else { soa(8) };
    assert_eq!(records.first(), Some(&first));
    let outcome = XfrConsumer::new(&secondary, config.clone())
        .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
        .unwrap();
    assert_eq!(outcome.serial(), Serial(10));
    assert_eq!(zone_set(&secondary), zone_set(&primary));

    let secondary = empty_store();
    let request = XfrRequest::axfr(2, origin());
    let out = produce(&primary, config.clone(), &request);
    let records = answer_records(&out);
    assert_eq!(records.len(), if closing_soa { 3 } else { 2 });
    let outcome = XfrConsumer::new(&secondary, config)
        .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
        .unwrap();
    assert!(matches!(
        outcome,
        TransferOutcome::Committed {
            kind: XfrType::Axfr,
            ..
        }
    ));
    assert_eq!(zone_set(&secondary), zone_set(&primary));
}

#[test]
fn axfr_round_trip() {
    let primary = empty_store();
    primary
        .commit_full(&origin(), soa(2024), zone_content())
        .unwrap();
    let secondary = empty_store();
    let config = XfrConfig {
        max_message_size: 512,
        max_records_per_message: 20,
        ..Default::default()
    };

    let request = XfrRequest::axfr(7, origin());
    let mut out = MemoryWriter::new();
    let stats = XfrProducer::new(&primary, config.clone())
        .serve(&request, &mut out)
        .unwrap();
    assert_eq!(stats.plan, TransferPlan::Axfr);
    assert_eq!(stats.records, zone_content().len() + 1);
    assert!(stats.messages > 5);
    assert_eq!(stats.octets, out.len());

    let outcome = XfrConsumer::new(&secondary, config)
        .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
        .unwrap();
    assert_eq!(outcome.serial(), Serial(2024));
    assert_eq!(zone_set(&secondary), zone_set(&primary));
}

#[test]
fn repeated_axfr_is_idempotent() {
    let primary = empty_store();
    primary
        .commit_full(&origin(), soa(5), zone_content())
        .unwrap();
    let secondary = empty_store();
    let consumer = XfrConsumer::new(&secondary, XfrConfig::default());
    let request = XfrRequest::axfr(1, origin());

    let out = produce(&primary, XfrConfig::default(), &request);
    consumer
        .transfer(&request, &mut MemoryReader::new(out.as_slice().to_vec()))
        .unwrap();
    let first = zone_set(&secondary);
    consumer
        .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
        .unwrap();
    assert_eq!(zone_set(&secondary), first);
    assert_eq!(
        secondary.current_soa(&origin()).unwrap().serial,
        Serial(5)
    );
}

#[test]
fn truncated_transfer_keeps_previous_generation() {
    let primary = empty_store();
    primary
        .commit_full(&origin(), soa(5), zone_content())
        .unwrap();
    let secondary = secondary_at(3);
    let before = secondary.current_soa(&origin()).unwrap();

    let request = XfrRequest::axfr(1, origin());
    let out = produce(
        &primary,
        XfrConfig {
            axfr_closing_soa: true,
            ..Default::default()
        },
        &request,
    );
    let mut data = out.as_slice().to_vec();
    data.pop();

    let err = XfrConsumer::new(&secondary, XfrConfig::default())
        .transfer(&request, &mut MemoryReader::new(data))
        .unwrap_err();
    assert_eq!(err.stage, XfrStage::Consume);
    assert!(matches!(err.kind, XfrErrorKind::Stream(_)));
    assert_eq!(secondary.current_soa(&origin()).unwrap(), before);
}

#[test]
fn incomplete_transfer_keeps_previous_generation() {
    let primary = primary();
    let secondary = secondary_at(8);
    let request = XfrRequest::ixfr(1, origin(), soa(8));
    let out = produce(&primary, XfrConfig::default(), &request);

    // Drop the last message which carries the final SOA record.
    let config = XfrConfig {
        max_records_per_message: 1,
        ..Default::default()
    };
    let mut split = MemoryWriter::new();
    XfrProducer::new(&primary, config)
        .serve(&request, &mut split)
        .unwrap();
    assert_eq!(answer_records(&split), answer_records(&out));
    let mut input = MemoryReader::new(split.into_bytes());
    let mut messages = Vec::new();
    while let Some(message) = read_framed(&mut input).unwrap() {
        messages.push(message);
    }
    messages.pop();
    let mut out = MemoryWriter::new();
    for message in &messages {
        write_framed(&mut out, message).unwrap();
    }

    let err = XfrConsumer::new(&secondary, XfrConfig::default())
        .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
        .unwrap_err();
    assert_eq!(err.violation(), Some(&ProtocolViolation::Incomplete));
    assert_eq!(
        secondary.current_soa(&origin()).unwrap().serial,
        Serial(8)
    );
}

#[test]
fn ixfr_cut_between_diffs_is_not_committed() {
    let primary = primary();
    let secondary = secondary_at(8);
    let consumer = XfrConsumer::new(&secondary, XfrConfig::default());
    let request = consumer
        .request(&origin(), 5, Some(Serial(10)))
        .unwrap()
        .unwrap();
    assert_eq!(request.xfr_type, XfrType::Ixfr);
    assert_eq!(request.target_serial, Some(Serial(10)));

    let config = XfrConfig {
        max_records_per_message: 1,
        ..Default::default()
    };
    let mut messages = messages(produce(&primary, config, &request));
    assert_eq!(messages.len(), 8);

    // Ends right after the diff from 8 to 9.
    messages.truncate(4);
    let err = consumer
        .transfer(&request, &mut framed(&messages))
        .unwrap_err();
    assert_eq!(err.stage, XfrStage::Consume);
    assert_eq!(err.violation(), Some(&ProtocolViolation::Incomplete));
    assert_eq!(
        secondary.current_soa(&origin()).unwrap().serial,
        Serial(8)
    );
}

#[test]
fn message_short_of_rdata_is_rejected() {
    let primary = primary();
    let secondary = secondary_at(3);
    let before = secondary.current_soa(&origin()).unwrap();
    let request = XfrRequest::axfr(4, origin());

    // The answer is the SOA and the A record which ends the last message.
    let out = produce(&primary, XfrConfig::default(), &request);
    assert_eq!(
        answer_records(&out).last(),
        Some(&a("a.example.", [5, 6, 7, 8]))
    );
    let mut messages = messages(out);
    if let Some(last) = messages.last_mut() {
        last.pop();
    }

    let err = XfrConsumer::new(&secondary, XfrConfig::default())
        .transfer(&request, &mut framed(&messages))
        .unwrap_err();
    assert_eq!(err.stage, XfrStage::Consume);
    assert!(matches!(
        err.kind,
        XfrErrorKind::Stream(StreamError::Truncated { .. })
    ));
    assert_eq!(secondary.current_soa(&origin()).unwrap(), before);
}

#[rstest]
#[case::secondary_ahead(11, 10)]
#[case::half_serial_space_apart(0, 0x8000_0000)]
fn axfr_fallback_is_committed(#[case] local: u32, #[case] remote: u32) {
    let primary = empty_store();
    primary
        .commit_full(&origin(), soa(remote), zone_content())
        .unwrap();
    let secondary = secondary_at(local);
    let consumer = XfrConsumer::new(&secondary, XfrConfig::default());

    let request = consumer.request(&origin(), 6, None).unwrap().unwrap();
    assert_eq!(request.xfr_type, XfrType::Ixfr);
    assert_eq!(request.client_serial(), Some(Serial(local)));
    assert_eq!(
        XfrProducer::new(&primary, XfrConfig::default())
            .plan(&request)
            .unwrap()
            .negotiation
            .plan,
        TransferPlan::Axfr
    );

    let out = produce(&primary, XfrConfig::default(), &request);
    assert_eq!(answer_records(&out).first(), Some(&soa(remote)));
    let outcome = consumer
        .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
        .unwrap();
    assert!(matches!(
        outcome,
        TransferOutcome::Committed {
            kind: XfrType::Axfr,
            ..
        }
    ));
    assert_eq!(outcome.serial(), Serial(remote));
    assert_eq!(
        secondary.current_soa(&origin()).unwrap().serial,
        Serial(remote)
    );
    assert_eq!(zone_set(&secondary), zone_set(&primary));
}

#[test]
fn up_to_date_secondary() {
    let primary = primary();
    let secondary = secondary_at(10);
    let consumer = XfrConsumer::new(&secondary, XfrConfig::default());
    assert!(consumer
        .request(&origin(), 1, Some(Serial(10)))
        .unwrap()
        .is_none());

    // Asked anyway, the primary answers with its SOA record only.
    let request = consumer.request(&origin(), 1, None).unwrap().unwrap();
    let out = produce(&primary, XfrConfig::default(), &request);
    assert_eq!(answer_records(&out), vec![soa(10)]);
    let before = secondary.current_soa(&origin()).unwrap();
    let outcome = consumer
        .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
        .unwrap();
    assert_eq!(outcome, TransferOutcome::UpToDate { serial: Serial(10) });
    assert_eq!(secondary.current_soa(&origin()).unwrap(), before);
}

#[test]
fn missing_history_falls_back_to_axfr() {
    let primary = primary();
    let secondary = secondary_at(7);
    let request = XfrRequest::ixfr(1, origin(), soa(7));
    let out = produce(&primary, XfrConfig::default(), &request);
    assert_eq!(answer_records(&out).first(), Some(&soa(10)));
    let outcome = XfrConsumer::new(&secondary, XfrConfig::default())
        .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
        .unwrap();
    assert!(matches!(
        outcome,
        TransferOutcome::Committed {
            serial: Serial(10),
            kind: XfrType::Axfr,
            ..
        }
    ));
    assert_eq!(zone_set(&secondary), zone_set(&primary));
}

#[test]
fn unknown_zone_is_refused() {
    let primary = empty_store();
    let secondary = empty_store();
    let request = XfrRequest::axfr(9, name("example.org."));

    let mut out = MemoryWriter::new();
    let err = XfrProducer::new(&primary, XfrConfig::default())
        .serve(&request, &mut out)
        .unwrap_err();
    assert_eq!(err.stage, XfrStage::Produce);

    let err = XfrConsumer::new(&secondary, XfrConfig::default())
        .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
        .unwrap_err();
    assert_eq!(
        err.violation(),
        Some(&ProtocolViolation::ErrorResponse(Rcode::NOTAUTH))
    );
}

#[test]
fn mismatched_id_is_rejected() {
    let primary = primary();
    let secondary = empty_store();
    let out = produce(
        &primary,
        XfrConfig::default(),
        &XfrRequest::axfr(1, origin()),
    );
    let err = XfrConsumer::new(&secondary, XfrConfig::default())
        .transfer(
            &XfrRequest::axfr(2, origin()),
            &mut MemoryReader::new(out.into_bytes()),
        )
        .unwrap_err();
    assert_eq!(
        err.violation(),
        Some(&ProtocolViolation::IdMismatch {
            expected: 2,
            found: 1
        })
    );
}

#[test]
fn record_limit() {
    let primary = empty_store();
    primary
        .commit_full(&origin(), soa(5), zone_content())
        .unwrap();
    let secondary = empty_store();
    let request = XfrRequest::axfr(1, origin());
    let out = produce(&primary, XfrConfig::default(), &request);
    let err = XfrConsumer::new(
        &secondary,
        XfrConfig {
            max_transfer_records: Some(50),
            ..Default::default()
        },
    )
    .transfer(&request, &mut MemoryReader::new(out.into_bytes()))
    .unwrap_err();
    assert_eq!(
        err.violation(),
        Some(&ProtocolViolation::TooManyRecords { limit: 50 })
    );
    assert!(secondary.current_soa(&origin()).is_err());
}

#[test]
fn buffered_transport() {
    let primary = empty_store();
    primary
        .commit_full(&origin(), soa(11), zone_content())
        .unwrap();
    let secondary = empty_store();
    let request = XfrRequest::axfr(3, origin());

    let mut out = MemoryWriter::new();
    {
        let mut writer = BufferedWriter::with_capacity(64, &mut out);
        XfrProducer::new(&primary, XfrConfig::default())
            .serve(&request, &mut writer)
            .unwrap();
        writer.close().unwrap();
    }
    let mut reader =
        BufferedReader::with_capacity(100, MemoryReader::new(out.into_bytes()));
    XfrConsumer::new(&secondary, XfrConfig::default())
        .transfer(&request, &mut reader)
        .unwrap();
    assert_eq!(zone_set(&secondary), zone_set(&primary));
}

#[cfg(feature = "zlib")]
#[test]
fn compressed_transport() {
    let primary = empty_store();
    primary
        .commit_full(&origin(), soa(11), zone_content())
        .unwrap();
    let secondary = empty_store();
    let request = XfrRequest::axfr(3, origin());

    let mut plain = MemoryWriter::new();
    XfrProducer::new(&primary, XfrConfig::default())
        .serve(&request, &mut plain)
        .unwrap();

    let mut out = MemoryWriter::new();
    {
        let mut writer = ZlibWriter::new(&mut out);
        XfrProducer::new(&primary, XfrConfig::default())
            .serve(&request, &mut writer)
            .unwrap();
        writer.close().unwrap();
    }
    assert!(out.len() < plain.len());

    let mut reader = ZlibReader::new(MemoryReader::new(out.into_bytes()));
    XfrConsumer::new(&secondary, XfrConfig::default())
        .transfer(&request, &mut reader)
        .unwrap();
    assert_eq!(zone_set(&secondary), zone_set(&primary));
}

#[test]
fn concurrent_transfers_are_refused() {
    let secondary = empty_store();
    let consumer = XfrConsumer::new(&secondary, XfrConfig::default());
    let other = XfrConsumer::with_sessions(
        &secondary,
        XfrConfig::default(),
        consumer.sessions().clone(),
    );
    let _session = consumer.sessions().begin(&origin()).unwrap();
    let err = other
        .transfer(
            &XfrRequest::axfr(1, origin()),
            &mut MemoryReader::new(Vec::<u8>::new()),
        )
        .unwrap_err();
    assert!(matches!(err.kind, XfrErrorKind::Busy));
}
