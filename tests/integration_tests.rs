//! Integration tests for the marcflow library

mod common;

use common::{book_record, build_record, create_test_leader, EventLog};
use marcflow::{
    CollectingSink, DataField, DiagnosticKind, DiagnosticPolicy, Marc8Converter, MarcError,
    MarcReader, MarcWriter, MarcXmlWriter, NormalizingHandler, Record, RecordCollector,
    RecordOutcome, Severity, TaggedWriter, TextEncoding,
};
use std::io::Cursor;
use unicode_normalization::UnicodeNormalization;

fn stream(records: &[Vec<u8>]) -> Vec<u8> {
    records.concat()
}

#[test]
fn test_event_order_for_single_record() {
    let mut reader = MarcReader::new(Cursor::new(book_record("ocm1", "Summerland /")));
    let mut log = EventLog::default();
    let summary = reader.parse(&mut log).expect("decode succeeds");

    assert_eq!(summary.records, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(
        log.events,
        vec![
            "start_collection",
            "start_record n",
            "control_field 001 ocm1",
            "control_field 008 830308s1983    nyu           000 1 eng  ",
            "start_data_field 245 10",
            "subfield a Summerland /",
            "subfield c by Someone.",
            "end_data_field 245",
            "end_record",
            "end_collection",
        ]
    );
}

#[test]
fn test_blank_first_indicator_end_to_end() {
    let bytes = build_record("nam a22", &[("001", b"123"), ("245", b" 0\x1faTitle")]);
    let mut reader = MarcReader::new(Cursor::new(bytes.clone()));
    let mut log = EventLog::default();
    reader.parse(&mut log).unwrap();

    assert_eq!(
        log.events,
        vec![
            "start_collection",
            "start_record n",
            "control_field 001 123",
            "start_data_field 245  0",
            "subfield a Title",
            "end_data_field 245",
            "end_record",
            "end_collection",
        ]
    );

    let record = MarcReader::new(Cursor::new(bytes)).read_record().unwrap().unwrap();
    let field = record.get_field("245").unwrap();
    assert_eq!((field.indicator1(), field.indicator2()), (' ', '0'));
    assert_eq!(field.subfields().len(), 1);
    assert_eq!(field.get_subfield('a'), Some("Title"));
}

#[test]
fn test_empty_stream_still_brackets_collection() {
    let mut reader = MarcReader::new(Cursor::new(Vec::new()));
    let mut log = EventLog::default();
    let summary = reader.parse(&mut log).unwrap();
    assert_eq!(summary.records, 0);
    assert_eq!(log.events, vec!["start_collection", "end_collection"]);
}

#[test]
fn test_multiple_records_in_order() {
    let bytes = stream(&[
        book_record("ocm1", "First"),
        book_record("ocm2", "Second"),
        book_record("ocm3", "Third"),
    ]);
    let mut reader = MarcReader::new(Cursor::new(bytes));
    let mut collector = RecordCollector::new();
    reader.parse(&mut collector).unwrap();

    let ids: Vec<_> = collector
        .records()
        .iter()
        .map(|r| r.control_number().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["ocm1", "ocm2", "ocm3"]);
    assert_eq!(reader.records_read(), 3);
}

#[test]
fn test_bad_record_is_skipped_and_stream_continues() {
    let first = book_record("ocm1", "First");
    let bad = build_record(
        "nam a22",
        &[
            ("001", b"ocm2"),
            ("008", b"830308s1983    nyu           000 1 eng  "),
            ("2X5", b"10\x1faBroken"),
        ],
    );
    let third = book_record("ocm3", "Third");
    let bytes = stream(&[first.clone(), bad, third]);

    let mut reader = MarcReader::new(Cursor::new(bytes)).with_sink(CollectingSink::new());
    let mut log = EventLog::default();
    let summary = reader.parse(&mut log).unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors, 1);

    // Nothing of the skipped record reaches the handler.
    assert!(!log.events.iter().any(|e| e.contains("ocm2")));
    assert_eq!(log.events.iter().filter(|e| e.starts_with("start_record")).count(), 2);

    let sink = reader.sink();
    let tag_errors: Vec<_> = sink.of_kind(DiagnosticKind::IllegalTag).collect();
    assert_eq!(tag_errors.len(), 1);
    let d = tag_errors[0];
    assert_eq!(d.severity, Severity::Error);
    assert_eq!(d.record_id.as_deref(), Some("ocm2"));
    assert_eq!(d.tag.as_deref(), Some("2X5"));
    // leader + directory (3 entries) + terminator = 61, then 001 and 008 bodies.
    assert_eq!(d.position, first.len() as u64 + 61 + 46);
}

#[test]
fn test_decode_next_reports_each_outcome() {
    let bad = build_record("nam a22", &[("245", b"1")]);
    let bytes = stream(&[book_record("ocm1", "A"), bad, book_record("ocm3", "C")]);
    let mut reader = MarcReader::new(Cursor::new(bytes));
    let mut log = EventLog::default();

    let mut outcomes = Vec::new();
    while let Some(outcome) = reader.decode_next(&mut log).unwrap() {
        outcomes.push(outcome);
    }
    assert_eq!(
        outcomes,
        vec![RecordOutcome::Emitted, RecordOutcome::Skipped, RecordOutcome::Emitted]
    );
    assert_eq!(reader.records_skipped(), 1);
    assert!(!log.events.contains(&"start_collection".to_string()));
}

#[test]
fn test_fatal_severity_stops_the_stream() {
    let bad = build_record("nam a22", &[("001", b"ocm2"), ("2X5", b"10\x1faBroken")]);
    let bytes = stream(&[book_record("ocm1", "First"), bad, book_record("ocm3", "Third")]);

    let policy = DiagnosticPolicy::new().with_severity(DiagnosticKind::IllegalTag, Severity::Fatal);
    let mut reader = MarcReader::new(Cursor::new(bytes))
        .with_policy(policy)
        .with_sink(CollectingSink::new());
    let mut log = EventLog::default();

    match reader.parse(&mut log) {
        Err(MarcError::Fatal(d)) => {
            assert_eq!(d.kind, DiagnosticKind::IllegalTag);
            assert_eq!(d.record_id.as_deref(), Some("ocm2"));
        },
        other => panic!("expected a fatal error, got {other:?}"),
    }

    assert_eq!(log.events.iter().filter(|e| *e == "end_record").count(), 1);
    assert!(!log.events.contains(&"end_collection".to_string()));
    assert_eq!(reader.sink().count(Severity::Fatal), 1);
}

#[test]
fn test_truncated_final_record() {
    let mut cut = book_record("ocm2", "Second");
    cut.truncate(cut.len() - 10);
    let bytes = stream(&[book_record("ocm1", "First"), cut]);

    let mut reader = MarcReader::new(Cursor::new(bytes)).with_sink(CollectingSink::new());
    let mut collector = RecordCollector::new();
    let summary = reader.parse(&mut collector).unwrap();

    assert_eq!(summary.records, 1);
    assert_eq!(summary.skipped, 1);
    let sink = reader.sink();
    assert_eq!(sink.of_kind(DiagnosticKind::TruncatedRecord).count(), 1);
    assert_eq!(sink.of_kind(DiagnosticKind::DirectoryOverrun).count(), 1);
}

#[test]
fn test_writer_output_reads_back() {
    let mut record = Record::new(create_test_leader());
    record.add_control_field(marcflow::ControlField::new("001", "rt-1").unwrap());
    record.add_data_field(
        DataField::new("100", '1', ' ')
            .unwrap()
            .with_subfield('a', "Chabon, Michael.")
            .unwrap(),
    );
    record.add_data_field(
        DataField::new("245", '1', '0')
            .unwrap()
            .with_subfield('a', "Summerland /")
            .unwrap()
            .with_subfield('c', "Michael Chabon.")
            .unwrap(),
    );

    let mut writer = MarcWriter::new(Vec::new());
    writer.write_record(&record).unwrap();
    let bytes = writer.into_inner().unwrap();

    let mut reader = MarcReader::new(Cursor::new(bytes))
        .with_leader_encoding()
        .with_sink(CollectingSink::new());
    let back = reader.read_record().unwrap().unwrap();

    assert!(reader.sink().is_empty());
    assert_eq!(back.control_fields(), record.control_fields());
    assert_eq!(back.data_fields(), record.data_fields());
    assert_eq!(back.leader.type_of_record, 'a');
    assert_eq!(back.leader.char_coding_scheme, 'a');
}

#[test]
fn test_marc8_writer_output_reads_back_decomposed() {
    let title = "Dvořák in Łódź";
    let record = Record::builder(create_test_leader())
        .data_field(DataField::new("245", '0', '0').unwrap().with_subfield('a', title).unwrap())
        .build();

    let mut writer = MarcWriter::new(Vec::new()).with_encoding(TextEncoding::Marc8);
    writer.write_record(&record).unwrap();
    let bytes = writer.into_inner().unwrap();

    let mut reader = MarcReader::new(Cursor::new(bytes))
        .with_leader_encoding()
        .with_sink(CollectingSink::new());
    let back = reader.read_record().unwrap().unwrap();

    assert!(reader.sink().is_empty());
    let expected: String = title.nfd().collect();
    assert_eq!(back.get_field("245").unwrap().get_subfield('a'), Some(expected.as_str()));
}

#[test]
fn test_unmappable_marc8_byte_is_one_warning() {
    // 0xBB has no assignment in ANSEL.
    let bytes = build_record("nam  22", &[("001", b"ocm9"), ("245", b"00\x1faA\xBBB")]);
    let mut reader = MarcReader::new(Cursor::new(bytes))
        .with_converter(Box::new(Marc8Converter::new()))
        .with_sink(CollectingSink::new());
    let record = reader.read_record().unwrap().unwrap();

    assert_eq!(record.get_field("245").unwrap().get_subfield('a'), Some("A\u{BB}B"));
    let sink = reader.sink();
    assert_eq!(sink.diagnostics.len(), 1);
    let d = &sink.diagnostics[0];
    assert_eq!(d.kind, DiagnosticKind::UnmappableCharacter);
    assert_eq!(d.severity, Severity::Warning);
    assert_eq!(d.record_id.as_deref(), Some("ocm9"));
}

#[test]
fn test_decoded_stream_as_marcxml() {
    let bytes = stream(&[book_record("ocm1", "Fish & chips"), book_record("ocm2", "Second")]);
    let mut reader = MarcReader::new(Cursor::new(bytes));
    let mut xml = MarcXmlWriter::new(Vec::new());
    reader.parse(&mut xml).unwrap();
    assert_eq!(xml.records_written(), 2);

    let text = String::from_utf8(xml.finish().unwrap()).unwrap();
    assert!(text.contains(r#"<collection xmlns="http://www.loc.gov/MARC21/slim">"#));
    assert!(text.contains(r#"<controlfield tag="001">ocm2</controlfield>"#));
    assert!(text.contains(r#"<subfield code="a">Fish &amp; chips</subfield>"#));
    assert!(text.trim_end().ends_with("</collection>"));
}

#[test]
fn test_stray_escape_does_not_reach_marcxml() {
    let bytes = build_record("nam  22", &[("001", b"ocm1"), ("245", b"10\x1faA\x1bZ")]);
    let mut reader = MarcReader::new(Cursor::new(bytes))
        .with_converter(Box::new(Marc8Converter::new()))
        .with_sink(CollectingSink::new());
    let mut xml = MarcXmlWriter::new(Vec::new());
    reader.parse(&mut xml).unwrap();
    assert_eq!(reader.sink().of_kind(DiagnosticKind::MalformedEscapeSequence).count(), 1);
    assert_eq!(xml.replaced_characters(), 1);

    let bytes = xml.finish().unwrap();
    assert!(!bytes.contains(&0x1B));
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("<subfield code=\"a\">A\u{FFFD}Z</subfield>"));
}

#[test]
fn test_lost_record_terminator_keeps_following_record() {
    let mut first = book_record("ocm1", "First");
    first.pop();
    let bytes = stream(&[first, book_record("ocm2", "Second"), book_record("ocm3", "Third")]);
    let mut reader = MarcReader::new(Cursor::new(bytes)).with_sink(CollectingSink::new());
    let mut collector = RecordCollector::new();
    let summary = reader.parse(&mut collector).unwrap();

    assert_eq!(summary.records, 3);
    assert_eq!(summary.warnings, 1);
    let ids: Vec<_> = collector.records().iter().map(Record::control_number).collect();
    assert_eq!(ids, [Some("ocm1"), Some("ocm2"), Some("ocm3")]);
    let sink = reader.into_sink();
    assert_eq!(sink.diagnostics[0].kind, DiagnosticKind::RecordLengthMismatch);
}

#[test]
fn test_decoded_stream_as_tagged_text() {
    let mut reader = MarcReader::new(Cursor::new(book_record("ocm1", "Summerland /")));
    let mut tagged = TaggedWriter::new(Vec::new());
    reader.parse(&mut tagged).unwrap();
    let text = String::from_utf8(tagged.finish().unwrap()).unwrap();

    let lines: Vec<_> = text.lines().collect();
    assert!(lines[0].starts_with("Leader "));
    assert_eq!(lines[1], "001 ocm1");
    assert_eq!(lines[3], "245 10$aSummerland /$cby Someone.");
    assert_eq!(lines[4], "");
}

#[test]
fn test_normalizing_handler_in_pipeline() {
    let bytes = build_record("n?X a22", &[("001", b"ocm1"), ("245", b"A#\x1faTitle")]);
    let mut reader = MarcReader::new(Cursor::new(bytes));
    let mut handler = NormalizingHandler::new(RecordCollector::new()).with_indicators(true);
    reader.parse(&mut handler).unwrap();

    let records = handler.into_inner().into_records();
    let record = &records[0];
    assert_eq!(record.leader.type_of_record, 'a');
    assert_eq!(record.leader.bibliographic_level(), 'm');
    let field = record.get_field("245").unwrap();
    assert_eq!((field.indicator1(), field.indicator2()), ('a', ' '));
}
