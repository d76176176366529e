#![allow(missing_docs)]
//! Benchmarks for the marcflow decoder and encoder.
//!
//! Inputs are generated in memory so the suite has no fixture files.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use marcflow::{
    CharacterConverter, DataField, Leader, Marc8Converter, MarcReader, MarcWriter,
    MarcXmlWriter, Record, RecordCollector, TextEncoding,
};
use std::io::Cursor;

fn sample_record(n: usize) -> Record {
    Record::builder(Leader::default())
        .control_field("001", &format!("ocm{n:08}"))
        .unwrap()
        .control_field("008", "830308s1983    nyu           000 1 eng  ")
        .unwrap()
        .data_field(
            DataField::new("100", '1', ' ')
                .unwrap()
                .with_subfield('a', "Dvořák, Antonín,")
                .unwrap()
                .with_subfield('d', "1841-1904.")
                .unwrap(),
        )
        .data_field(
            DataField::new("245", '1', '0')
                .unwrap()
                .with_subfield('a', "Symphonie Nr. 9 e-Moll :")
                .unwrap()
                .with_subfield('b', "Aus der neuen Welt /")
                .unwrap()
                .with_subfield('c', "Antonín Dvořák.")
                .unwrap(),
        )
        .data_field(
            DataField::new("650", ' ', '0')
                .unwrap()
                .with_subfield('a', "Symphonies")
                .unwrap()
                .with_subfield('v', "Scores.")
                .unwrap(),
        )
        .build()
}

fn encode_stream(count: usize, encoding: TextEncoding) -> Vec<u8> {
    let mut writer = MarcWriter::new(Vec::new()).with_encoding(encoding);
    for n in 0..count {
        writer.write_record(&sample_record(n)).unwrap();
    }
    writer.into_inner().unwrap()
}

/// Decode 1,000 UTF-8 records into the record model.
fn benchmark_decode_utf8_1k(c: &mut Criterion) {
    let stream = encode_stream(1_000, TextEncoding::Utf8);

    c.bench_function("decode_utf8_1k", |b| {
        b.iter(|| {
            let mut reader = MarcReader::new(Cursor::new(black_box(stream.as_slice())))
                .with_leader_encoding();
            let mut collector = RecordCollector::new();
            reader.parse(&mut collector).unwrap();
            collector.into_records().len()
        });
    });
}

/// Decode 1,000 MARC-8 records, converting every data element.
fn benchmark_decode_marc8_1k(c: &mut Criterion) {
    let stream = encode_stream(1_000, TextEncoding::Marc8);

    c.bench_function("decode_marc8_1k", |b| {
        b.iter(|| {
            let mut reader = MarcReader::new(Cursor::new(black_box(stream.as_slice())))
                .with_converter(Box::new(Marc8Converter::new()));
            let mut collector = RecordCollector::new();
            reader.parse(&mut collector).unwrap();
            collector.into_records().len()
        });
    });
}

/// Convert a single MARC-8 element with marks and an escape sequence.
fn benchmark_marc8_element(c: &mut Criterion) {
    let element = b"Dvo\xE9r\xE2ak, Anton\xE2in : H\x1bb2\x1bsO \xA1\xE2od\xE2z";

    c.bench_function("marc8_convert_element", |b| {
        let mut conv = Marc8Converter::new();
        b.iter(|| conv.convert_bytes(black_box(element)));
    });
}

/// Encode 1,000 records to binary.
fn benchmark_write_1k(c: &mut Criterion) {
    let records: Vec<Record> = (0..1_000).map(sample_record).collect();

    c.bench_function("write_1k_records", |b| {
        b.iter(|| {
            let mut writer = MarcWriter::new(Vec::new());
            for record in &records {
                writer.write_record(black_box(record)).unwrap();
            }
            writer.into_inner().unwrap().len()
        });
    });
}

/// Decode straight to MARCXML.
fn benchmark_decode_to_marcxml_1k(c: &mut Criterion) {
    let stream = encode_stream(1_000, TextEncoding::Utf8);

    c.bench_function("decode_to_marcxml_1k", |b| {
        b.iter(|| {
            let mut reader = MarcReader::new(Cursor::new(black_box(stream.as_slice())))
                .with_leader_encoding();
            let mut xml = MarcXmlWriter::new(Vec::new());
            reader.parse(&mut xml).unwrap();
            xml.finish().unwrap().len()
        });
    });
}

criterion_group!(
    benches,
    benchmark_decode_utf8_1k,
    benchmark_decode_marc8_1k,
    benchmark_marc8_element,
    benchmark_write_1k,
    benchmark_decode_to_marcxml_1k
);
criterion_main!(benches);
