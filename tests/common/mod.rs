//! Common test helpers and utilities shared across test suite.

#![allow(dead_code)]

use marcflow::{Leader, MarcHandler};

const FT: u8 = 0x1E;
const RT: u8 = 0x1D;

/// Assemble an ISO 2709 record from raw field bodies (without terminators).
///
/// `leader_tail` covers leader positions 05-11; record length and base address
/// are computed, and positions 17-23 are `" a 4500"`.
pub fn build_record(leader_tail: &str, fields: &[(&str, &[u8])]) -> Vec<u8> {
    let mut directory = Vec::new();
    let mut data = Vec::new();
    for (tag, bytes) in fields {
        directory.extend_from_slice(
            format!("{tag}{:04}{:05}", bytes.len() + 1, data.len()).as_bytes(),
        );
        data.extend_from_slice(bytes);
        data.push(FT);
    }
    directory.push(FT);
    let base = 24 + directory.len();
    let total = base + data.len() + 1;

    let mut record = format!("{total:05}{leader_tail}{base:05} a 4500").into_bytes();
    record.extend(directory);
    record.extend(data);
    record.push(RT);
    record
}

/// A small bibliographic record in ASCII.
pub fn book_record(control_number: &str, title: &str) -> Vec<u8> {
    let title_field = format!("10\x1fa{title}\x1fcby Someone.");
    build_record(
        "nam a22",
        &[
            ("001", control_number.as_bytes()),
            ("008", b"830308s1983    nyu           000 1 eng  "),
            ("245", title_field.as_bytes()),
        ],
    )
}

/// Create a default leader for test records.
pub fn create_test_leader() -> Leader {
    Leader::unmarshal("00000cam a2200000 a 4500").expect("valid leader")
}

/// Handler that records every event as a line of text.
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<String>,
}

impl MarcHandler for EventLog {
    fn start_collection(&mut self) {
        self.events.push("start_collection".to_string());
    }

    fn start_record(&mut self, leader: &Leader) {
        self.events.push(format!("start_record {}", leader.record_status));
    }

    fn control_field(&mut self, tag: &str, data: &str, _id: Option<u64>) {
        self.events.push(format!("control_field {tag} {data}"));
    }

    fn start_data_field(
        &mut self,
        tag: &str,
        indicator1: char,
        indicator2: char,
        _id: Option<u64>,
    ) {
        self.events.push(format!("start_data_field {tag} {indicator1}{indicator2}"));
    }

    fn subfield(&mut self, code: char, data: &str, _link_code: Option<&str>) {
        self.events.push(format!("subfield {code} {data}"));
    }

    fn end_data_field(&mut self, tag: &str) {
        self.events.push(format!("end_data_field {tag}"));
    }

    fn end_record(&mut self) {
        self.events.push("end_record".to_string());
    }

    fn end_collection(&mut self) {
        self.events.push("end_collection".to_string());
    }
}
