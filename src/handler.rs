//! Push-style event protocol between the decoder and its consumers.
//!
//! A decoded stream is delivered as a strictly nested sequence of calls:
//!
//! ```text
//! start_collection
//!   { start_record
//!       { control_field | start_data_field { subfield }* end_data_field }*
//!     end_record }*
//! end_collection
//! ```
//!
//! Every method has a no-op default, so a consumer only implements the events it
//! cares about.
//!
//! # Examples
//!
//! ```
//! use marcflow::MarcHandler;
//!
//! #[derive(Default)]
//! struct TitleCounter {
//!     in_title: bool,
//!     titles: usize,
//! }
//!
//! impl MarcHandler for TitleCounter {
//!     fn start_data_field(&mut self, tag: &str, _i1: char, _i2: char, _id: Option<u64>) {
//!         self.in_title = tag == "245";
//!     }
//!
//!     fn subfield(&mut self, code: char, _data: &str, _link: Option<&str>) {
//!         if self.in_title && code == 'a' {
//!             self.titles += 1;
//!         }
//!     }
//! }
//! ```

use crate::leader::Leader;
use crate::record::{ControlField, DataField, Record, Subfield};
use tracing::debug;

/// Receiver of decoder events.
#[allow(unused_variables)]
pub trait MarcHandler {
    /// A stream of records begins.
    fn start_collection(&mut self) {}

    /// A record begins.
    fn start_record(&mut self, leader: &Leader) {}

    /// A control field (001-009).
    fn control_field(&mut self, tag: &str, data: &str, id: Option<u64>) {}

    /// A data field begins.
    fn start_data_field(
        &mut self,
        tag: &str,
        indicator1: char,
        indicator2: char,
        id: Option<u64>,
    ) {
    }

    /// A subfield of the current data field.
    fn subfield(&mut self, code: char, data: &str, link_code: Option<&str>) {}

    /// The current data field ends.
    fn end_data_field(&mut self, tag: &str) {}

    /// The current record ends.
    fn end_record(&mut self) {}

    /// The stream ends.
    fn end_collection(&mut self) {}
}

impl<H: MarcHandler + ?Sized> MarcHandler for &mut H {
    fn start_collection(&mut self) {
        (**self).start_collection();
    }

    fn start_record(&mut self, leader: &Leader) {
        (**self).start_record(leader);
    }

    fn control_field(&mut self, tag: &str, data: &str, id: Option<u64>) {
        (**self).control_field(tag, data, id);
    }

    fn start_data_field(&mut self, tag: &str, indicator1: char, indicator2: char, id: Option<u64>) {
        (**self).start_data_field(tag, indicator1, indicator2, id);
    }

    fn subfield(&mut self, code: char, data: &str, link_code: Option<&str>) {
        (**self).subfield(code, data, link_code);
    }

    fn end_data_field(&mut self, tag: &str) {
        (**self).end_data_field(tag);
    }

    fn end_record(&mut self) {
        (**self).end_record();
    }

    fn end_collection(&mut self) {
        (**self).end_collection();
    }
}

/// Assembles events back into [`Record`] values.
///
/// Events that cannot form a legal model value (an out-of-range tag delivered by
/// a permissive upstream, for instance) are dropped and logged at debug level.
#[derive(Debug, Default)]
pub struct RecordCollector {
    records: Vec<Record>,
    current: Option<Record>,
    field: Option<DataField>,
}

impl RecordCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records completed so far.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Take the completed records, leaving the collector empty.
    pub fn take_records(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }

    /// Consume the collector and return the completed records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl MarcHandler for RecordCollector {
    fn start_record(&mut self, leader: &Leader) {
        self.current = Some(Record::new(leader.clone()));
        self.field = None;
    }

    fn control_field(&mut self, tag: &str, data: &str, id: Option<u64>) {
        let Some(record) = self.current.as_mut() else {
            return;
        };
        match ControlField::new(tag, data) {
            Ok(mut field) => {
                field.set_id(id);
                record.add_control_field(field);
            },
            Err(e) => debug!(tag, error = %e, "dropping control field"),
        }
    }

    fn start_data_field(&mut self, tag: &str, indicator1: char, indicator2: char, id: Option<u64>) {
        match DataField::new(tag, indicator1, indicator2) {
            Ok(mut field) => {
                field.set_id(id);
                self.field = Some(field);
            },
            Err(e) => {
                debug!(tag, error = %e, "dropping data field");
                self.field = None;
            },
        }
    }

    fn subfield(&mut self, code: char, data: &str, link_code: Option<&str>) {
        let Some(field) = self.field.as_mut() else {
            return;
        };
        let subfield = match link_code {
            Some(link) => Subfield::new(code, data).and_then(|sf| sf.with_link_code(link)),
            None => Subfield::new(code, data),
        };
        match subfield {
            Ok(sf) => field.add_subfield(sf),
            Err(e) => debug!(code = %code, error = %e, "dropping subfield"),
        }
    }

    fn end_data_field(&mut self, _tag: &str) {
        if let (Some(record), Some(field)) = (self.current.as_mut(), self.field.take()) {
            record.add_data_field(field);
        }
    }

    fn end_record(&mut self) {
        if let Some(record) = self.current.take() {
            self.records.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        Record::builder(Leader::default())
            .control_field("001", "ocm123")
            .unwrap()
            .data_field(
                DataField::new("245", '1', '0')
                    .unwrap()
                    .with_subfield('a', "Title")
                    .unwrap(),
            )
            .build()
    }

    #[test]
    fn test_collector_rebuilds_replayed_record() {
        let record = sample_record();
        let mut collector = RecordCollector::new();
        collector.start_collection();
        record.replay(&mut collector);
        collector.end_collection();

        assert_eq!(collector.records(), &[record]);
    }

    #[test]
    fn test_collector_drops_illegal_fields() {
        let mut collector = RecordCollector::new();
        collector.start_record(&Leader::default());
        collector.control_field("245", "not a control tag", None);
        collector.start_data_field("XYZ", ' ', ' ', None);
        collector.subfield('a', "orphan", None);
        collector.end_data_field("XYZ");
        collector.end_record();

        let records = collector.into_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_empty());
    }

    #[test]
    fn test_collector_keeps_link_codes_and_ids() {
        let mut collector = RecordCollector::new();
        collector.start_record(&Leader::default());
        collector.start_data_field("880", ' ', ' ', Some(7));
        collector.subfield('6', "245-01", Some("01"));
        collector.end_data_field("880");
        collector.end_record();

        let record = &collector.records()[0];
        let field = record.get_field("880").unwrap();
        assert_eq!(field.id(), Some(7));
        assert_eq!(field.subfields()[0].link_code(), Some("01"));
    }

    #[test]
    fn test_default_methods_are_no_ops() {
        struct Silent;
        impl MarcHandler for Silent {}

        let mut handler = Silent;
        sample_record().replay(&mut handler);
        handler.end_collection();
    }
}
