//! MARCXML output for decoded records.
//!
//! [`MarcXmlWriter`] is a [`MarcHandler`] that turns the decoder's events into a
//! MARCXML document as defined by the Library of Congress
//! (<https://www.loc.gov/standards/marcxml/>):
//!
//! ```text
//! collection > record > leader | controlfield[@tag]
//!                      | datafield[@tag,@ind1,@ind2] > subfield[@code]
//! ```
//!
//! Each record is buffered until `end_record` and then serialized with
//! `quick-xml`'s serde support, so `tag`, `ind1`, `ind2` and `code` are XML
//! attributes and all text is escaped. The `<collection>` element carries the
//! `xmlns="http://www.loc.gov/MARC21/slim"` namespace declaration, plus an
//! `xsi:schemaLocation` when one is configured with
//! [`MarcXmlWriter::with_schema_location`].
//!
//! Characters that XML 1.0 does not allow (C0 controls other than tab, line
//! feed and carriage return, and U+FFFE/U+FFFF) are written as U+FFFD. The
//! MARC-8 decoder passes a stray ESC through as-is, so such characters do
//! reach this writer; each replacement is logged and counted.
//!
//! # Examples
//!
//! ```
//! use marcflow::{DataField, Leader, MarcHandler, MarcXmlWriter, Record};
//!
//! # fn main() -> marcflow::Result<()> {
//! let record = Record::builder(Leader::default())
//!     .data_field(DataField::new("245", '1', '0')?.with_subfield('a', "Fish & chips")?)
//!     .build();
//!
//! let mut writer = MarcXmlWriter::new(Vec::new());
//! writer.start_collection();
//! record.replay(&mut writer);
//! writer.end_collection();
//!
//! let xml = String::from_utf8(writer.finish()?).unwrap();
//! assert!(xml.contains(r#"<subfield code="a">Fish &amp; chips</subfield>"#));
//! # Ok(())
//! # }
//! ```

use crate::error::{MarcError, Result};
use crate::handler::MarcHandler;
use crate::leader::Leader;
use crate::record::Record;
use quick_xml::escape::escape;
use quick_xml::se::Serializer;
use serde::Serialize;
use std::borrow::Cow;
use std::io::Write;
use tracing::warn;

/// The MARCXML namespace URI.
pub const MARCXML_NS: &str = "http://www.loc.gov/MARC21/slim";

/// The XML Schema instance namespace URI.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Namespace and schema document pair for the MARC21 slim schema.
pub const MARCXML_SCHEMA_LOCATION: &str =
    "http://www.loc.gov/MARC21/slim http://www.loc.gov/standards/marcxml/schema/MARC21slim.xsd";

const REPLACEMENT: char = '\u{FFFD}';

/// MARCXML record representation for serialization.
#[derive(Debug, Default, Serialize)]
#[serde(rename = "record")]
struct MarcxmlRecord {
    leader: String,
    #[serde(rename = "controlfield")]
    control_fields: Vec<MarcxmlControlField>,
    #[serde(rename = "datafield")]
    data_fields: Vec<MarcxmlDataField>,
}

#[derive(Debug, Serialize)]
struct MarcxmlControlField {
    #[serde(rename = "@tag")]
    tag: String,
    #[serde(rename = "$value")]
    value: String,
}

#[derive(Debug, Serialize)]
struct MarcxmlDataField {
    #[serde(rename = "@tag")]
    tag: String,
    #[serde(rename = "@ind1")]
    ind1: String,
    #[serde(rename = "@ind2")]
    ind2: String,
    #[serde(rename = "subfield")]
    subfields: Vec<MarcxmlSubfield>,
}

#[derive(Debug, Serialize)]
struct MarcxmlSubfield {
    #[serde(rename = "@code")]
    code: String,
    #[serde(rename = "$value")]
    value: String,
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

/// `text` with every character XML 1.0 forbids replaced by U+FFFD, and the
/// number of replacements.
fn xml_text(text: &str) -> (Cow<'_, str>, usize) {
    if text.chars().all(is_xml_char) {
        return (Cow::Borrowed(text), 0);
    }
    let mut replaced = 0;
    let clean = text
        .chars()
        .map(|c| {
            if is_xml_char(c) {
                c
            } else {
                replaced += 1;
                REPLACEMENT
            }
        })
        .collect();
    (Cow::Owned(clean), replaced)
}

/// Serialize one record, indented by two spaces per level when `pretty`.
fn serialize_record(record: &MarcxmlRecord, pretty: bool) -> Result<String> {
    let mut body = String::new();
    let mut ser = Serializer::new(&mut body);
    if pretty {
        ser.indent(' ', 2);
    }
    record.serialize(ser)?;
    Ok(body)
}

/// Leader text for output. Leaders that cannot be marshalled (out-of-range
/// numbers set by hand) fall back to the blank default.
fn leader_text(leader: &Leader) -> String {
    leader
        .marshal()
        .or_else(|_| Leader::default().marshal())
        .unwrap_or_default()
}

/// Streams MARCXML to a writer as events arrive.
///
/// Handler methods cannot return errors; the first I/O or serialization failure
/// is kept, later output is suppressed, and [`finish`](Self::finish) reports it.
#[derive(Debug)]
pub struct MarcXmlWriter<W: Write> {
    out: W,
    schema_location: Option<String>,
    pretty: bool,
    record: Option<MarcxmlRecord>,
    field: Option<MarcxmlDataField>,
    records_written: usize,
    replaced: usize,
    error: Option<MarcError>,
}

impl<W: Write> MarcXmlWriter<W> {
    /// Create a writer on `out`.
    pub fn new(out: W) -> Self {
        MarcXmlWriter {
            out,
            schema_location: None,
            pretty: false,
            record: None,
            field: None,
            records_written: 0,
            replaced: 0,
            error: None,
        }
    }

    /// Declare `xmlns:xsi` and put `location` in `xsi:schemaLocation` on the
    /// `<collection>` element. [`MARCXML_SCHEMA_LOCATION`] names the standard
    /// schema.
    #[must_use]
    pub fn with_schema_location(mut self, location: &str) -> Self {
        self.schema_location = Some(location.to_string());
        self
    }

    /// Put each element on its own line, indented two spaces per level.
    #[must_use]
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Characters replaced with U+FFFD because XML cannot carry them.
    #[must_use]
    pub fn replaced_characters(&self) -> usize {
        self.replaced
    }

    /// Flush and return the destination.
    ///
    /// # Errors
    ///
    /// Returns the first error met while writing.
    pub fn finish(mut self) -> Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn text(&mut self, tag: &str, text: &str) -> String {
        let (clean, replaced) = xml_text(text);
        if replaced > 0 {
            warn!(tag, replaced, "characters not allowed in XML replaced with U+FFFD");
            self.replaced += replaced;
        }
        clean.into_owned()
    }

    fn write_str(&mut self, s: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.out.write_all(s.as_bytes()) {
            self.error = Some(e.into());
        }
    }
}

impl<W: Write> MarcHandler for MarcXmlWriter<W> {
    fn start_collection(&mut self) {
        let mut root = format!("<collection xmlns=\"{MARCXML_NS}\"");
        if let Some(location) = &self.schema_location {
            root.push_str(&format!(
                " xmlns:xsi=\"{XSI_NS}\" xsi:schemaLocation=\"{}\"",
                escape(location.as_str())
            ));
        }
        self.write_str(&format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{root}>\n"));
    }

    fn start_record(&mut self, leader: &Leader) {
        let leader = self.text("leader", &leader_text(leader));
        self.record = Some(MarcxmlRecord {
            leader,
            ..MarcxmlRecord::default()
        });
    }

    fn control_field(&mut self, tag: &str, data: &str, _id: Option<u64>) {
        if self.record.is_none() {
            return;
        }
        let field = MarcxmlControlField {
            tag: self.text(tag, tag),
            value: self.text(tag, data),
        };
        if let Some(record) = self.record.as_mut() {
            record.control_fields.push(field);
        }
    }

    fn start_data_field(
        &mut self,
        tag: &str,
        indicator1: char,
        indicator2: char,
        _id: Option<u64>,
    ) {
        self.field = Some(MarcxmlDataField {
            tag: self.text(tag, tag),
            ind1: self.text(tag, &indicator1.to_string()),
            ind2: self.text(tag, &indicator2.to_string()),
            subfields: Vec::new(),
        });
    }

    fn subfield(&mut self, code: char, data: &str, _link_code: Option<&str>) {
        let Some(tag) = self.field.as_ref().map(|f| f.tag.clone()) else {
            return;
        };
        let subfield = MarcxmlSubfield {
            code: self.text(&tag, &code.to_string()),
            value: self.text(&tag, data),
        };
        if let Some(field) = self.field.as_mut() {
            field.subfields.push(subfield);
        }
    }

    fn end_data_field(&mut self, _tag: &str) {
        if let (Some(record), Some(field)) = (self.record.as_mut(), self.field.take()) {
            record.data_fields.push(field);
        }
    }

    fn end_record(&mut self) {
        let Some(record) = self.record.take() else {
            return;
        };
        match serialize_record(&record, self.pretty) {
            Ok(body) => {
                self.write_str(&body);
                self.write_str("\n");
                self.records_written += 1;
            },
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
            },
        }
    }

    fn end_collection(&mut self) {
        self.write_str("</collection>\n");
    }
}

/// Convert a single record to a standalone MARCXML `<record>` document.
///
/// # Errors
///
/// Returns an error if the record cannot be serialized.
pub fn record_to_marcxml(record: &Record) -> Result<String> {
    let mut writer = MarcXmlWriter::new(Vec::new());
    record.replay(&mut writer);
    let body = writer.finish()?;
    let body = String::from_utf8(body).map_err(|e| {
        MarcError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    })?;
    let body = body.trim_end();
    let body = body.replacen("<record>", &format!("<record xmlns=\"{MARCXML_NS}\">"), 1);
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{body}"))
}
