//! MARC record structures and their structural invariants.
//!
//! This module provides the in-memory model produced by the decoder's events and
//! consumed by the writers:
//! - [`Record`] - a leader plus control fields followed by data fields
//! - [`ControlField`] - fixed fields 001-009, a single data payload
//! - [`DataField`] - variable fields 010-999 with two indicators and [`Subfield`]s
//! - [`VariableField`] - either of the two field kinds
//!
//! Every setter validates its input: tags must be legal for the field kind and no
//! payload may contain the record terminator, field terminator or subfield
//! delimiter.
//!
//! # Examples
//!
//! ```
//! use marcflow::{ControlField, DataField, Leader, Record};
//!
//! # fn main() -> marcflow::Result<()> {
//! let mut record = Record::new(Leader::default());
//! record.add_control_field(ControlField::new("001", "123")?);
//! record.add_data_field(
//!     DataField::new("245", '1', '0')?
//!         .with_subfield('a', "Title")?
//!         .with_subfield('c', "Author")?,
//! );
//!
//! assert_eq!(record.control_number(), Some("123"));
//! assert_eq!(record.get_field("245").and_then(|f| f.get_subfield('a')), Some("Title"));
//! # Ok(())
//! # }
//! ```

use crate::error::{MarcError, Result};
use crate::handler::MarcHandler;
use crate::leader::Leader;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Record terminator (ASCII GS).
pub const RECORD_TERMINATOR: u8 = 0x1D;
/// Field terminator (ASCII RS).
pub const FIELD_TERMINATOR: u8 = 0x1E;
/// Subfield delimiter (ASCII US).
pub const SUBFIELD_DELIMITER: u8 = 0x1F;

/// Returns `true` for the three structural control codes.
#[must_use]
pub fn is_structural_code(c: char) -> bool {
    matches!(u32::from(c), 0x1D..=0x1F)
}

/// Check that a payload contains none of the structural control codes.
///
/// # Errors
///
/// Returns `MarcError::IllegalDataElement` naming the first offending character.
pub fn check_data_element(data: &str) -> Result<()> {
    match data.char_indices().find(|(_, c)| is_structural_code(*c)) {
        Some((pos, c)) => Err(MarcError::IllegalDataElement(format!(
            "reserved control code 0x{:02X} at offset {pos}",
            u32::from(c)
        ))),
        None => Ok(()),
    }
}

/// Returns `true` if `tag` is three ASCII digits other than `000`.
#[must_use]
pub fn is_valid_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.bytes().all(|b| b.is_ascii_digit()) && tag != "000"
}

/// Returns `true` for control field tags (001-009).
#[must_use]
pub fn is_control_tag(tag: &str) -> bool {
    is_valid_tag(tag) && tag.starts_with("00")
}

/// Returns `true` for data field tags (010-999).
#[must_use]
pub fn is_data_tag(tag: &str) -> bool {
    is_valid_tag(tag) && !tag.starts_with("00")
}

/// Returns `true` if `c` may be used as an indicator (space or printable ASCII).
#[must_use]
pub fn is_valid_indicator(c: char) -> bool {
    c == ' ' || c.is_ascii_graphic()
}

fn check_control_tag(tag: &str) -> Result<()> {
    if is_control_tag(tag) {
        Ok(())
    } else {
        Err(MarcError::IllegalTag {
            tag: tag.to_string(),
            reason: "not a control field identifier",
        })
    }
}

fn check_data_tag(tag: &str) -> Result<()> {
    if is_data_tag(tag) {
        Ok(())
    } else {
        Err(MarcError::IllegalTag {
            tag: tag.to_string(),
            reason: "not a data field identifier",
        })
    }
}

fn check_indicator(c: char) -> Result<()> {
    if is_valid_indicator(c) {
        Ok(())
    } else {
        Err(MarcError::IllegalIndicator(format!(
            "U+{:04X} is not a printable ASCII character",
            u32::from(c)
        )))
    }
}

/// A control field (tags 001-009).
///
/// Deserialization goes through [`ControlField::new`], so the same checks apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawControlField")]
pub struct ControlField {
    tag: String,
    data: String,
    id: Option<u64>,
}

impl ControlField {
    /// Create a control field.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTag` for tags outside 001-009 and `IllegalDataElement` if
    /// `data` contains a structural control code.
    pub fn new(tag: &str, data: &str) -> Result<Self> {
        check_control_tag(tag)?;
        check_data_element(data)?;
        Ok(ControlField {
            tag: tag.to_string(),
            data: data.to_string(),
            id: None,
        })
    }

    /// Attach a numeric identifier.
    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// The field tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Replace the tag.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTag` for tags outside 001-009.
    pub fn set_tag(&mut self, tag: &str) -> Result<()> {
        check_control_tag(tag)?;
        self.tag = tag.to_string();
        Ok(())
    }

    /// The field data.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Replace the data.
    ///
    /// # Errors
    ///
    /// Returns `IllegalDataElement` if `data` contains a structural control code.
    pub fn set_data(&mut self, data: &str) -> Result<()> {
        check_data_element(data)?;
        self.data = data.to_string();
        Ok(())
    }

    /// The optional numeric identifier.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Set or clear the numeric identifier.
    pub fn set_id(&mut self, id: Option<u64>) {
        self.id = id;
    }
}

/// A subfield within a data field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSubfield")]
pub struct Subfield {
    code: char,
    data: String,
    link_code: Option<String>,
}

impl Subfield {
    /// Create a subfield.
    ///
    /// # Errors
    ///
    /// Returns `IllegalDataElement` if the code or data contains a structural
    /// control code.
    pub fn new(code: char, data: &str) -> Result<Self> {
        if is_structural_code(code) {
            return Err(MarcError::IllegalDataElement(format!(
                "subfield code 0x{:02X} is a reserved control code",
                u32::from(code)
            )));
        }
        check_data_element(data)?;
        Ok(Subfield {
            code,
            data: data.to_string(),
            link_code: None,
        })
    }

    /// Attach a link code.
    ///
    /// # Errors
    ///
    /// Returns `IllegalDataElement` if the link code contains a structural
    /// control code.
    pub fn with_link_code(mut self, link_code: &str) -> Result<Self> {
        check_data_element(link_code)?;
        self.link_code = Some(link_code.to_string());
        Ok(self)
    }

    /// The subfield code.
    #[must_use]
    pub fn code(&self) -> char {
        self.code
    }

    /// The subfield data.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Replace the data.
    ///
    /// # Errors
    ///
    /// Returns `IllegalDataElement` if `data` contains a structural control code.
    pub fn set_data(&mut self, data: &str) -> Result<()> {
        check_data_element(data)?;
        self.data = data.to_string();
        Ok(())
    }

    /// The optional link code.
    #[must_use]
    pub fn link_code(&self) -> Option<&str> {
        self.link_code.as_deref()
    }
}

/// A data field (tags 010-999).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDataField")]
pub struct DataField {
    tag: String,
    indicator1: char,
    indicator2: char,
    /// Stored in a `SmallVec`; typical fields carry four or fewer subfields.
    subfields: SmallVec<[Subfield; 4]>,
    id: Option<u64>,
}

impl DataField {
    /// Create an empty data field.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTag` for tags outside 010-999 and `IllegalIndicator` for
    /// indicators that are not space or printable ASCII.
    pub fn new(tag: &str, indicator1: char, indicator2: char) -> Result<Self> {
        check_data_tag(tag)?;
        check_indicator(indicator1)?;
        check_indicator(indicator2)?;
        Ok(DataField {
            tag: tag.to_string(),
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
            id: None,
        })
    }

    /// Attach a numeric identifier.
    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Append a subfield, builder style.
    ///
    /// # Errors
    ///
    /// Returns `IllegalDataElement` if the code or data is illegal.
    pub fn with_subfield(mut self, code: char, data: &str) -> Result<Self> {
        self.add_subfield(Subfield::new(code, data)?);
        Ok(self)
    }

    /// The field tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Replace the tag.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTag` for tags outside 010-999.
    pub fn set_tag(&mut self, tag: &str) -> Result<()> {
        check_data_tag(tag)?;
        self.tag = tag.to_string();
        Ok(())
    }

    /// First indicator.
    #[must_use]
    pub fn indicator1(&self) -> char {
        self.indicator1
    }

    /// Second indicator.
    #[must_use]
    pub fn indicator2(&self) -> char {
        self.indicator2
    }

    /// Replace the first indicator.
    ///
    /// # Errors
    ///
    /// Returns `IllegalIndicator` if `c` is not space or printable ASCII.
    pub fn set_indicator1(&mut self, c: char) -> Result<()> {
        check_indicator(c)?;
        self.indicator1 = c;
        Ok(())
    }

    /// Replace the second indicator.
    ///
    /// # Errors
    ///
    /// Returns `IllegalIndicator` if `c` is not space or printable ASCII.
    pub fn set_indicator2(&mut self, c: char) -> Result<()> {
        check_indicator(c)?;
        self.indicator2 = c;
        Ok(())
    }

    /// Append a subfield. Order is preserved and codes may repeat.
    pub fn add_subfield(&mut self, subfield: Subfield) {
        self.subfields.push(subfield);
    }

    /// Replace every subfield.
    pub fn set_subfields(&mut self, subfields: Vec<Subfield>) {
        self.subfields = SmallVec::from_vec(subfields);
    }

    /// All subfields in order.
    #[must_use]
    pub fn subfields(&self) -> &[Subfield] {
        &self.subfields
    }

    /// Data of the first subfield with the given code.
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(Subfield::data)
    }

    /// Data of every subfield with the given code.
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |sf| sf.code == code)
            .map(Subfield::data)
    }

    /// Returns `true` if any subfield has the given code.
    #[must_use]
    pub fn has_subfield(&self, code: char) -> bool {
        self.subfields.iter().any(|sf| sf.code == code)
    }

    /// The optional numeric identifier.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Set or clear the numeric identifier.
    pub fn set_id(&mut self, id: Option<u64>) {
        self.id = id;
    }

    /// Push `start_data_field`, every subfield and `end_data_field` to a handler.
    pub fn replay<H: MarcHandler + ?Sized>(&self, handler: &mut H) {
        handler.start_data_field(&self.tag, self.indicator1, self.indicator2, self.id);
        for sf in &self.subfields {
            handler.subfield(sf.code, &sf.data, sf.link_code());
        }
        handler.end_data_field(&self.tag);
    }
}

// Unchecked shapes read by serde; the conversions run the validating constructors.

#[derive(Deserialize)]
struct RawControlField {
    tag: String,
    data: String,
    id: Option<u64>,
}

impl TryFrom<RawControlField> for ControlField {
    type Error = MarcError;

    fn try_from(raw: RawControlField) -> Result<Self> {
        let mut field = ControlField::new(&raw.tag, &raw.data)?;
        field.set_id(raw.id);
        Ok(field)
    }
}

#[derive(Deserialize)]
struct RawSubfield {
    code: char,
    data: String,
    link_code: Option<String>,
}

impl TryFrom<RawSubfield> for Subfield {
    type Error = MarcError;

    fn try_from(raw: RawSubfield) -> Result<Self> {
        let subfield = Subfield::new(raw.code, &raw.data)?;
        match raw.link_code {
            Some(link_code) => subfield.with_link_code(&link_code),
            None => Ok(subfield),
        }
    }
}

#[derive(Deserialize)]
struct RawDataField {
    tag: String,
    indicator1: char,
    indicator2: char,
    subfields: Vec<Subfield>,
    id: Option<u64>,
}

impl TryFrom<RawDataField> for DataField {
    type Error = MarcError;

    fn try_from(raw: RawDataField) -> Result<Self> {
        let mut field = DataField::new(&raw.tag, raw.indicator1, raw.indicator2)?;
        field.set_subfields(raw.subfields);
        field.set_id(raw.id);
        Ok(field)
    }
}

/// Either kind of variable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableField {
    /// A control field (001-009).
    Control(ControlField),
    /// A data field (010-999).
    Data(DataField),
}

impl VariableField {
    /// The field tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            VariableField::Control(f) => f.tag(),
            VariableField::Data(f) => f.tag(),
        }
    }

    /// The optional numeric identifier.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        match self {
            VariableField::Control(f) => f.id(),
            VariableField::Data(f) => f.id(),
        }
    }

    /// Push this field's events to a handler.
    pub fn replay<H: MarcHandler + ?Sized>(&self, handler: &mut H) {
        match self {
            VariableField::Control(f) => handler.control_field(f.tag(), f.data(), f.id()),
            VariableField::Data(f) => f.replay(handler),
        }
    }
}

impl From<ControlField> for VariableField {
    fn from(field: ControlField) -> Self {
        VariableField::Control(field)
    }
}

impl From<DataField> for VariableField {
    fn from(field: DataField) -> Self {
        VariableField::Data(field)
    }
}

/// A MARC record: leader, control fields, then data fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record leader (24 bytes)
    pub leader: Leader,
    control_fields: Vec<ControlField>,
    data_fields: Vec<DataField>,
}

impl Record {
    /// Create an empty record with the given leader.
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            control_fields: Vec::new(),
            data_fields: Vec::new(),
        }
    }

    /// Create a builder for fluently constructing records.
    #[must_use]
    pub fn builder(leader: Leader) -> RecordBuilder {
        RecordBuilder {
            record: Record::new(leader),
        }
    }

    /// Append a control field.
    pub fn add_control_field(&mut self, field: ControlField) {
        self.control_fields.push(field);
    }

    /// Append a data field.
    pub fn add_data_field(&mut self, field: DataField) {
        self.data_fields.push(field);
    }

    /// Append either kind of field. Control fields stay ahead of data fields.
    pub fn add_field(&mut self, field: VariableField) {
        match field {
            VariableField::Control(f) => self.add_control_field(f),
            VariableField::Data(f) => self.add_data_field(f),
        }
    }

    /// All control fields in order.
    #[must_use]
    pub fn control_fields(&self) -> &[ControlField] {
        &self.control_fields
    }

    /// All data fields in order.
    #[must_use]
    pub fn data_fields(&self) -> &[DataField] {
        &self.data_fields
    }

    /// Data of the first control field with the given tag.
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields
            .iter()
            .find(|f| f.tag == tag)
            .map(ControlField::data)
    }

    /// First data field with the given tag.
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&DataField> {
        self.data_fields.iter().find(|f| f.tag == tag)
    }

    /// Every data field with the given tag.
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a DataField> + 'a {
        self.data_fields.iter().filter(move |f| f.tag == tag)
    }

    /// The control number (001), if present.
    #[must_use]
    pub fn control_number(&self) -> Option<&str> {
        self.get_control_field("001")
    }

    /// Number of variable fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.control_fields.len() + self.data_fields.len()
    }

    /// Returns `true` if the record has no variable fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push this record through a handler as one `start_record`/`end_record`
    /// bracket.
    pub fn replay<H: MarcHandler + ?Sized>(&self, handler: &mut H) {
        handler.start_record(&self.leader);
        for f in &self.control_fields {
            handler.control_field(f.tag(), f.data(), f.id());
        }
        for f in &self.data_fields {
            f.replay(handler);
        }
        handler.end_record();
    }
}

/// Fluent builder for [`Record`].
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Add a control field.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag or data is illegal.
    pub fn control_field(mut self, tag: &str, data: &str) -> Result<Self> {
        self.record.add_control_field(ControlField::new(tag, data)?);
        Ok(self)
    }

    /// Add a data field.
    #[must_use]
    pub fn data_field(mut self, field: DataField) -> Self {
        self.record.add_data_field(field);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_field_rejects_data_tag() {
        let err = ControlField::new("245", "x").unwrap_err();
        assert!(matches!(err, MarcError::IllegalTag { .. }), "got: {err}");
    }

    #[test]
    fn test_data_field_rejects_control_tag() {
        let err = DataField::new("001", ' ', ' ').unwrap_err();
        assert!(matches!(err, MarcError::IllegalTag { .. }), "got: {err}");
    }

    #[test]
    fn test_tag_ranges() {
        assert!(is_control_tag("001"));
        assert!(is_control_tag("009"));
        assert!(!is_control_tag("000"));
        assert!(!is_control_tag("010"));
        assert!(is_data_tag("010"));
        assert!(is_data_tag("999"));
        assert!(!is_data_tag("24"));
        assert!(!is_data_tag("24a"));
        assert!(!is_valid_tag("LDR"));
    }

    #[test]
    fn test_set_tag_enforces_legality() {
        let mut field = ControlField::new("001", "123").unwrap();
        assert!(field.set_tag("008").is_ok());
        assert!(field.set_tag("100").is_err());
        assert_eq!(field.tag(), "008");

        let mut field = DataField::new("245", '1', '0').unwrap();
        assert!(field.set_tag("005").is_err());
        assert_eq!(field.tag(), "245");
    }

    #[test]
    fn test_payload_rejects_structural_codes() {
        assert!(matches!(
            ControlField::new("001", "12\u{1e}3"),
            Err(MarcError::IllegalDataElement(_))
        ));
        assert!(matches!(
            Subfield::new('a', "a\u{1f}b"),
            Err(MarcError::IllegalDataElement(_))
        ));
        assert!(matches!(
            Subfield::new('\u{1d}', "ok"),
            Err(MarcError::IllegalDataElement(_))
        ));
        let mut sf = Subfield::new('a', "ok").unwrap();
        assert!(sf.set_data("bad\u{1d}").is_err());
        assert_eq!(sf.data(), "ok");
    }

    #[test]
    fn test_illegal_indicator() {
        assert!(matches!(
            DataField::new("245", '\u{1f}', '0'),
            Err(MarcError::IllegalIndicator(_))
        ));
        assert!(DataField::new("245", 'é', '0').is_err());
        let mut field = DataField::new("245", ' ', ' ').unwrap();
        assert!(field.set_indicator2('\n').is_err());
        assert!(field.set_indicator2('4').is_ok());
        assert_eq!(field.indicator2(), '4');
    }

    #[test]
    fn test_subfield_lookup_returns_first_match() {
        let field = DataField::new("650", ' ', '0')
            .unwrap()
            .with_subfield('a', "First")
            .unwrap()
            .with_subfield('x', "Middle")
            .unwrap()
            .with_subfield('a', "Second")
            .unwrap();

        assert_eq!(field.get_subfield('a'), Some("First"));
        let all: Vec<&str> = field.subfields_by_code('a').collect();
        assert_eq!(all, vec!["First", "Second"]);
        let codes: Vec<char> = field.subfields().iter().map(Subfield::code).collect();
        assert_eq!(codes, vec!['a', 'x', 'a']);
        assert!(!field.has_subfield('z'));
    }

    #[test]
    fn test_record_keeps_control_fields_first() {
        let mut record = Record::new(Leader::default());
        record.add_field(DataField::new("245", '0', '0').unwrap().into());
        record.add_field(ControlField::new("001", "id1").unwrap().into());

        assert_eq!(record.control_fields().len(), 1);
        assert_eq!(record.data_fields().len(), 1);
        assert_eq!(record.len(), 2);
        assert_eq!(record.control_number(), Some("id1"));
    }

    #[test]
    fn test_builder() {
        let record = Record::builder(Leader::default())
            .control_field("001", "42")
            .unwrap()
            .data_field(
                DataField::new("100", '1', ' ')
                    .unwrap()
                    .with_subfield('a', "Doe, Jane")
                    .unwrap(),
            )
            .build();

        assert_eq!(record.get_control_field("001"), Some("42"));
        assert_eq!(record.fields_by_tag("100").count(), 1);
        assert!(record.get_field("245").is_none());
    }

    #[test]
    fn test_link_code() {
        let sf = Subfield::new('6', "880-01")
            .unwrap()
            .with_link_code("880-01/(N")
            .unwrap();
        assert_eq!(sf.link_code(), Some("880-01/(N"));
        assert!(Subfield::new('a', "x").unwrap().with_link_code("\u{1e}").is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let record = Record::builder(Leader::default())
            .control_field("001", "7")
            .unwrap()
            .build();
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    fn rejects<T: serde::de::DeserializeOwned>(json: &str) -> bool {
        serde_json::from_str::<T>(json).is_err()
    }

    #[test]
    fn test_deserialize_validates() {
        let field: ControlField =
            serde_json::from_str(r#"{"tag":"001","data":"ocm1","id":7}"#).unwrap();
        assert_eq!(field.id(), Some(7));

        assert!(rejects::<ControlField>(r#"{"tag":"245","data":"x","id":null}"#));
        assert!(rejects::<ControlField>(r#"{"tag":"001","data":"x\u001e","id":null}"#));
        assert!(rejects::<Subfield>(r#"{"code":"a","data":"x\u001f","link_code":null}"#));
        assert!(rejects::<Subfield>(r#"{"code":"a","data":"x","link_code":"\u001d"}"#));
        assert!(rejects::<DataField>(
            r#"{"tag":"008","indicator1":" ","indicator2":" ","subfields":[],"id":null}"#
        ));
        assert!(rejects::<DataField>(
            r#"{"tag":"245","indicator1":"\u0001","indicator2":" ","subfields":[],"id":null}"#
        ));
    }

    #[test]
    fn test_deserialize_record_with_illegal_field_fails() {
        let mut json = serde_json::to_value(
            Record::builder(Leader::default())
                .control_field("001", "7")
                .unwrap()
                .build(),
        )
        .unwrap();
        json["control_fields"][0]["data"] = serde_json::Value::from("7\u{1d}");
        assert!(serde_json::from_value::<Record>(json).is_err());
    }
}
