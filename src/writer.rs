//! Writing MARC records to binary format.
//!
//! This module provides [`MarcWriter`] for serializing [`Record`] instances to
//! ISO 2709 binary format on any destination implementing [`std::io::Write`].
//! Payloads are written as UTF-8 (leader position 09 = `a`) or as MARC-8
//! (leader position 09 = blank) through the [`Marc8Encoder`].
//!
//! # Examples
//!
//! ```
//! use marcflow::{DataField, Leader, MarcWriter, Record};
//!
//! # fn main() -> marcflow::Result<()> {
//! let record = Record::builder(Leader::default())
//!     .control_field("001", "12345")?
//!     .data_field(DataField::new("245", '1', '0')?.with_subfield('a', "Title")?)
//!     .build();
//!
//! let mut writer = MarcWriter::new(Vec::new());
//! writer.write_record(&record)?;
//! let bytes = writer.into_inner()?;
//! assert_eq!(bytes.last(), Some(&0x1D));
//! # Ok(())
//! # }
//! ```

use crate::error::{MarcError, Result};
use crate::leader::LEADER_LEN;
use crate::marc8::Marc8Encoder;
use crate::record::{Record, FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_DELIMITER};
use std::io::Write;

const MAX_FIELD_LENGTH: usize = 9999;
const MAX_FIELD_START: usize = 99_999;

/// Character encoding used for payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8; leader position 09 is set to `a`.
    #[default]
    Utf8,
    /// MARC-8; leader position 09 is set to blank.
    Marc8,
}

impl TextEncoding {
    fn leader_char(self) -> char {
        match self {
            TextEncoding::Utf8 => 'a',
            TextEncoding::Marc8 => ' ',
        }
    }
}

/// Writer for ISO 2709 binary MARC format.
///
/// The leader's record length, base address of data and character coding scheme
/// are computed for every record; the other leader positions are written as
/// given.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    encoding: TextEncoding,
    encoder: Marc8Encoder,
    records_written: usize,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new MARC writer producing UTF-8 records.
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            encoding: TextEncoding::default(),
            encoder: Marc8Encoder::new(),
            records_written: 0,
            finished: false,
        }
    }

    /// Choose the payload encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Write a single MARC record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The writer was already finished
    /// - A field is longer than 9999 bytes or starts beyond offset 99999
    /// - The record is longer than 99999 bytes
    /// - A subfield code is not ASCII
    /// - A character cannot be encoded in MARC-8
    /// - An I/O error occurs during writing
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "cannot write to a finished writer",
            )));
        }

        let mut data_area = Vec::new();
        let mut directory = Vec::new();

        for field in record.control_fields() {
            let start = data_area.len();
            data_area.extend(self.encode(field.data())?);
            data_area.push(FIELD_TERMINATOR);
            push_entry(&mut directory, field.tag(), data_area.len() - start, start)?;
        }

        for field in record.data_fields() {
            let start = data_area.len();
            data_area.push(ascii_byte(field.indicator1())?);
            data_area.push(ascii_byte(field.indicator2())?);
            for subfield in field.subfields() {
                data_area.push(SUBFIELD_DELIMITER);
                data_area.push(ascii_byte(subfield.code())?);
                data_area.extend(self.encode(subfield.data())?);
            }
            data_area.push(FIELD_TERMINATOR);
            push_entry(&mut directory, field.tag(), data_area.len() - start, start)?;
        }

        directory.push(FIELD_TERMINATOR);

        let base_address = LEADER_LEN + directory.len();
        let record_length = base_address + data_area.len() + 1;

        let mut leader = record.leader.clone();
        leader.record_length = u32::try_from(record_length).map_err(|_| {
            MarcError::MalformedLeader(format!("record length {record_length} is too large"))
        })?;
        leader.base_address_of_data = u32::try_from(base_address).map_err(|_| {
            MarcError::MalformedLeader(format!("base address {base_address} is too large"))
        })?;
        leader.char_coding_scheme = self.encoding.leader_char();

        let leader_bytes = leader.as_bytes()?;
        self.writer.write_all(&leader_bytes)?;
        self.writer.write_all(&directory)?;
        self.writer.write_all(&data_area)?;
        self.writer.write_all(&[RECORD_TERMINATOR])?;

        self.records_written += 1;
        Ok(())
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self.encoding {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Marc8 => self.encoder.encode(text),
        }
    }

    /// Flush the writer and mark it as finished.
    ///
    /// After calling `finish`, no more records can be written.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.writer)
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }
}

fn push_entry(directory: &mut Vec<u8>, tag: &str, length: usize, start: usize) -> Result<()> {
    if length > MAX_FIELD_LENGTH {
        return Err(MarcError::IllegalDataElement(format!(
            "field {tag} is {length} bytes; the directory allows {MAX_FIELD_LENGTH}"
        )));
    }
    if start > MAX_FIELD_START {
        return Err(MarcError::IllegalDataElement(format!(
            "field {tag} starts at {start}; the directory allows {MAX_FIELD_START}"
        )));
    }
    directory.extend_from_slice(tag.as_bytes());
    directory.extend_from_slice(format!("{length:04}{start:05}").as_bytes());
    Ok(())
}

fn ascii_byte(c: char) -> Result<u8> {
    u8::try_from(c).ok().filter(u8::is_ascii).ok_or_else(|| {
        MarcError::IllegalDataElement(format!(
            "U+{:04X} cannot be written as a single-byte code",
            u32::from(c)
        ))
    })
}
