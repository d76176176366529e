//! Reading MARC records from binary streams.
//!
//! This module provides [`MarcReader`] for decoding ISO 2709 records from any
//! source that implements [`std::io::Read`]. Records are delivered as events to a
//! [`MarcHandler`], or assembled into [`Record`] values with
//! [`MarcReader::read_record`].
//!
//! Each record is framed by its record terminator, decoded completely and only
//! then pushed to the handler. A record that has to be abandoned therefore
//! produces no events at all. Problems are reported to a [`DiagnosticSink`]
//! with the severity chosen by the [`DiagnosticPolicy`].
//!
//! # Examples
//!
//! Reading records from a file:
//!
//! ```no_run
//! use marcflow::{MarcReader, Marc8Converter};
//! use std::fs::File;
//!
//! let file = File::open("records.mrc")?;
//! let mut reader = MarcReader::new(file).with_converter(Box::new(Marc8Converter::new()));
//!
//! while let Some(record) = reader.read_record()? {
//!     println!("{:?}", record.control_number());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Streaming events into a handler while collecting diagnostics:
//!
//! ```
//! use marcflow::diagnostics::CollectingSink;
//! use marcflow::{MarcReader, RecordCollector};
//! use std::io::Cursor;
//!
//! let mut reader = MarcReader::new(Cursor::new(Vec::new())).with_sink(CollectingSink::new());
//! let mut collector = RecordCollector::new();
//! let summary = reader.parse(&mut collector)?;
//!
//! assert_eq!(summary.records, 0);
//! assert!(reader.sink().is_empty());
//! # Ok::<(), marcflow::MarcError>(())
//! ```

use crate::diagnostics::{
    Diagnostic, DiagnosticKind, DiagnosticPolicy, DiagnosticSink, DiscardSink, Severity,
};
use crate::encoding::{latin1, CharacterConverter, MarcEncoding};
use crate::error::{MarcError, Result};
use crate::handler::MarcHandler;
use crate::leader::{Leader, LEADER_LEN};
use crate::record::{
    is_control_tag, is_valid_tag, ControlField, DataField, Record, Subfield, VariableField,
    FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_DELIMITER,
};
use memchr::memchr;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use tracing::debug;

const DIRECTORY_ENTRY_LEN: usize = 12;

/// Largest record length a leader can state.
pub const MAX_RECORD_LEN: usize = 99_999;

/// Where the decoder returns the character converter to its initial state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetPolicy {
    /// Before every control field payload and every subfield payload.
    EachDataElement,
    /// Before every field.
    #[default]
    EachField,
    /// Before every record.
    EachRecord,
    /// Never; designations carry over for the whole stream.
    Never,
}

/// Result of decoding one record with [`MarcReader::decode_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The record's events were delivered.
    Emitted,
    /// The record was abandoned after an error; no events were delivered.
    Skipped,
}

/// Counts for a completed [`MarcReader::parse`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeSummary {
    /// Records delivered to the handler.
    pub records: usize,
    /// Records abandoned after an error.
    pub skipped: usize,
    /// Warnings reported.
    pub warnings: usize,
    /// Errors reported.
    pub errors: usize,
}

/// Why decoding of the current record stopped.
#[derive(Debug)]
enum Abort {
    Record,
    Stream(Box<Diagnostic>),
}

type Decode<T> = std::result::Result<T, Abort>;

/// Context attached to every diagnostic raised for one record.
#[derive(Debug, Default)]
struct RecordContext {
    start: u64,
    record_id: Option<String>,
}

/// How a record frame ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameEnd {
    /// At a record terminator.
    Terminator,
    /// At the stated record length, where the next leader follows with no
    /// terminator in between.
    MissingTerminator,
    /// At the stated record length, whose last byte is not a terminator.
    DamagedTerminator,
    /// At the end of the stream.
    EndOfStream,
    /// At [`MAX_RECORD_LEN`] with no terminator seen.
    SizeLimit,
}

enum Step {
    Eof,
    Skipped,
    Decoded(Leader, Vec<VariableField>),
}

/// One parsed directory entry.
#[derive(Debug)]
struct Entry {
    tag: String,
    length: usize,
    start: usize,
}

/// Reader for ISO 2709 binary MARC format.
///
/// Configuration is builder-style; the defaults are no character conversion
/// (bytes map to the code points of the same value), a [`DiscardSink`], the
/// default [`DiagnosticPolicy`] and [`ResetPolicy::EachField`].
#[derive(Debug)]
pub struct MarcReader<R: Read, S: DiagnosticSink = DiscardSink> {
    reader: BufReader<R>,
    converter: Option<Box<dyn CharacterConverter>>,
    encoding_from_leader: bool,
    active_encoding: Option<MarcEncoding>,
    sink: S,
    policy: DiagnosticPolicy,
    reset_policy: ResetPolicy,
    offset: u64,
    buf: Vec<u8>,
    carry: Vec<u8>,
    records_read: usize,
    records_skipped: usize,
    warnings: usize,
    errors: usize,
}

impl<R: Read> MarcReader<R> {
    /// Create a new MARC reader.
    ///
    /// # Examples
    ///
    /// ```
    /// use marcflow::MarcReader;
    /// use std::io::Cursor;
    ///
    /// let reader = MarcReader::new(Cursor::new(Vec::new()));
    /// assert_eq!(reader.records_read(), 0);
    /// ```
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader: BufReader::new(reader),
            converter: None,
            encoding_from_leader: false,
            active_encoding: None,
            sink: DiscardSink,
            policy: DiagnosticPolicy::default(),
            reset_policy: ResetPolicy::default(),
            offset: 0,
            buf: Vec::new(),
            carry: Vec::new(),
            records_read: 0,
            records_skipped: 0,
            warnings: 0,
            errors: 0,
        }
    }
}

impl<R: Read, S: DiagnosticSink> MarcReader<R, S> {
    /// Convert every payload with `converter`.
    #[must_use]
    pub fn with_converter(mut self, converter: Box<dyn CharacterConverter>) -> Self {
        self.converter = Some(converter);
        self.encoding_from_leader = false;
        self
    }

    /// Pick the converter per record from leader position 09: UTF-8 for `a`,
    /// MARC-8 otherwise.
    #[must_use]
    pub fn with_leader_encoding(mut self) -> Self {
        self.encoding_from_leader = true;
        self
    }

    /// Send diagnostics to `sink`.
    pub fn with_sink<S2: DiagnosticSink>(self, sink: S2) -> MarcReader<R, S2> {
        MarcReader {
            reader: self.reader,
            converter: self.converter,
            encoding_from_leader: self.encoding_from_leader,
            active_encoding: self.active_encoding,
            sink,
            policy: self.policy,
            reset_policy: self.reset_policy,
            offset: self.offset,
            buf: self.buf,
            carry: self.carry,
            records_read: self.records_read,
            records_skipped: self.records_skipped,
            warnings: self.warnings,
            errors: self.errors,
        }
    }

    /// Use `policy` to decide the severity of each condition.
    #[must_use]
    pub fn with_policy(mut self, policy: DiagnosticPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Choose where the converter is reset.
    #[must_use]
    pub fn with_reset_policy(mut self, reset_policy: ResetPolicy) -> Self {
        self.reset_policy = reset_policy;
        self
    }

    /// Records delivered so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Records abandoned so far.
    #[must_use]
    pub fn records_skipped(&self) -> usize {
        self.records_skipped
    }

    /// The diagnostic sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the reader and return the diagnostic sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Decode the whole stream, bracketed by `start_collection` and
    /// `end_collection`.
    ///
    /// # Errors
    ///
    /// Returns `MarcError::Fatal` when a diagnostic with fatal severity is raised
    /// and `MarcError::Io` when the stream cannot be read. In both cases
    /// `end_collection` is not called.
    pub fn parse<H: MarcHandler + ?Sized>(&mut self, handler: &mut H) -> Result<DecodeSummary> {
        let warnings = self.warnings;
        let errors = self.errors;
        let mut summary = DecodeSummary::default();

        handler.start_collection();
        while let Some(outcome) = self.decode_next(handler)? {
            match outcome {
                RecordOutcome::Emitted => summary.records += 1,
                RecordOutcome::Skipped => summary.skipped += 1,
            }
        }
        handler.end_collection();

        summary.warnings = self.warnings - warnings;
        summary.errors = self.errors - errors;
        debug!(?summary, "stream decoded");
        Ok(summary)
    }

    /// Decode the next record and push its events to `handler`.
    ///
    /// Returns `Ok(None)` at end of stream. Collection brackets are not sent.
    ///
    /// # Errors
    ///
    /// Same as [`MarcReader::parse`].
    pub fn decode_next<H: MarcHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Result<Option<RecordOutcome>> {
        match self.step()? {
            Step::Eof => Ok(None),
            Step::Skipped => Ok(Some(RecordOutcome::Skipped)),
            Step::Decoded(leader, fields) => {
                handler.start_record(&leader);
                for field in &fields {
                    field.replay(handler);
                }
                handler.end_record();
                Ok(Some(RecordOutcome::Emitted))
            },
        }
    }

    /// Read the next record that decodes successfully.
    ///
    /// Skipped records are passed over; their diagnostics still reach the sink.
    ///
    /// # Errors
    ///
    /// Same as [`MarcReader::parse`].
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        loop {
            match self.step()? {
                Step::Eof => return Ok(None),
                Step::Skipped => {},
                Step::Decoded(leader, fields) => {
                    let mut record = Record::new(leader);
                    for field in fields {
                        record.add_field(field);
                    }
                    return Ok(Some(record));
                },
            }
        }
    }

    fn step(&mut self) -> Result<Step> {
        let Some((start, end)) = self.next_frame()? else {
            return Ok(Step::Eof);
        };

        let buf = std::mem::take(&mut self.buf);
        let ctx = RecordContext {
            start,
            record_id: None,
        };
        let result = self.decode_record(&buf, ctx, end);
        self.buf = buf;

        match result {
            Ok((leader, fields)) => {
                self.records_read += 1;
                Ok(Step::Decoded(leader, fields))
            },
            Err(Abort::Record) => {
                self.records_skipped += 1;
                if self.reset_policy != ResetPolicy::Never {
                    self.reset_converter();
                }
                debug!(offset = start, skipped = self.records_skipped, "record skipped");
                Ok(Step::Skipped)
            },
            Err(Abort::Stream(diagnostic)) => Err(MarcError::Fatal(diagnostic)),
        }
    }

    /// Read the next record span into `self.buf`.
    ///
    /// A span normally ends at a record terminator. When the leader's stated
    /// length falls short of the terminator and another leader starts there,
    /// the span is cut at that point and the remainder is kept for the next
    /// call. No span grows past [`MAX_RECORD_LEN`] bytes.
    ///
    /// Returns the span's stream offset and how it ended, or `None` at end of
    /// stream.
    fn next_frame(&mut self) -> Result<Option<(u64, FrameEnd)>> {
        let breaks = self.carry.iter().take_while(|&&b| is_line_break(b)).count();
        self.carry.drain(..breaks);
        self.offset += breaks as u64;
        if self.carry.is_empty() && !self.skip_line_breaks()? {
            return Ok(None);
        }

        let start = self.offset;
        self.buf.clear();
        let mut end = match memchr(RECORD_TERMINATOR, &self.carry) {
            Some(pos) => {
                self.buf.extend(self.carry.drain(..=pos));
                FrameEnd::Terminator
            },
            None => {
                self.buf.append(&mut self.carry);
                let limit = MAX_RECORD_LEN.saturating_sub(self.buf.len()) as u64;
                (&mut self.reader)
                    .take(limit)
                    .read_until(RECORD_TERMINATOR, &mut self.buf)?;
                if self.buf.last() == Some(&RECORD_TERMINATOR) {
                    FrameEnd::Terminator
                } else if self.buf.len() >= MAX_RECORD_LEN {
                    FrameEnd::SizeLimit
                } else {
                    FrameEnd::EndOfStream
                }
            },
        };

        if let Some((at, resync)) = resync_point(&self.buf) {
            let mut rest = self.buf.split_off(at);
            rest.append(&mut self.carry);
            self.carry = rest;
            end = resync;
            debug!(offset = start, len = at, "record cut at its stated length");
        }

        self.offset = start + self.buf.len() as u64;
        debug!(offset = start, len = self.buf.len(), ?end, "read record frame");
        Ok(Some((start, end)))
    }

    /// Consume line breaks between records. Returns `false` at end of stream.
    fn skip_line_breaks(&mut self) -> Result<bool> {
        loop {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                return Ok(false);
            }
            let breaks = available.iter().take_while(|&&b| is_line_break(b)).count();
            let exhausted = breaks == available.len();
            self.reader.consume(breaks);
            self.offset += breaks as u64;
            if !exhausted {
                return Ok(true);
            }
        }
    }

    fn decode_record(
        &mut self,
        buf: &[u8],
        mut ctx: RecordContext,
        end: FrameEnd,
    ) -> Decode<(Leader, Vec<VariableField>)> {
        if self.reset_policy == ResetPolicy::EachRecord {
            self.reset_converter();
        }

        let truncation = match end {
            FrameEnd::EndOfStream => {
                Some("stream ended before the record terminator".to_string())
            },
            FrameEnd::SizeLimit => {
                Some(format!("no record terminator within {MAX_RECORD_LEN} bytes"))
            },
            _ => None,
        };
        if let Some(message) = truncation {
            self.raise(&ctx, DiagnosticKind::TruncatedRecord, buf.len(), None, message)?;
        }

        if buf.len() < LEADER_LEN {
            // Nothing to deliver without a leader.
            self.raise(
                &ctx,
                DiagnosticKind::MalformedLeader,
                0,
                None,
                format!("record of {} bytes cannot hold a leader", buf.len()),
            )?;
            return Err(Abort::Record);
        }

        let leader = self.decode_leader(buf, &ctx, end)?;
        self.select_converter(&leader);

        let body = match end {
            FrameEnd::Terminator | FrameEnd::DamagedTerminator => &buf[..buf.len() - 1],
            _ => buf,
        };
        let Some(dir_len) = memchr(FIELD_TERMINATOR, &body[LEADER_LEN..]) else {
            self.raise(
                &ctx,
                DiagnosticKind::MalformedDirectory,
                LEADER_LEN,
                None,
                "directory has no field terminator".to_string(),
            )?;
            return Ok((leader, Vec::new()));
        };
        let dir_end = LEADER_LEN + dir_len;
        let data_start = dir_end + 1;

        if leader.base_address_of_data as usize != data_start {
            self.raise(
                &ctx,
                DiagnosticKind::MalformedLeader,
                12,
                None,
                format!(
                    "base address of data {} disagrees with directory end at {data_start}",
                    leader.base_address_of_data
                ),
            )?;
        }

        let entries = self.parse_directory(&body[LEADER_LEN..dir_end], &ctx)?;
        let data = &body[data_start..];
        ctx.record_id = control_number(&entries, data);

        let mut fields = Vec::with_capacity(entries.len());
        for entry in &entries {
            if self.reset_policy == ResetPolicy::EachField {
                self.reset_converter();
            }
            if let Some(field) = self.decode_field(entry, data, data_start, &ctx)? {
                fields.push(field);
            }
        }
        Ok((leader, fields))
    }

    fn decode_leader(&mut self, buf: &[u8], ctx: &RecordContext, end: FrameEnd) -> Decode<Leader> {
        let (leader, defaults) = match Leader::from_bytes(&buf[..LEADER_LEN]) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.raise(ctx, DiagnosticKind::IllegalDataElement, 0, None, e.to_string())?;
                return Err(Abort::Record);
            },
        };

        for default in defaults {
            self.raise(
                ctx,
                DiagnosticKind::MalformedLeader,
                default.position(),
                None,
                format!("{} is not numeric; using the default", default.name()),
            )?;
        }

        match end {
            FrameEnd::Terminator if leader.record_length as usize != buf.len() => {
                self.raise(
                    ctx,
                    DiagnosticKind::RecordLengthMismatch,
                    0,
                    None,
                    format!(
                        "leader states {} bytes but the record terminator ends the record at {}",
                        leader.record_length,
                        buf.len()
                    ),
                )?;
            },
            FrameEnd::MissingTerminator => {
                self.raise(
                    ctx,
                    DiagnosticKind::RecordLengthMismatch,
                    buf.len(),
                    None,
                    format!(
                        "record terminator missing; the next leader starts at byte {}",
                        buf.len()
                    ),
                )?;
            },
            FrameEnd::DamagedTerminator => {
                self.raise(
                    ctx,
                    DiagnosticKind::RecordLengthMismatch,
                    buf.len() - 1,
                    None,
                    format!(
                        "byte 0x{:02X} in place of the record terminator",
                        buf[buf.len() - 1]
                    ),
                )?;
            },
            _ => {},
        }
        Ok(leader)
    }

    fn parse_directory(&mut self, directory: &[u8], ctx: &RecordContext) -> Decode<Vec<Entry>> {
        let mut entries = Vec::with_capacity(directory.len() / DIRECTORY_ENTRY_LEN);
        for (i, chunk) in directory.chunks(DIRECTORY_ENTRY_LEN).enumerate() {
            let offset = LEADER_LEN + i * DIRECTORY_ENTRY_LEN;
            if chunk.len() < DIRECTORY_ENTRY_LEN {
                self.raise(
                    ctx,
                    DiagnosticKind::MalformedDirectory,
                    offset,
                    None,
                    format!("dangling partial directory entry of {} bytes", chunk.len()),
                )?;
                break;
            }
            let tag = String::from_utf8_lossy(&chunk[0..3]).into_owned();
            match (parse_digits(&chunk[3..7]), parse_digits(&chunk[7..12])) {
                (Some(length), Some(start)) => entries.push(Entry { tag, length, start }),
                _ => {
                    self.raise(
                        ctx,
                        DiagnosticKind::MalformedDirectory,
                        offset,
                        Some(&tag),
                        "directory entry length or start is not numeric".to_string(),
                    )?;
                },
            }
        }
        Ok(entries)
    }

    fn decode_field(
        &mut self,
        entry: &Entry,
        data: &[u8],
        data_start: usize,
        ctx: &RecordContext,
    ) -> Decode<Option<VariableField>> {
        let tag = entry.tag.as_str();
        if !is_valid_tag(tag) {
            self.raise(
                ctx,
                DiagnosticKind::IllegalTag,
                data_start + entry.start,
                Some(tag),
                "tag is not three digits in 001-999".to_string(),
            )?;
            return Ok(None);
        }

        let Some(bytes) = self.slice_field(entry, data, data_start, ctx)? else {
            return Ok(None);
        };
        let field_offset = data_start + entry.start;

        if is_control_tag(tag) {
            if let Some(pos) = memchr(SUBFIELD_DELIMITER, bytes) {
                self.raise(
                    ctx,
                    DiagnosticKind::IllegalDataElement,
                    field_offset + pos,
                    Some(tag),
                    "subfield delimiter inside a control field".to_string(),
                )?;
                return Ok(None);
            }
            let text = self.convert(bytes, field_offset, tag, ctx)?;
            return match ControlField::new(tag, &text) {
                Ok(field) => Ok(Some(field.into())),
                Err(e) => {
                    self.raise(ctx, kind_of(&e), field_offset, Some(tag), e.to_string())?;
                    Ok(None)
                },
            };
        }

        self.decode_data_field(tag, bytes, field_offset, ctx)
    }

    /// Locate a field's bytes, excluding its terminator.
    fn slice_field<'a>(
        &mut self,
        entry: &Entry,
        data: &'a [u8],
        data_start: usize,
        ctx: &RecordContext,
    ) -> Decode<Option<&'a [u8]>> {
        let tag = Some(entry.tag.as_str());
        let stated_end = entry.start + entry.length;

        if entry.start >= data.len() {
            self.raise(
                ctx,
                DiagnosticKind::DirectoryOverrun,
                data_start + entry.start,
                tag,
                format!(
                    "field starts at {} but the data area is {} bytes",
                    entry.start,
                    data.len()
                ),
            )?;
            return Ok(None);
        }

        match memchr(FIELD_TERMINATOR, &data[entry.start..]) {
            Some(len) => {
                if len + 1 != entry.length {
                    self.raise(
                        ctx,
                        DiagnosticKind::FieldLengthMismatch,
                        data_start + entry.start + len,
                        tag,
                        format!(
                            "directory length {} but the field terminator ends the field at {}",
                            entry.length,
                            len + 1
                        ),
                    )?;
                }
                Ok(Some(&data[entry.start..entry.start + len]))
            },
            None if stated_end > data.len() => {
                self.raise(
                    ctx,
                    DiagnosticKind::DirectoryOverrun,
                    data_start + entry.start,
                    tag,
                    format!(
                        "field of {} bytes at {} runs past the data area of {} bytes",
                        entry.length,
                        entry.start,
                        data.len()
                    ),
                )?;
                Ok(None)
            },
            None => {
                self.raise(
                    ctx,
                    DiagnosticKind::FieldLengthMismatch,
                    data_start + stated_end,
                    tag,
                    "field has no terminator".to_string(),
                )?;
                Ok(Some(&data[entry.start..stated_end]))
            },
        }
    }

    fn decode_data_field(
        &mut self,
        tag: &str,
        bytes: &[u8],
        field_offset: usize,
        ctx: &RecordContext,
    ) -> Decode<Option<VariableField>> {
        let indicators = match bytes {
            [i1, i2, ..] if is_indicator_byte(*i1) && is_indicator_byte(*i2) => {
                (char::from(*i1), char::from(*i2))
            },
            _ => {
                self.raise(
                    ctx,
                    DiagnosticKind::IllegalIndicator,
                    field_offset,
                    Some(tag),
                    format!(
                        "indicators missing or not printable ASCII: {:?}",
                        latin1(&bytes[..bytes.len().min(2)])
                    ),
                )?;
                return Ok(None);
            },
        };

        let mut field = match DataField::new(tag, indicators.0, indicators.1) {
            Ok(field) => field,
            Err(e) => {
                self.raise(ctx, kind_of(&e), field_offset, Some(tag), e.to_string())?;
                return Ok(None);
            },
        };

        let mut offset = field_offset + 2;
        let mut groups = bytes[2..].split(|&b| b == SUBFIELD_DELIMITER);

        if let Some(lead) = groups.next() {
            if !lead.is_empty() {
                self.raise(
                    ctx,
                    DiagnosticKind::MissingSubfieldDelimiter,
                    offset,
                    Some(tag),
                    format!("{} bytes before the first subfield delimiter dropped", lead.len()),
                )?;
            }
            offset += lead.len();
        }

        for group in groups {
            // `offset` points at the delimiter in front of `group`.
            let group_offset = offset;
            offset += group.len() + 1;

            let Some((&code, payload)) = group.split_first() else {
                self.raise(
                    ctx,
                    DiagnosticKind::MissingSubfieldDelimiter,
                    group_offset,
                    Some(tag),
                    "subfield delimiter without a code dropped".to_string(),
                )?;
                continue;
            };

            let text = self.convert(payload, group_offset + 2, tag, ctx)?;
            match Subfield::new(char::from(code), &text) {
                Ok(sf) => field.add_subfield(sf),
                Err(e) => {
                    self.raise(ctx, kind_of(&e), group_offset, Some(tag), e.to_string())?;
                },
            }
        }

        Ok(Some(field.into()))
    }

    fn convert(
        &mut self,
        bytes: &[u8],
        offset: usize,
        tag: &str,
        ctx: &RecordContext,
    ) -> Decode<String> {
        let Some(converter) = self.converter.as_mut() else {
            return Ok(latin1(bytes));
        };
        if self.reset_policy == ResetPolicy::EachDataElement {
            converter.reset();
        }
        let text = converter.convert_bytes(bytes);
        for issue in converter.take_issues() {
            self.raise(ctx, issue.kind, offset + issue.offset, Some(tag), issue.message)?;
        }
        Ok(text)
    }

    fn select_converter(&mut self, leader: &Leader) {
        if !self.encoding_from_leader {
            return;
        }
        let encoding = MarcEncoding::from_leader_char(leader.char_coding_scheme)
            .unwrap_or(MarcEncoding::Marc8);
        if self.active_encoding != Some(encoding) || self.converter.is_none() {
            self.converter = Some(encoding.converter());
            self.active_encoding = Some(encoding);
        }
    }

    fn reset_converter(&mut self) {
        if let Some(converter) = self.converter.as_mut() {
            converter.reset();
        }
    }

    /// Report a condition and decide whether decoding may continue.
    fn raise(
        &mut self,
        ctx: &RecordContext,
        kind: DiagnosticKind,
        offset: usize,
        tag: Option<&str>,
        message: String,
    ) -> Decode<()> {
        let severity = self.policy.severity(kind);
        let diagnostic = Diagnostic {
            kind,
            severity,
            message,
            position: ctx.start + offset as u64,
            record_id: ctx.record_id.clone(),
            tag: tag.map(str::to_string),
        };
        self.sink.report(&diagnostic);

        match severity {
            Severity::Warning => {
                self.warnings += 1;
                Ok(())
            },
            Severity::Error => {
                self.errors += 1;
                Err(Abort::Record)
            },
            Severity::Fatal => Err(Abort::Stream(Box::new(diagnostic))),
        }
    }
}

fn is_line_break(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

/// Whether `bytes` open with something shaped like a leader: numeric record
/// length, indicator count, subfield code length and base address.
fn looks_like_leader(bytes: &[u8]) -> bool {
    bytes.len() >= LEADER_LEN
        && bytes[0..5].iter().all(u8::is_ascii_digit)
        && bytes[10..17].iter().all(u8::is_ascii_digit)
}

/// Where a span that runs past its leader's stated length should be cut.
///
/// The last field terminator must sit just before the stated end, and a
/// leader must start either at the stated end (the terminator was replaced)
/// or one byte earlier (the terminator was dropped).
fn resync_point(frame: &[u8]) -> Option<(usize, FrameEnd)> {
    let stated = parse_digits(frame.get(..5)?)?;
    if stated <= LEADER_LEN || stated >= frame.len() {
        return None;
    }
    if frame[stated - 2] == FIELD_TERMINATOR && looks_like_leader(&frame[stated - 1..]) {
        Some((stated - 1, FrameEnd::MissingTerminator))
    } else if frame[stated - 2] == FIELD_TERMINATOR && looks_like_leader(&frame[stated..]) {
        Some((stated, FrameEnd::DamagedTerminator))
    } else {
        None
    }
}

fn is_indicator_byte(b: u8) -> bool {
    b == b' ' || b.is_ascii_graphic()
}

fn kind_of(err: &MarcError) -> DiagnosticKind {
    match err {
        MarcError::IllegalTag { .. } => DiagnosticKind::IllegalTag,
        MarcError::IllegalIndicator(_) => DiagnosticKind::IllegalIndicator,
        _ => DiagnosticKind::IllegalDataElement,
    }
}

/// Read the 001 payload straight from the data area, for diagnostics.
fn control_number(entries: &[Entry], data: &[u8]) -> Option<String> {
    let entry = entries.iter().find(|e| e.tag == "001")?;
    let field = data.get(entry.start..)?;
    let end = memchr(FIELD_TERMINATOR, field).unwrap_or_else(|| entry.length.min(field.len()));
    Some(latin1(&field[..end]))
}

/// Parse an all-digit ASCII number.
fn parse_digits(bytes: &[u8]) -> Option<usize> {
    bytes.iter().try_fold(0usize, |acc, &b| {
        b.is_ascii_digit().then(|| acc * 10 + usize::from(b - b'0'))
    })
}
