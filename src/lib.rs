#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! ## Modules
//!
//! - [`record`] - The record model (`Record`, `ControlField`, `DataField`, `Subfield`)
//! - [`leader`] - The 24-character leader
//! - [`handler`] - The event protocol between decoder and consumers
//! - [`reader`] - Streaming ISO 2709 decoder
//! - [`writer`] - ISO 2709 encoder
//! - [`diagnostics`] - Recoverable problem reporting
//! - [`encoding`] - Pluggable character converters
//! - [`marc8`] - MARC-8 (ANSEL) to Unicode conversion and back
//! - [`marc8_tables`] - Code tables for the MARC-8 character sets
//! - [`marcxml`] - MARCXML output
//! - [`tagged`] - Line-oriented text output
//! - [`normalize`] - Leader and indicator correction
//! - [`error`] - Error types and result type

pub mod diagnostics;
pub mod encoding;
pub mod error;
pub mod handler;
pub mod leader;
pub mod marc8;
pub mod marc8_tables;
pub mod marcxml;
pub mod normalize;
pub mod reader;
/// Core MARC record structures (`Record`, `ControlField`, `DataField`, `Subfield`)
pub mod record;
pub mod tagged;
pub mod writer;

pub use diagnostics::{
    CollectingSink, Diagnostic, DiagnosticKind, DiagnosticPolicy, DiagnosticSink, DiscardSink,
    LoggingSink, Severity,
};
pub use encoding::{
    CharacterConverter, ConversionIssue, Latin1Converter, MarcEncoding, Utf8Converter,
};
pub use error::{MarcError, Result};
pub use handler::{MarcHandler, RecordCollector};
pub use leader::{Leader, LeaderDefault};
pub use marc8::{Marc8Converter, Marc8Encoder};
pub use marc8_tables::{CharacterSetId, CodeTable, CodeTableBuilder};
pub use marcxml::{record_to_marcxml, MarcXmlWriter, MARCXML_SCHEMA_LOCATION};
pub use normalize::NormalizingHandler;
pub use reader::{DecodeSummary, MarcReader, RecordOutcome, ResetPolicy};
pub use record::{ControlField, DataField, Record, RecordBuilder, Subfield, VariableField};
pub use tagged::TaggedWriter;
pub use writer::{MarcWriter, TextEncoding};
