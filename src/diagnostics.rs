//! Structured diagnostics raised while decoding.
//!
//! The decoder never panics or bails on damaged input by itself. Each problem is
//! classified as a [`DiagnosticKind`], given a [`Severity`] by the
//! [`DiagnosticPolicy`], and handed to a [`DiagnosticSink`]:
//!
//! - **Warning** - reported, decoding continues with a substituted value.
//! - **Error** - reported, the current record is abandoned and decoding resumes at
//!   the next record terminator.
//! - **Fatal** - reported, the stream stops and `parse` returns
//!   [`MarcError::Fatal`](crate::MarcError::Fatal).
//!
//! # Examples
//!
//! ```
//! use marcflow::diagnostics::{DiagnosticKind, DiagnosticPolicy, Severity};
//!
//! let policy = DiagnosticPolicy::default()
//!     .with_severity(DiagnosticKind::UnmappableCharacter, Severity::Error);
//!
//! assert_eq!(policy.severity(DiagnosticKind::UnmappableCharacter), Severity::Error);
//! assert_eq!(policy.severity(DiagnosticKind::IllegalTag), Severity::Error);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{error, warn};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Recovered locally; the record is still delivered.
    Warning,
    /// The current record is skipped.
    Error,
    /// The stream is abandoned.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// The condition a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Leader position substituted by a default, or base address disagreeing with
    /// the directory terminator.
    MalformedLeader,
    /// Tag that is not three digits or is illegal for its field kind.
    IllegalTag,
    /// Missing or non-printable indicator.
    IllegalIndicator,
    /// Structural control code inside a payload.
    IllegalDataElement,
    /// Directory entry pointing outside the data area.
    DirectoryOverrun,
    /// Byte with no mapping in the active character set.
    UnmappableCharacter,
    /// Escape sequence that is truncated or not understood.
    MalformedEscapeSequence,
    /// Record terminator not where the leader's record length puts it.
    RecordLengthMismatch,
    /// Field terminator not where the directory's field length puts it.
    FieldLengthMismatch,
    /// Directory entry with non-digit numbers, or a partial entry.
    MalformedDirectory,
    /// Data before the first subfield delimiter, or a delimiter with no code.
    MissingSubfieldDelimiter,
    /// Stream ended without a record terminator.
    TruncatedRecord,
}

impl DiagnosticKind {
    /// Severity used when no override is configured.
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticKind::IllegalTag
            | DiagnosticKind::IllegalIndicator
            | DiagnosticKind::IllegalDataElement
            | DiagnosticKind::DirectoryOverrun
            | DiagnosticKind::MalformedDirectory => Severity::Error,
            DiagnosticKind::MalformedLeader
            | DiagnosticKind::UnmappableCharacter
            | DiagnosticKind::MalformedEscapeSequence
            | DiagnosticKind::RecordLengthMismatch
            | DiagnosticKind::FieldLengthMismatch
            | DiagnosticKind::MissingSubfieldDelimiter
            | DiagnosticKind::TruncatedRecord => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Maps each [`DiagnosticKind`] to the [`Severity`] it is raised with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticPolicy {
    overrides: HashMap<DiagnosticKind, Severity>,
}

impl DiagnosticPolicy {
    /// Policy using every kind's default severity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the severity of one kind.
    #[must_use]
    pub fn with_severity(mut self, kind: DiagnosticKind, severity: Severity) -> Self {
        self.overrides.insert(kind, severity);
        self
    }

    /// Policy that treats every condition as fatal.
    #[must_use]
    pub fn strict() -> Self {
        use DiagnosticKind as K;
        [
            K::MalformedLeader,
            K::IllegalTag,
            K::IllegalIndicator,
            K::IllegalDataElement,
            K::DirectoryOverrun,
            K::UnmappableCharacter,
            K::MalformedEscapeSequence,
            K::RecordLengthMismatch,
            K::FieldLengthMismatch,
            K::MalformedDirectory,
            K::MissingSubfieldDelimiter,
            K::TruncatedRecord,
        ]
        .into_iter()
        .fold(Self::default(), |policy, kind| {
            policy.with_severity(kind, Severity::Fatal)
        })
    }

    /// Effective severity for a kind.
    #[must_use]
    pub fn severity(&self, kind: DiagnosticKind) -> Severity {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_severity())
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// What went wrong.
    pub kind: DiagnosticKind,
    /// How it was treated.
    pub severity: Severity,
    /// Human readable detail.
    pub message: String,
    /// Absolute byte offset in the input stream.
    pub position: u64,
    /// Control number (001) of the record, when known.
    pub record_id: Option<String>,
    /// Tag of the field involved, if any.
    pub tag: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} at byte {}", self.severity, self.kind, self.position)?;
        if let Some(id) = &self.record_id {
            write!(f, " (record {id})")?;
        }
        if let Some(tag) = &self.tag {
            write!(f, " [field {tag}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Receiver for diagnostics.
///
/// The default methods discard everything.
#[allow(unused_variables)]
pub trait DiagnosticSink {
    /// A recoverable problem.
    fn on_warning(&mut self, diagnostic: &Diagnostic) {}

    /// A problem that cost the current record.
    fn on_error(&mut self, diagnostic: &Diagnostic) {}

    /// A problem that stops the stream.
    fn on_fatal(&mut self, diagnostic: &Diagnostic) {}

    /// Dispatch on the diagnostic's severity.
    fn report(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => self.on_warning(diagnostic),
            Severity::Error => self.on_error(diagnostic),
            Severity::Fatal => self.on_fatal(diagnostic),
        }
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: &Diagnostic) {
        (**self).report(diagnostic);
    }

    fn on_warning(&mut self, diagnostic: &Diagnostic) {
        (**self).on_warning(diagnostic);
    }

    fn on_error(&mut self, diagnostic: &Diagnostic) {
        (**self).on_error(diagnostic);
    }

    fn on_fatal(&mut self, diagnostic: &Diagnostic) {
        (**self).on_fatal(diagnostic);
    }
}

/// Drops every diagnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl DiagnosticSink for DiscardSink {}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    /// Diagnostics in the order they were raised.
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics of one kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// Number of diagnostics with the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Returns `true` if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl DiagnosticSink for CollectingSink {
    fn on_warning(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
    }

    fn on_error(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
    }

    fn on_fatal(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
    }
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl DiagnosticSink for LoggingSink {
    fn on_warning(&mut self, d: &Diagnostic) {
        warn!(
            kind = %d.kind,
            position = d.position,
            record_id = d.record_id.as_deref(),
            tag = d.tag.as_deref(),
            "{}",
            d.message
        );
    }

    fn on_error(&mut self, d: &Diagnostic) {
        error!(
            kind = %d.kind,
            position = d.position,
            record_id = d.record_id.as_deref(),
            tag = d.tag.as_deref(),
            "record skipped: {}",
            d.message
        );
    }

    fn on_fatal(&mut self, d: &Diagnostic) {
        error!(
            kind = %d.kind,
            position = d.position,
            record_id = d.record_id.as_deref(),
            tag = d.tag.as_deref(),
            "stream aborted: {}",
            d.message
        );
    }
}
