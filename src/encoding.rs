//! Character encoding support for MARC records.
//!
//! MARC records can use different character encodings:
//! - **MARC-8** (legacy) - mixed character sets switched by escape sequences
//! - **UTF-8** (modern) - Unicode
//!
//! The encoding is indicated in position 9 of the MARC leader:
//! - Space character = MARC-8
//! - 'a' = UTF-8
//!
//! The decoder passes every control field payload and every subfield payload
//! through a [`CharacterConverter`]. Converters never fail: characters they
//! cannot map are passed through and reported as [`ConversionIssue`]s, which
//! the reader turns into diagnostics.

use crate::diagnostics::DiagnosticKind;
use crate::marc8::Marc8Converter;
use std::fmt;

/// Character encoding for MARC records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarcEncoding {
    /// MARC-8 encoding (legacy, mixed character sets)
    Marc8,
    /// UTF-8 encoding (modern standard)
    Utf8,
}

impl MarcEncoding {
    /// Detect encoding from the leader character coding position (09).
    ///
    /// Returns `None` for values other than space and `a`.
    #[must_use]
    pub fn from_leader_char(c: char) -> Option<Self> {
        match c {
            ' ' => Some(MarcEncoding::Marc8),
            'a' => Some(MarcEncoding::Utf8),
            _ => None,
        }
    }

    /// Get the leader character for this encoding
    #[must_use]
    pub fn as_leader_char(self) -> char {
        match self {
            MarcEncoding::Marc8 => ' ',
            MarcEncoding::Utf8 => 'a',
        }
    }

    /// A fresh converter for this encoding.
    #[must_use]
    pub fn converter(self) -> Box<dyn CharacterConverter> {
        match self {
            MarcEncoding::Marc8 => Box::new(Marc8Converter::new()),
            MarcEncoding::Utf8 => Box::new(Utf8Converter::new()),
        }
    }
}

/// A problem met while converting one data element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionIssue {
    /// [`DiagnosticKind::UnmappableCharacter`] or
    /// [`DiagnosticKind::MalformedEscapeSequence`].
    pub kind: DiagnosticKind,
    /// Offset of the offending code unit inside the element.
    pub offset: usize,
    /// Human readable detail.
    pub message: String,
}

impl ConversionIssue {
    pub(crate) fn unmappable(offset: usize, message: String) -> Self {
        ConversionIssue {
            kind: DiagnosticKind::UnmappableCharacter,
            offset,
            message,
        }
    }

    pub(crate) fn malformed_escape(offset: usize, message: String) -> Self {
        ConversionIssue {
            kind: DiagnosticKind::MalformedEscapeSequence,
            offset,
            message,
        }
    }
}

/// Pluggable conversion from a legacy encoding to Unicode.
///
/// One call converts one data element. Implementations may keep state between
/// calls (the MARC-8 register designations do); [`reset`](Self::reset) returns
/// them to the initial state.
pub trait CharacterConverter: fmt::Debug + Send {
    /// Convert raw bytes.
    fn convert_bytes(&mut self, bytes: &[u8]) -> String;

    /// Convert text whose characters up to U+00FF stand for single bytes.
    ///
    /// Characters above U+00FF are passed through unchanged.
    fn convert_text(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut run = Vec::new();
        for c in text.chars() {
            match u8::try_from(u32::from(c)) {
                Ok(b) => run.push(b),
                Err(_) => {
                    if !run.is_empty() {
                        out.push_str(&self.convert_bytes(&run));
                        run.clear();
                    }
                    out.push(c);
                },
            }
        }
        if !run.is_empty() {
            out.push_str(&self.convert_bytes(&run));
        }
        out
    }

    /// Convert a character sequence, following the rules of
    /// [`convert_text`](Self::convert_text).
    fn convert_chars(&mut self, chars: &[char]) -> Vec<char> {
        let text: String = chars.iter().collect();
        self.convert_text(&text).chars().collect()
    }

    /// Return to the initial state.
    fn reset(&mut self) {}

    /// Drain the issues raised since the last call.
    fn take_issues(&mut self) -> Vec<ConversionIssue> {
        Vec::new()
    }
}

/// ISO 8859-1 identity: every byte becomes the code point of the same value.
#[derive(Debug, Default, Clone, Copy)]
pub struct Latin1Converter;

impl Latin1Converter {
    /// Create the converter.
    #[must_use]
    pub fn new() -> Self {
        Latin1Converter
    }
}

impl CharacterConverter for Latin1Converter {
    fn convert_bytes(&mut self, bytes: &[u8]) -> String {
        latin1(bytes)
    }

    fn convert_text(&mut self, text: &str) -> String {
        text.to_string()
    }
}

/// Decodes UTF-8 payloads, replacing invalid sequences with U+FFFD.
#[derive(Debug, Default, Clone)]
pub struct Utf8Converter {
    issues: Vec<ConversionIssue>,
}

impl Utf8Converter {
    /// Create the converter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CharacterConverter for Utf8Converter {
    fn convert_bytes(&mut self, bytes: &[u8]) -> String {
        match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(e) => {
                self.issues.push(ConversionIssue::unmappable(
                    e.valid_up_to(),
                    format!("invalid UTF-8 sequence at offset {}", e.valid_up_to()),
                ));
                String::from_utf8_lossy(bytes).into_owned()
            },
        }
    }

    fn convert_text(&mut self, text: &str) -> String {
        text.to_string()
    }

    fn reset(&mut self) {
        self.issues.clear();
    }

    fn take_issues(&mut self) -> Vec<ConversionIssue> {
        std::mem::take(&mut self.issues)
    }
}

/// Map each byte to the code point of the same value.
pub(crate) fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_from_leader() {
        assert_eq!(MarcEncoding::from_leader_char(' '), Some(MarcEncoding::Marc8));
        assert_eq!(MarcEncoding::from_leader_char('a'), Some(MarcEncoding::Utf8));
        assert_eq!(MarcEncoding::from_leader_char('z'), None);
        assert_eq!(MarcEncoding::Utf8.as_leader_char(), 'a');
    }

    #[test]
    fn test_latin1_identity() {
        let mut conv = Latin1Converter::new();
        assert_eq!(conv.convert_bytes(b"Caf\xE9"), "Café");
        assert_eq!(conv.convert_bytes(b""), "");
        assert!(conv.take_issues().is_empty());
    }

    #[test]
    fn test_utf8_valid() {
        let mut conv = Utf8Converter::new();
        assert_eq!(conv.convert_bytes("Café".as_bytes()), "Café");
        assert!(conv.take_issues().is_empty());
    }

    #[test]
    fn test_utf8_invalid_is_lossy_with_issue() {
        let mut conv = Utf8Converter::new();
        assert_eq!(conv.convert_bytes(b"ab\xFFc"), "ab\u{FFFD}c");
        let issues = conv.take_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, DiagnosticKind::UnmappableCharacter);
        assert_eq!(issues[0].offset, 2);
        assert!(conv.take_issues().is_empty());
    }

    #[test]
    fn test_default_convert_text_splits_wide_characters() {
        #[derive(Debug)]
        struct Upper;
        impl CharacterConverter for Upper {
            fn convert_bytes(&mut self, bytes: &[u8]) -> String {
                latin1(bytes).to_uppercase()
            }
        }

        let mut conv = Upper;
        assert_eq!(conv.convert_text("ab\u{4E2D}cd"), "AB\u{4E2D}CD");
        assert_eq!(conv.convert_chars(&['x', 'y']), vec!['X', 'Y']);
    }
}
