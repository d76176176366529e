//! MARC-8 to Unicode conversion and back.
//!
//! MARC-8 multiplexes several 8-bit character sets through ISO 2022 style escape
//! sequences. Two registers are active at any time:
//!
//! - **G0** serves code points 0x21-0x7E (initially Basic Latin)
//! - **G1** serves code points 0xA1-0xFE (initially ANSEL Extended Latin)
//!
//! Diacritics are non-spacing marks written *before* the base character they
//! modify, while Unicode writes them *after*. [`Marc8Converter`] buffers marks
//! and emits them behind the next base character, keeping their relative order.
//!
//! # Examples
//!
//! ```
//! use marcflow::{CharacterConverter, Marc8Converter};
//!
//! let mut conv = Marc8Converter::new();
//! // ANSEL 0xE2 is the combining acute accent.
//! assert_eq!(conv.convert_bytes(b"Caf\xE2e"), "Cafe\u{301}");
//! // ESC b switches G0 to subscripts, ESC s switches back.
//! assert_eq!(conv.convert_bytes(b"H\x1bb2\x1bsO"), "H\u{2082}O");
//! ```

use crate::encoding::{CharacterConverter, ConversionIssue};
use crate::error::{MarcError, Result};
use crate::marc8_tables::{CharacterSetId, CodeEntry, CodeTable};
use smallvec::SmallVec;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

const ESC: u32 = 0x1B;
const SPACE: u32 = 0x20;

/// Which register an escape sequence designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Register {
    G0,
    G1,
}

/// A recognised escape sequence: how many code units it spans and what it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Designation {
    len: usize,
    register: Register,
    set: CharacterSetId,
}

/// Parse the escape sequence starting at `units[0]` (which is ESC).
///
/// Returns `None` when the sequence is truncated or not understood.
fn parse_escape(units: &[u32]) -> Option<Designation> {
    let byte = |i: usize| units.get(i).and_then(|&u| u8::try_from(u).ok());

    let locking = |set| Designation {
        len: 2,
        register: Register::G0,
        set,
    };
    match byte(1)? {
        b's' => return Some(locking(CharacterSetId::BasicLatin)),
        b'g' => return Some(locking(CharacterSetId::GreekSymbols)),
        b'b' => return Some(locking(CharacterSetId::Subscript)),
        b'p' => return Some(locking(CharacterSetId::Superscript)),
        _ => {},
    }

    let (register, mut pos) = match byte(1)? {
        b'(' | b',' => (Register::G0, 2),
        b')' | b'-' => (Register::G1, 2),
        b'$' => match byte(2)? {
            b'(' | b',' => (Register::G0, 3),
            b')' | b'-' => (Register::G1, 3),
            _ => (Register::G0, 2),
        },
        _ => return None,
    };
    if byte(pos)? == b'!' {
        pos += 1;
    }
    let final_byte = byte(pos)?;
    if !(0x30..=0x7E).contains(&final_byte) {
        return None;
    }
    Some(Designation {
        len: pos + 1,
        register,
        set: CharacterSetId::from_final_byte(final_byte),
    })
}

/// Converts MARC-8 data elements to Unicode.
///
/// Register designations persist between calls until [`reset`](CharacterConverter::reset).
#[derive(Debug, Clone)]
pub struct Marc8Converter {
    table: Arc<CodeTable>,
    g0: CharacterSetId,
    g1: CharacterSetId,
    normalize: bool,
    issues: Vec<ConversionIssue>,
}

impl Default for Marc8Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Marc8Converter {
    /// Converter over the standard MARC-8 table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_table(CodeTable::marc8())
    }

    /// Converter over a custom table.
    #[must_use]
    pub fn with_table(table: Arc<CodeTable>) -> Self {
        Marc8Converter {
            table,
            g0: CharacterSetId::BasicLatin,
            g1: CharacterSetId::AnselExtendedLatin,
            normalize: false,
            issues: Vec::new(),
        }
    }

    /// Apply Unicode NFC normalization to every converted element.
    #[must_use]
    pub fn with_nfc(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Set currently designated to G0.
    #[must_use]
    pub fn g0(&self) -> CharacterSetId {
        self.g0
    }

    /// Set currently designated to G1.
    #[must_use]
    pub fn g1(&self) -> CharacterSetId {
        self.g1
    }

    fn convert_units(&mut self, units: &[u32]) -> String {
        let mut out = String::with_capacity(units.len());
        let mut marks: SmallVec<[char; 4]> = SmallVec::new();
        let mut i = 0;

        while i < units.len() {
            let c = units[i];

            if c == ESC {
                if let Some(d) = parse_escape(&units[i..]) {
                    match d.register {
                        Register::G0 => self.g0 = d.set,
                        Register::G1 => self.g1 = d.set,
                    }
                    i += d.len;
                } else {
                    self.issues.push(ConversionIssue::malformed_escape(
                        i,
                        "escape sequence is truncated or not recognised".to_string(),
                    ));
                    out.extend(marks.drain(..));
                    out.push('\u{1B}');
                    i += 1;
                }
                continue;
            }

            // Controls close any pending run of marks.
            if c < SPACE || c == 0x7F {
                out.extend(marks.drain(..));
                out.extend(char::from_u32(c));
                i += 1;
                continue;
            }

            if c == SPACE || c > 0xFF {
                out.push(char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER));
                out.extend(marks.drain(..));
                i += 1;
                continue;
            }

            let set = if c <= 0x7E { self.g0 } else { self.g1 };
            let (entry, consumed) = if set.is_multibyte() {
                let end = (i + 3).min(units.len());
                let code = units[i..end].iter().fold(0u32, |acc, &u| (acc << 8) | (u & 0xFF));
                let entry = if end - i == 3 { self.lookup(set, code) } else { None };
                (entry, end - i)
            } else {
                (self.lookup(set, c), 1)
            };

            match entry {
                Some(e) if e.combining => marks.push(e.ch),
                Some(e) => {
                    out.push(e.ch);
                    out.extend(marks.drain(..));
                },
                None => {
                    self.issues.push(ConversionIssue::unmappable(
                        i,
                        format!("0x{c:02X} has no mapping in {set:?}"),
                    ));
                    out.extend(units[i..i + consumed].iter().filter_map(|&u| char::from_u32(u)));
                    out.extend(marks.drain(..));
                },
            }
            i += consumed;
        }

        // Marks with no base follow as they are.
        out.extend(marks);

        if self.normalize {
            out.nfc().collect()
        } else {
            out
        }
    }

    /// Look a code point up, retrying with the high bit toggled. Each byte
    /// of a multibyte character carries its own high bit, so all three are
    /// cleared (or set, if none was).
    fn lookup(&self, set: CharacterSetId, code: u32) -> Option<CodeEntry> {
        let retry = if !set.is_multibyte() {
            code ^ 0x80
        } else if code & 0x80_80_80 == 0 {
            code | 0x80_80_80
        } else {
            code & 0x7F_7F_7F
        };
        self.table
            .lookup(set, code)
            .or_else(|| self.table.lookup(set, retry))
    }
}

impl CharacterConverter for Marc8Converter {
    fn convert_bytes(&mut self, bytes: &[u8]) -> String {
        let units: Vec<u32> = bytes.iter().map(|&b| u32::from(b)).collect();
        self.convert_units(&units)
    }

    fn convert_text(&mut self, text: &str) -> String {
        let units: Vec<u32> = text.chars().map(u32::from).collect();
        self.convert_units(&units)
    }

    fn reset(&mut self) {
        self.g0 = CharacterSetId::BasicLatin;
        self.g1 = CharacterSetId::AnselExtendedLatin;
    }

    fn take_issues(&mut self) -> Vec<ConversionIssue> {
        std::mem::take(&mut self.issues)
    }
}

/// Converts Unicode text to MARC-8 bytes.
///
/// Text is decomposed (NFD) so that accented letters become a base plus marks;
/// each base is written after its marks, and escape sequences are inserted
/// whenever a character lives in a set other than the one designated. Every
/// element ends with G0 = Basic Latin and G1 = ANSEL.
#[derive(Debug, Clone)]
pub struct Marc8Encoder {
    table: Arc<CodeTable>,
}

impl Default for Marc8Encoder {
    fn default() -> Self {
        Self::new()
    }
}

struct EncoderState {
    out: Vec<u8>,
    g0: CharacterSetId,
    g1: CharacterSetId,
}

impl EncoderState {
    fn designate_g0(&mut self, set: CharacterSetId) {
        if self.g0 == set {
            return;
        }
        if set.is_technique1() {
            self.out.extend_from_slice(&[0x1B, set.final_byte()]);
        } else if set == CharacterSetId::BasicLatin && self.g0.is_technique1() {
            self.out.extend_from_slice(b"\x1Bs");
        } else if set.is_multibyte() {
            self.out.extend_from_slice(&[0x1B, b'$', set.final_byte()]);
        } else {
            self.out.extend_from_slice(&[0x1B, b'(', set.final_byte()]);
        }
        self.g0 = set;
    }

    fn designate_g1(&mut self, set: CharacterSetId) {
        if self.g1 == set {
            return;
        }
        if set.is_multibyte() {
            self.out.extend_from_slice(&[0x1B, b'$', b')', set.final_byte()]);
        } else {
            self.out.extend_from_slice(&[0x1B, b')', set.final_byte()]);
        }
        self.g1 = set;
    }
}

impl Marc8Encoder {
    /// Encoder over the standard MARC-8 table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_table(CodeTable::marc8())
    }

    /// Encoder over a custom table.
    #[must_use]
    pub fn with_table(table: Arc<CodeTable>) -> Self {
        Marc8Encoder { table }
    }

    /// Encode one data element.
    ///
    /// # Errors
    ///
    /// Returns `UnmappableCharacter` for a character no table set contains.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let mut state = EncoderState {
            out: Vec::with_capacity(text.len()),
            g0: CharacterSetId::BasicLatin,
            g1: CharacterSetId::AnselExtendedLatin,
        };
        let mut marks: SmallVec<[char; 4]> = SmallVec::new();
        let mut base: Option<char> = None;

        for c in text.nfd() {
            if self.is_mark(c) {
                marks.push(c);
                continue;
            }
            self.flush(&mut state, &mut base, &mut marks)?;
            base = Some(c);
        }
        self.flush(&mut state, &mut base, &mut marks)?;

        state.designate_g0(CharacterSetId::BasicLatin);
        state.designate_g1(CharacterSetId::AnselExtendedLatin);
        Ok(state.out)
    }

    /// Write the pending marks, then the base they follow in Unicode order.
    fn flush(
        &self,
        state: &mut EncoderState,
        base: &mut Option<char>,
        marks: &mut SmallVec<[char; 4]>,
    ) -> Result<()> {
        for m in marks.drain(..) {
            self.encode_char(state, m)?;
        }
        if let Some(b) = base.take() {
            self.encode_char(state, b)?;
        }
        Ok(())
    }

    fn is_mark(&self, c: char) -> bool {
        self.table
            .find(c)
            .is_some_and(|(set, code)| self.table.is_combining(set, code))
    }

    fn encode_char(&self, state: &mut EncoderState, c: char) -> Result<()> {
        if c == '\u{1B}' {
            // A literal ESC would read back as the start of an escape sequence.
            return Err(MarcError::UnmappableCharacter(
                "U+001B cannot be written as data in MARC-8".to_string(),
            ));
        }
        let code = u32::from(c);
        if code <= u32::from(b' ') {
            state.out.push(u8::try_from(code).unwrap_or(b' '));
            return Ok(());
        }
        let (set, code) = self.table.find(c).ok_or_else(|| {
            MarcError::UnmappableCharacter(format!("U+{code:04X} has no MARC-8 representation"))
        })?;

        if set.is_multibyte() {
            if (code & 0x80_0000) == 0 {
                state.designate_g0(set);
            } else {
                state.designate_g1(set);
            }
            state.out.extend_from_slice(&code.to_be_bytes()[1..]);
            return Ok(());
        }

        let byte = u8::try_from(code).map_err(|_| {
            MarcError::UnmappableCharacter(format!("code 0x{code:X} in {set:?} is not one byte"))
        })?;
        if byte <= 0x7E {
            state.designate_g0(set);
        } else {
            state.designate_g1(set);
        }
        state.out.push(byte);
        Ok(())
    }
}
