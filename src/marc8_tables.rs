//! MARC-8 character set tables.
//!
//! A [`CodeTable`] maps a code point in a named character set to a Unicode
//! character, together with a flag telling whether the character is a
//! non-spacing (combining) mark. The standard table is built once per process
//! and shared read-only between every converter through an `Arc`.
//!
//! Shipped sets: Basic Latin (ASCII), ANSEL Extended Latin and the three MARC-8
//! technique-1 sets (subscripts, superscripts, Greek symbols). Other national
//! sets can be supplied through [`CodeTable::builder`].

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifier of a MARC-8 graphic character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterSetId {
    /// Basic Latin (ASCII), final byte `B`.
    BasicLatin,
    /// ANSEL Extended Latin, final byte `E`.
    AnselExtendedLatin,
    /// Basic Hebrew, final byte `2`.
    BasicHebrew,
    /// Basic Arabic, final byte `3`.
    BasicArabic,
    /// Extended Arabic, final byte `4`.
    ExtendedArabic,
    /// Basic Cyrillic, final byte `N`.
    BasicCyrillic,
    /// Extended Cyrillic, final byte `Q`.
    ExtendedCyrillic,
    /// Basic Greek, final byte `S`.
    BasicGreek,
    /// Subscripts, locking escape `ESC b`.
    Subscript,
    /// Superscripts, locking escape `ESC p`.
    Superscript,
    /// Greek symbols, locking escape `ESC g`.
    GreekSymbols,
    /// East Asian Character Code, final byte `1` (three bytes per character).
    Eacc,
    /// A set this crate has no name for, identified by its final byte.
    Other(u8),
}

impl CharacterSetId {
    /// Resolve the final byte of a designation escape sequence.
    #[must_use]
    pub fn from_final_byte(byte: u8) -> Self {
        match byte {
            b'B' => CharacterSetId::BasicLatin,
            b'E' => CharacterSetId::AnselExtendedLatin,
            b'2' => CharacterSetId::BasicHebrew,
            b'3' => CharacterSetId::BasicArabic,
            b'4' => CharacterSetId::ExtendedArabic,
            b'N' => CharacterSetId::BasicCyrillic,
            b'Q' => CharacterSetId::ExtendedCyrillic,
            b'S' => CharacterSetId::BasicGreek,
            b'b' => CharacterSetId::Subscript,
            b'p' => CharacterSetId::Superscript,
            b'g' => CharacterSetId::GreekSymbols,
            b'1' => CharacterSetId::Eacc,
            other => CharacterSetId::Other(other),
        }
    }

    /// Final byte identifying this set in a designation escape sequence.
    #[must_use]
    pub fn final_byte(self) -> u8 {
        match self {
            CharacterSetId::BasicLatin => b'B',
            CharacterSetId::AnselExtendedLatin => b'E',
            CharacterSetId::BasicHebrew => b'2',
            CharacterSetId::BasicArabic => b'3',
            CharacterSetId::ExtendedArabic => b'4',
            CharacterSetId::BasicCyrillic => b'N',
            CharacterSetId::ExtendedCyrillic => b'Q',
            CharacterSetId::BasicGreek => b'S',
            CharacterSetId::Subscript => b'b',
            CharacterSetId::Superscript => b'p',
            CharacterSetId::GreekSymbols => b'g',
            CharacterSetId::Eacc => b'1',
            CharacterSetId::Other(b) => b,
        }
    }

    /// Returns `true` for sets encoded with three bytes per character.
    #[must_use]
    pub fn is_multibyte(self) -> bool {
        self == CharacterSetId::Eacc
    }

    /// Returns `true` for the sets selected by a two-byte locking escape
    /// (`ESC b`, `ESC p`, `ESC g`).
    #[must_use]
    pub fn is_technique1(self) -> bool {
        matches!(
            self,
            CharacterSetId::Subscript | CharacterSetId::Superscript | CharacterSetId::GreekSymbols
        )
    }
}

/// One table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeEntry {
    /// Unicode character the code point maps to.
    pub ch: char,
    /// Whether the character is a non-spacing mark.
    pub combining: bool,
}

/// Immutable lookup from `(set, code point)` to Unicode, plus the reverse
/// direction used by the encoder.
#[derive(Debug, Clone, Default)]
pub struct CodeTable {
    forward: HashMap<(CharacterSetId, u32), CodeEntry>,
    reverse: HashMap<char, (CharacterSetId, u32)>,
}

lazy_static! {
    static ref MARC8_TABLE: Arc<CodeTable> = Arc::new(build_marc8());
}

impl CodeTable {
    /// The standard MARC-8 table, shared by every converter in the process.
    #[must_use]
    pub fn marc8() -> Arc<CodeTable> {
        Arc::clone(&MARC8_TABLE)
    }

    /// Start an empty table.
    #[must_use]
    pub fn builder() -> CodeTableBuilder {
        CodeTableBuilder::default()
    }

    /// Look up a code point in a set.
    #[must_use]
    pub fn lookup(&self, set: CharacterSetId, code: u32) -> Option<CodeEntry> {
        self.forward.get(&(set, code)).copied()
    }

    /// Whether the code point is a combining mark in that set.
    #[must_use]
    pub fn is_combining(&self, set: CharacterSetId, code: u32) -> bool {
        self.lookup(set, code).is_some_and(|e| e.combining)
    }

    /// Find the set and code point encoding a Unicode character.
    ///
    /// When several sets contain the character, the one registered first wins.
    #[must_use]
    pub fn find(&self, ch: char) -> Option<(CharacterSetId, u32)> {
        self.reverse.get(&ch).copied()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Builder for custom [`CodeTable`]s.
#[derive(Debug, Default)]
pub struct CodeTableBuilder {
    table: CodeTable,
}

impl CodeTableBuilder {
    /// Add a spacing character.
    #[must_use]
    pub fn insert(self, set: CharacterSetId, code: u32, ch: char) -> Self {
        self.entry(set, code, ch, false)
    }

    /// Add a combining mark.
    #[must_use]
    pub fn insert_combining(self, set: CharacterSetId, code: u32, ch: char) -> Self {
        self.entry(set, code, ch, true)
    }

    /// Add a run of consecutive code points.
    #[must_use]
    pub fn insert_range(mut self, set: CharacterSetId, first: u32, chars: &[char]) -> Self {
        for (code, &ch) in (first..).zip(chars) {
            self = self.insert(set, code, ch);
        }
        self
    }

    /// Add a run of consecutive combining marks.
    #[must_use]
    pub fn insert_combining_range(
        mut self,
        set: CharacterSetId,
        first: u32,
        chars: &[char],
    ) -> Self {
        for (code, &ch) in (first..).zip(chars) {
            self = self.insert_combining(set, code, ch);
        }
        self
    }

    fn entry(mut self, set: CharacterSetId, code: u32, ch: char, combining: bool) -> Self {
        self.table.forward.insert((set, code), CodeEntry { ch, combining });
        self.table.reverse.entry(ch).or_insert((set, code));
        self
    }

    /// Finish the table.
    #[must_use]
    pub fn build(self) -> CodeTable {
        self.table
    }
}

const ANSEL_SPACING_A1: [char; 14] = [
    'Ł', 'Ø', 'Đ', 'Þ', 'Æ', 'Œ', '\u{02B9}', '·', '♭', '®', '±', 'Ơ', 'Ư', '\u{02BC}',
];

const ANSEL_SPACING_B0: [char; 11] = [
    '\u{02BB}', 'ł', 'ø', 'đ', 'þ', 'æ', 'œ', '\u{02BA}', 'ı', '£', 'ð',
];

const ANSEL_SPACING_C0: [char; 9] = ['°', 'ℓ', '℗', '©', '♯', '¿', '¡', 'ß', '€'];

const ANSEL_COMBINING_E0: [char; 16] = [
    '\u{0309}', '\u{0300}', '\u{0301}', '\u{0302}', '\u{0303}', '\u{0304}', '\u{0306}', '\u{0307}',
    '\u{0308}', '\u{030C}', '\u{030A}', '\u{FE20}', '\u{FE21}', '\u{0315}', '\u{030B}', '\u{0310}',
];

const ANSEL_COMBINING_F0: [char; 12] = [
    '\u{0327}', '\u{0328}', '\u{0323}', '\u{0324}', '\u{0325}', '\u{0333}', '\u{0332}', '\u{0326}',
    '\u{031C}', '\u{032E}', '\u{FE22}', '\u{FE23}',
];

const SUBSCRIPT_DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];

const SUPERSCRIPT_DIGITS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];

fn build_marc8() -> CodeTable {
    use CharacterSetId as S;

    let ascii: Vec<char> = (0x21u8..=0x7E).map(char::from).collect();

    CodeTable::builder()
        .insert_range(S::BasicLatin, 0x21, &ascii)
        .insert(S::AnselExtendedLatin, 0x88, '\u{0098}')
        .insert(S::AnselExtendedLatin, 0x89, '\u{009C}')
        .insert(S::AnselExtendedLatin, 0x8D, '\u{200D}')
        .insert(S::AnselExtendedLatin, 0x8E, '\u{200C}')
        .insert_range(S::AnselExtendedLatin, 0xA1, &ANSEL_SPACING_A1)
        .insert_range(S::AnselExtendedLatin, 0xB0, &ANSEL_SPACING_B0)
        // 0xBB is unassigned
        .insert(S::AnselExtendedLatin, 0xBC, 'ơ')
        .insert(S::AnselExtendedLatin, 0xBD, 'ư')
        .insert_range(S::AnselExtendedLatin, 0xC0, &ANSEL_SPACING_C0)
        .insert_combining_range(S::AnselExtendedLatin, 0xE0, &ANSEL_COMBINING_E0)
        .insert_combining_range(S::AnselExtendedLatin, 0xF0, &ANSEL_COMBINING_F0)
        .insert_combining(S::AnselExtendedLatin, 0xFE, '\u{0313}')
        .insert_range(S::Subscript, 0x30, &SUBSCRIPT_DIGITS)
        .insert(S::Subscript, 0x28, '₍')
        .insert(S::Subscript, 0x29, '₎')
        .insert(S::Subscript, 0x2B, '₊')
        .insert(S::Subscript, 0x2D, '₋')
        .insert_range(S::Superscript, 0x30, &SUPERSCRIPT_DIGITS)
        .insert(S::Superscript, 0x28, '⁽')
        .insert(S::Superscript, 0x29, '⁾')
        .insert(S::Superscript, 0x2B, '⁺')
        .insert(S::Superscript, 0x2D, '⁻')
        .insert(S::GreekSymbols, 0x61, 'α')
        .insert(S::GreekSymbols, 0x62, 'β')
        .insert(S::GreekSymbols, 0x63, 'γ')
        .build()
}
