//! MARC record leader parsing and formatting.
//!
//! The leader is the 24-character label at the start of every ISO 2709 record.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Type of record
//! - Positions 7-8: Implementation defined (bibliographic level, type of control)
//! - Position 9: Character coding scheme (space = MARC-8, a = UCS/Unicode)
//! - Position 10: Indicator count (1 digit)
//! - Position 11: Subfield code length (1 digit)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Implementation defined
//! - Positions 20-23: Entry map (usually "4500")
//!
//! Parsing is tolerant: a numeric run holding anything but digits is replaced by a
//! default (0 for lengths and addresses, 2 for the counts) rather than rejected.
//! [`Leader::unmarshal_lenient`] reports which positions were substituted.

use crate::error::{MarcError, Result};
use crate::record::is_structural_code;
use serde::{Deserialize, Serialize};

/// Length of a leader in characters.
pub const LEADER_LEN: usize = 24;

const DEFAULT_RECORD_LENGTH: u32 = 0;
const DEFAULT_INDICATOR_COUNT: u8 = 2;
const DEFAULT_SUBFIELD_CODE_LENGTH: u8 = 2;
const DEFAULT_BASE_ADDRESS: u32 = 0;

/// MARC Leader - 24 characters at the start of every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status - position 5
    pub record_status: char,
    /// Type of record - position 6
    pub type_of_record: char,
    /// Implementation defined - positions 7-8
    pub impl_defined1: [char; 2],
    /// Character coding scheme - position 9
    pub char_coding_scheme: char,
    /// Indicator count (1 digit) - position 10
    pub indicator_count: u8,
    /// Subfield code length (1 digit) - position 11
    pub subfield_code_length: u8,
    /// Base address of data (5 digits) - positions 12-16
    pub base_address_of_data: u32,
    /// Implementation defined - positions 17-19
    pub impl_defined2: [char; 3],
    /// Entry map - positions 20-23
    pub entry_map: [char; 4],
}

/// A numeric leader position that was replaced by its default while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderDefault {
    /// Positions 0-4 were not digits; record length set to 0.
    RecordLength,
    /// Position 10 was not a digit; indicator count set to 2.
    IndicatorCount,
    /// Position 11 was not a digit; subfield code length set to 2.
    SubfieldCodeLength,
    /// Positions 12-16 were not digits; base address set to 0.
    BaseAddressOfData,
}

impl LeaderDefault {
    /// First leader position covered by the substituted value.
    #[must_use]
    pub fn position(self) -> usize {
        match self {
            LeaderDefault::RecordLength => 0,
            LeaderDefault::IndicatorCount => 10,
            LeaderDefault::SubfieldCodeLength => 11,
            LeaderDefault::BaseAddressOfData => 12,
        }
    }

    /// Human readable name of the substituted value.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            LeaderDefault::RecordLength => "record length",
            LeaderDefault::IndicatorCount => "indicator count",
            LeaderDefault::SubfieldCodeLength => "subfield code length",
            LeaderDefault::BaseAddressOfData => "base address of data",
        }
    }
}

impl Default for Leader {
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: 'n',
            type_of_record: 'a',
            impl_defined1: ['m', ' '],
            char_coding_scheme: ' ',
            indicator_count: 2,
            subfield_code_length: 2,
            base_address_of_data: 0,
            impl_defined2: [' ', ' ', ' '],
            entry_map: ['4', '5', '0', '0'],
        }
    }
}

impl Leader {
    /// Parse a leader from its 24-character text form.
    ///
    /// # Errors
    ///
    /// Returns `MalformedLeader` if `text` is not exactly 24 characters and
    /// `IllegalDataElement` if a character position holds a structural control code.
    pub fn unmarshal(text: &str) -> Result<Self> {
        Self::unmarshal_lenient(text).map(|(leader, _)| leader)
    }

    /// Parse a leader, also reporting numeric positions replaced by defaults.
    ///
    /// # Errors
    ///
    /// Same as [`Leader::unmarshal`].
    pub fn unmarshal_lenient(text: &str) -> Result<(Self, Vec<LeaderDefault>)> {
        let chars: Vec<char> = text.chars().collect();
        Self::from_chars(&chars)
    }

    /// Parse a leader from 24 raw bytes, each byte read as one character.
    ///
    /// # Errors
    ///
    /// Same as [`Leader::unmarshal`].
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, Vec<LeaderDefault>)> {
        let chars: Vec<char> = bytes.iter().map(|&b| char::from(b)).collect();
        Self::from_chars(&chars)
    }

    fn from_chars(c: &[char]) -> Result<(Self, Vec<LeaderDefault>)> {
        if c.len() != LEADER_LEN {
            return Err(MarcError::MalformedLeader(format!(
                "leader must be {LEADER_LEN} characters, got {}",
                c.len()
            )));
        }
        if let Some(pos) = c.iter().position(|&ch| is_structural_code(ch)) {
            return Err(MarcError::IllegalDataElement(format!(
                "leader position {pos} holds reserved control code 0x{:02X}",
                u32::from(c[pos])
            )));
        }

        let mut defaults = Vec::new();
        let record_length = parse_number(&c[0..5]).unwrap_or_else(|| {
            defaults.push(LeaderDefault::RecordLength);
            DEFAULT_RECORD_LENGTH
        });
        let indicator_count = parse_digit(c[10]).unwrap_or_else(|| {
            defaults.push(LeaderDefault::IndicatorCount);
            DEFAULT_INDICATOR_COUNT
        });
        let subfield_code_length = parse_digit(c[11]).unwrap_or_else(|| {
            defaults.push(LeaderDefault::SubfieldCodeLength);
            DEFAULT_SUBFIELD_CODE_LENGTH
        });
        let base_address_of_data = parse_number(&c[12..17]).unwrap_or_else(|| {
            defaults.push(LeaderDefault::BaseAddressOfData);
            DEFAULT_BASE_ADDRESS
        });

        let leader = Leader {
            record_length,
            record_status: c[5],
            type_of_record: c[6],
            impl_defined1: [c[7], c[8]],
            char_coding_scheme: c[9],
            indicator_count,
            subfield_code_length,
            base_address_of_data,
            impl_defined2: [c[17], c[18], c[19]],
            entry_map: [c[20], c[21], c[22], c[23]],
        };
        Ok((leader, defaults))
    }

    /// Format the leader as its 24-character text form.
    ///
    /// # Errors
    ///
    /// Returns `MalformedLeader` if a numeric value does not fit its fixed width
    /// and `IllegalDataElement` if a character position holds a structural
    /// control code.
    pub fn marshal(&self) -> Result<String> {
        let mut out = String::with_capacity(LEADER_LEN);
        out.push_str(&zero_padded(self.record_length, 5, "record length")?);
        out.push(self.record_status);
        out.push(self.type_of_record);
        out.extend(self.impl_defined1);
        out.push(self.char_coding_scheme);
        out.push_str(&zero_padded(self.indicator_count.into(), 1, "indicator count")?);
        out.push_str(&zero_padded(
            self.subfield_code_length.into(),
            1,
            "subfield code length",
        )?);
        out.push_str(&zero_padded(
            self.base_address_of_data,
            5,
            "base address of data",
        )?);
        out.extend(self.impl_defined2);
        out.extend(self.entry_map);

        if let Some(c) = out.chars().find(|&c| is_structural_code(c)) {
            return Err(MarcError::IllegalDataElement(format!(
                "leader holds reserved control code 0x{:02X}",
                u32::from(c)
            )));
        }
        Ok(out)
    }

    /// Serialize the leader to 24 bytes.
    ///
    /// # Errors
    ///
    /// Fails like [`Leader::marshal`], and with `MalformedLeader` if a character
    /// position does not fit in a single byte.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        self.marshal()?
            .chars()
            .map(|c| {
                u8::try_from(u32::from(c)).map_err(|_| {
                    MarcError::MalformedLeader(format!(
                        "character U+{:04X} does not fit in one byte",
                        u32::from(c)
                    ))
                })
            })
            .collect()
    }

    /// Bibliographic level (position 7).
    #[must_use]
    pub fn bibliographic_level(&self) -> char {
        self.impl_defined1[0]
    }
}

/// Format `value` as exactly `width` zero-padded decimal digits.
fn zero_padded(value: u32, width: usize, what: &str) -> Result<String> {
    let text = format!("{value:0width$}");
    if text.len() == width {
        Ok(text)
    } else {
        Err(MarcError::MalformedLeader(format!(
            "{what} {value} does not fit in {width} digit(s)"
        )))
    }
}

fn parse_number(chars: &[char]) -> Option<u32> {
    chars.iter().try_fold(0u32, |acc, c| {
        c.to_digit(10).map(|d| acc * 10 + d)
    })
}

fn parse_digit(c: char) -> Option<u8> {
    c.to_digit(10).and_then(|d| u8::try_from(d).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_unmarshal() {
        let leader = Leader::unmarshal("01234cam a2200289 a 4500").unwrap();

        assert_eq!(leader.record_length, 1234);
        assert_eq!(leader.record_status, 'c');
        assert_eq!(leader.type_of_record, 'a');
        assert_eq!(leader.impl_defined1, ['m', ' ']);
        assert_eq!(leader.char_coding_scheme, 'a');
        assert_eq!(leader.indicator_count, 2);
        assert_eq!(leader.subfield_code_length, 2);
        assert_eq!(leader.base_address_of_data, 289);
        assert_eq!(leader.impl_defined2, [' ', 'a', ' ']);
        assert_eq!(leader.entry_map, ['4', '5', '0', '0']);
        assert_eq!(leader.bibliographic_level(), 'm');
    }

    #[test]
    fn test_leader_roundtrip() {
        let text = "00714cam  2200205 a 4500";
        let leader = Leader::unmarshal(text).unwrap();
        assert_eq!(leader.marshal().unwrap(), text);
        assert_eq!(leader.as_bytes().unwrap(), text.as_bytes());
    }

    #[test]
    fn test_non_digit_record_length_defaults_to_zero() {
        let (leader, defaults) = Leader::unmarshal_lenient("0x714cam  2200205 a 4500").unwrap();
        assert_eq!(leader.record_length, 0);
        assert_eq!(leader.base_address_of_data, 205);
        assert_eq!(defaults, vec![LeaderDefault::RecordLength]);
    }

    #[test]
    fn test_all_numeric_defaults() {
        let (leader, defaults) = Leader::unmarshal_lenient("?????nam  ??ABCDE a 4500").unwrap();
        assert_eq!(leader.record_length, 0);
        assert_eq!(leader.indicator_count, 2);
        assert_eq!(leader.subfield_code_length, 2);
        assert_eq!(leader.base_address_of_data, 0);
        assert_eq!(defaults.len(), 4);
        assert_eq!(defaults[3].position(), 12);
    }

    #[test]
    fn test_subfield_code_length_read_from_position_11() {
        let leader = Leader::unmarshal("00100nam a2300025 a 4500").unwrap();
        assert_eq!(leader.indicator_count, 2);
        assert_eq!(leader.subfield_code_length, 3);
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        assert!(matches!(
            Leader::unmarshal("0123456789012"),
            Err(MarcError::MalformedLeader(_))
        ));
        assert!(Leader::from_bytes(&[b'0'; 25]).is_err());
    }

    #[test]
    fn test_structural_code_is_illegal() {
        let err = Leader::unmarshal("00714cam\u{1f} 2200205 a 4500").unwrap_err();
        assert!(matches!(err, MarcError::IllegalDataElement(_)), "got: {err}");
    }

    #[test]
    fn test_marshal_rejects_oversized_numbers() {
        let leader = Leader {
            record_length: 100_000,
            ..Leader::default()
        };
        assert!(matches!(leader.marshal(), Err(MarcError::MalformedLeader(_))));

        let leader = Leader {
            indicator_count: 12,
            ..Leader::default()
        };
        assert!(leader.marshal().is_err());
    }

    #[test]
    fn test_default_leader_marshals() {
        assert_eq!(Leader::default().marshal().unwrap(), "00000nam  2200000   4500");
    }

    #[test]
    fn test_as_bytes_rejects_wide_characters() {
        let leader = Leader {
            record_status: 'Ω',
            ..Leader::default()
        };
        assert!(leader.marshal().is_ok());
        assert!(leader.as_bytes().is_err());
    }
}
