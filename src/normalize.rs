//! Leader and indicator clean-up between the decoder and a consumer.
//!
//! [`NormalizingHandler`] wraps another [`MarcHandler`] and rewrites a few
//! values commonly found damaged in legacy files before passing the events on:
//!
//! - leader/06 (type of record): unknown values become `a`
//! - leader/07 (bibliographic level): `#` becomes blank, other unknown values
//!   become `m`
//! - indicators (opt-in): upper-case letters are lower-cased, anything that is
//!   not an ASCII letter or digit becomes blank
//!
//! The decoder never applies these corrections itself.
//!
//! # Examples
//!
//! ```
//! use marcflow::{Leader, MarcHandler, NormalizingHandler, RecordCollector};
//!
//! let mut collector = RecordCollector::new();
//! let mut handler = NormalizingHandler::new(&mut collector);
//! handler.start_record(&Leader::unmarshal("00000n?#  2200000   4500").unwrap());
//! handler.end_record();
//!
//! let leader = &collector.records()[0].leader;
//! assert_eq!(leader.type_of_record, 'a');
//! assert_eq!(leader.bibliographic_level(), ' ');
//! ```

use crate::handler::MarcHandler;
use crate::leader::Leader;
use tracing::debug;

const TYPES_OF_RECORD: &str = "acdefgijkmoprtzuvxywq";
const BIBLIOGRAPHIC_LEVELS: &str = "abcdimsnopqz";

/// Handler adapter that corrects leader and indicator values.
#[derive(Debug)]
pub struct NormalizingHandler<H> {
    inner: H,
    indicators: bool,
}

impl<H: MarcHandler> NormalizingHandler<H> {
    /// Wrap `inner`. Only the leader is corrected.
    pub fn new(inner: H) -> Self {
        NormalizingHandler {
            inner,
            indicators: false,
        }
    }

    /// Also correct indicator values.
    #[must_use]
    pub fn with_indicators(mut self, enabled: bool) -> Self {
        self.indicators = enabled;
        self
    }

    /// The wrapped handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Unwrap the handler.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

/// Apply the leader corrections to a copy of `leader`.
#[must_use]
pub fn normalize_leader(leader: &Leader) -> Leader {
    let mut fixed = leader.clone();
    if !TYPES_OF_RECORD.contains(fixed.type_of_record) {
        debug!(value = %fixed.type_of_record, "replacing unknown type of record");
        fixed.type_of_record = 'a';
    }
    let level = fixed.impl_defined1[0];
    if level == '#' {
        fixed.impl_defined1[0] = ' ';
    } else if !BIBLIOGRAPHIC_LEVELS.contains(level) {
        debug!(value = %level, "replacing unknown bibliographic level");
        fixed.impl_defined1[0] = 'm';
    }
    fixed
}

/// Lower-case an indicator, blanking anything that is not a letter or digit.
#[must_use]
pub fn normalize_indicator(c: char) -> char {
    if c.is_ascii_alphanumeric() {
        c.to_ascii_lowercase()
    } else {
        ' '
    }
}

impl<H: MarcHandler> MarcHandler for NormalizingHandler<H> {
    fn start_collection(&mut self) {
        self.inner.start_collection();
    }

    fn start_record(&mut self, leader: &Leader) {
        self.inner.start_record(&normalize_leader(leader));
    }

    fn control_field(&mut self, tag: &str, data: &str, id: Option<u64>) {
        self.inner.control_field(tag, data, id);
    }

    fn start_data_field(&mut self, tag: &str, indicator1: char, indicator2: char, id: Option<u64>) {
        if self.indicators {
            self.inner.start_data_field(
                tag,
                normalize_indicator(indicator1),
                normalize_indicator(indicator2),
                id,
            );
        } else {
            self.inner.start_data_field(tag, indicator1, indicator2, id);
        }
    }

    fn subfield(&mut self, code: char, data: &str, link_code: Option<&str>) {
        self.inner.subfield(code, data, link_code);
    }

    fn end_data_field(&mut self, tag: &str) {
        self.inner.end_data_field(tag);
    }

    fn end_record(&mut self) {
        self.inner.end_record();
    }

    fn end_collection(&mut self) {
        self.inner.end_collection();
    }
}
