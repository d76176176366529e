//! Line-oriented text dump of decoded records.
//!
//! [`TaggedWriter`] prints one line per field, in the order the decoder emits
//! them:
//!
//! ```text
//! Leader 00714cam a2200205 a 4500
//! 001 12883376
//! 245 10$aSummerland /$cMichael Chabon.
//!
//! ```
//!
//! Each record ends with an empty line. Subfields are introduced by `$` followed
//! by the subfield code.

use crate::error::{MarcError, Result};
use crate::handler::MarcHandler;
use crate::leader::Leader;
use std::io::Write;

/// Writes records as tagged text.
///
/// Like the other handler-based writers, the first I/O error is kept and
/// reported by [`finish`](Self::finish); output stops after it.
#[derive(Debug)]
pub struct TaggedWriter<W: Write> {
    out: W,
    line: String,
    error: Option<MarcError>,
}

impl<W: Write> TaggedWriter<W> {
    /// Create a writer on `out`.
    pub fn new(out: W) -> Self {
        TaggedWriter {
            out,
            line: String::new(),
            error: None,
        }
    }

    /// Flush and return the destination.
    ///
    /// # Errors
    ///
    /// Returns the first error met while writing.
    pub fn finish(mut self) -> Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn emit_line(&mut self) {
        self.line.push('\n');
        if self.error.is_none() {
            if let Err(e) = self.out.write_all(self.line.as_bytes()) {
                self.error = Some(e.into());
            }
        }
        self.line.clear();
    }
}

impl<W: Write> MarcHandler for TaggedWriter<W> {
    fn start_record(&mut self, leader: &Leader) {
        self.line.push_str("Leader ");
        match leader.marshal() {
            Ok(text) => self.line.push_str(&text),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
            },
        }
        self.emit_line();
    }

    fn control_field(&mut self, tag: &str, data: &str, _id: Option<u64>) {
        self.line.push_str(tag);
        self.line.push(' ');
        self.line.push_str(data);
        self.emit_line();
    }

    fn start_data_field(
        &mut self,
        tag: &str,
        indicator1: char,
        indicator2: char,
        _id: Option<u64>,
    ) {
        self.line.push_str(tag);
        self.line.push(' ');
        self.line.push(indicator1);
        self.line.push(indicator2);
    }

    fn subfield(&mut self, code: char, data: &str, _link_code: Option<&str>) {
        self.line.push('$');
        self.line.push(code);
        self.line.push_str(data);
    }

    fn end_data_field(&mut self, _tag: &str) {
        self.emit_line();
    }

    fn end_record(&mut self) {
        self.emit_line();
    }
}
