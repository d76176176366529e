//! Error types for MARC operations.
//!
//! This module provides the [`MarcError`] type for all library operations
//! and the [`Result`] convenience type.
//!
//! Most structural problems met while *decoding* a stream never surface as a
//! `MarcError`: they are reported through the [`diagnostics`](crate::diagnostics)
//! sink and recovered locally. `MarcError` is returned by the model's validating
//! constructors, by the codecs when asked to produce something unrepresentable,
//! and by the reader when the stream itself fails or a fatal condition is hit.

use crate::diagnostics::Diagnostic;
use thiserror::Error;

/// Error type for all MARC library operations.
#[derive(Error, Debug)]
pub enum MarcError {
    /// The 24-byte leader is malformed or cannot be represented.
    #[error("Malformed leader: {0}")]
    MalformedLeader(String),

    /// A tag is not legal for the kind of field it was given to.
    #[error("Illegal tag '{tag}': {reason}")]
    IllegalTag {
        /// The offending tag.
        tag: String,
        /// Why the tag was rejected.
        reason: &'static str,
    },

    /// An indicator is missing or is not a printable ASCII character.
    #[error("Illegal indicator: {0}")]
    IllegalIndicator(String),

    /// A payload contains a reserved structural control code.
    #[error("Illegal data element: {0}")]
    IllegalDataElement(String),

    /// A directory entry points outside the record's data area.
    #[error("Directory overrun: {0}")]
    DirectoryOverrun(String),

    /// A character has no mapping in the target character set.
    #[error("Unmappable character: {0}")]
    UnmappableCharacter(String),

    /// An escape sequence is incomplete or not understood.
    #[error("Malformed escape sequence: {0}")]
    MalformedEscapeSequence(String),

    /// A diagnostic whose severity is fatal stopped the stream.
    #[error("Fatal: {0}")]
    Fatal(Box<Diagnostic>),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;

impl From<quick_xml::DeError> for MarcError {
    fn from(err: quick_xml::DeError) -> Self {
        MarcError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("failed to serialize MARCXML: {err}"),
        ))
    }
}
