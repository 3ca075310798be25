//! Error handling types.
//!
//! Reading and writing share one error type. Whether an error is fatal for the
//! stream depends on the variant, see [`Error::is_invalid_value`].

use std::io;
use std::string::FromUtf8Error;

use crate::header::Kind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Potential errors to encounter when reading or writing wire data.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The error originated from the [`io::Write`] or [`io::Read`]
    /// implementation.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The stream ended in the middle of a header or varint.
    #[error("unexpected end of stream")]
    UnexpectedEof,
    /// The stream ended before a sized payload was complete.
    #[error("payload truncated, expected {expected} bytes but only got {actual}")]
    Truncated { expected: u64, actual: u64 },
    /// A varint kept its continuation bit set past the maximum length for its
    /// width, or its value did not fit into the target type.
    #[error("varint exceeds the maximum length of {0} bytes")]
    VarintOverflow(usize),
    /// A header declared ordinal 0.
    #[error("header has an invalid ordinal of 0")]
    InvalidOrdinal,

    /// A typed read was attempted on a field with a different kind. Nothing was
    /// consumed, so the field can still be skipped.
    #[error("field {ordinal} has kind {found:?}, expected {expected:?}")]
    KindMismatch {
        ordinal: u32,
        expected: Kind,
        found: Kind,
    },
    /// A typed read was attempted when no field was available.
    #[error("no field available at the current position")]
    NoField,
    /// The fields inside a sized region did not end exactly at its bound.
    #[error("region should end at byte {expected} but ended at {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    /// A value extends past the end of the list that contains it.
    #[error("value extends past the end of its list at byte {end}")]
    Overrun { end: u64 },
    /// A payload was too large for a header's 32-bit size.
    #[error("payload of {0} bytes is too large to be written")]
    LengthOverflow(usize),

    /// A string field contained invalid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8(#[from] FromUtf8Error),
    /// An enumeration field held a value that has no matching variant.
    #[error("unknown enumeration value {0}")]
    InvalidEnum(i32),
}

impl Error {
    /// Whether the payload was fully consumed but could not be represented by
    /// the requested type.
    ///
    /// The stream remains usable after these errors.
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, Self::InvalidUtf8(_) | Self::InvalidEnum(_))
    }
}
