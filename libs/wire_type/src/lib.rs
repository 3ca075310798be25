//! # Wire Type
//!
//! Compact, self-describing binary encoding for records of ordinal-tagged
//! fields. Every field is a header followed by its payload:
//!
//! - the header holds the field's [`Kind`], its ordinal, and, for every kind
//!   but [`Kind::ImplicitSize`], the payload size in bytes
//! - integers are LEB128 varints, signed ones zigzag-mapped first
//! - floats are varints of their raw bit pattern
//! - strings, blobs, and nested records are length-prefixed
//! - lists are length-prefixed runs of varints or of elements with their own
//!   header, numbered by their 1-based position
//!
//! Fields may come in any order and readers skip ordinals they don't know, so
//! adding fields doesn't break older readers. A top-level message is just its
//! fields without any envelope.
//!
//! Rust types map to fields via the [`Record`], [`Value`], and [`Element`]
//! traits, which can be derived:
//!
//! ```
//! use wire_type::{Enumeration, Record};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Enumeration)]
//! enum Shape {
//!     Circle = 1,
//!     Square = 2,
//! }
//!
//! #[derive(Debug, Default, PartialEq, Record)]
//! struct Drawing {
//!     #[wire(ordinal = 1)]
//!     name: Option<String>,
//!     #[wire(ordinal = 2)]
//!     shapes: Option<Vec<Shape>>,
//!     #[wire(ordinal = 40)]
//!     scale: Option<f32>,
//! }
//!
//! let drawing = Drawing {
//!     name: Some("sketch".to_owned()),
//!     shapes: Some(vec![Shape::Square, Shape::Circle]),
//!     scale: None,
//! };
//!
//! let bytes = wire_type::to_vec(&drawing)?;
//! assert_eq!(wire_type::from_slice::<Drawing>(&bytes)?, drawing);
//! # Ok::<(), wire_type::Error>(())
//! ```

use std::io;

#[cfg(test)]
use criterion as _;

pub mod buffer;
mod error;
pub mod header;
mod reader;
mod record;
pub mod varint;
mod writer;

pub use error::{Error, Result};
pub use header::{Header, Kind};
pub use reader::WireReader;
pub use record::{Element, Record, Value};
pub use wire_type_macros::{Enumeration, Record};
pub use writer::WireWriter;

/// Serializes a record into a new [`Vec`].
///
/// # Errors
///
/// Returns an error if a payload is larger than [`u32::MAX`] bytes.
pub fn to_vec<T: Record>(value: &T) -> Result<Vec<u8>> {
    let mut writer = WireWriter::new(Vec::new());
    writer.write_message(value)?;
    Ok(writer.into_inner())
}

/// Serializes a record into a [`io::Write`].
///
/// # Errors
///
/// Returns an error if the writer fails or a payload is larger than
/// [`u32::MAX`] bytes.
pub fn to_writer<T, W>(writer: W, value: &T) -> Result<()>
where
    T: Record,
    W: io::Write,
{
    let mut writer = WireWriter::new(writer);
    writer.write_message(value)?;
    writer.flush()
}

/// Deserializes a record from a byte slice.
///
/// # Errors
///
/// Returns an error if the data is malformed or truncated.
pub fn from_slice<T: Record>(buf: &[u8]) -> Result<T> {
    WireReader::new(buf).read_message()
}

/// Deserializes a record from a [`io::Read`], consuming it to the end.
///
/// # Errors
///
/// Returns an error if the data is malformed or truncated, or the reader
/// fails.
pub fn from_reader<T, R>(reader: R) -> Result<T>
where
    T: Record,
    R: io::Read,
{
    WireReader::new(reader).read_message()
}
