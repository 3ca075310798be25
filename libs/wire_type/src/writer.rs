//! Encoding fields into a byte sink.

use std::io;

use crate::error::{Error, Result};
use crate::header::{Header, Kind};
use crate::record::{Element, Record, Value};
use crate::varint::{self, Varint};

/// Writes fields to an [`io::Write`].
///
/// Scalars are written with a [`Kind::ImplicitSize`] header directly followed
/// by the varint. Everything else is sized: the payload is encoded into a
/// scratch buffer first so its length is known when the header is written.
///
/// Wrap unbuffered sinks in an [`io::BufWriter`]; every field makes several
/// small writes.
#[derive(Debug)]
pub struct WireWriter<W> {
    writer: W,
    written: u64,
}

impl<W: io::Write> WireWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// The total amount of bytes written so far.
    pub fn total_written(&self) -> u64 {
        self.written
    }

    /// Unwraps this writer into the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Flushes the underlying sink.
    ///
    /// # Errors
    ///
    /// Returns the sink's error, if any.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Writes `value` as the field with the given ordinal.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails or a payload is larger than
    /// [`u32::MAX`] bytes.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write<T: Value>(&mut self, ordinal: u32, value: &T) -> Result<()> {
        check_ordinal(ordinal);
        value.write_value(ordinal, self)
    }

    /// Writes a signed 32-bit integer field.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write_i32(&mut self, ordinal: u32, value: i32) -> Result<()> {
        self.write_scalar(ordinal, value)
    }

    /// Writes an unsigned 32-bit integer field.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write_u32(&mut self, ordinal: u32, value: u32) -> Result<()> {
        self.write_scalar(ordinal, value)
    }

    /// Writes a signed 64-bit integer field.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write_i64(&mut self, ordinal: u32, value: i64) -> Result<()> {
        self.write_scalar(ordinal, value)
    }

    /// Writes an unsigned 64-bit integer field.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write_u64(&mut self, ordinal: u32, value: u64) -> Result<()> {
        self.write_scalar(ordinal, value)
    }

    /// Writes a 32-bit float field.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write_f32(&mut self, ordinal: u32, value: f32) -> Result<()> {
        self.write_scalar(ordinal, value)
    }

    /// Writes a 64-bit float field.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write_f64(&mut self, ordinal: u32, value: f64) -> Result<()> {
        self.write_scalar(ordinal, value)
    }

    /// Writes a string field as its UTF-8 bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails or the string is larger than
    /// [`u32::MAX`] bytes.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write_string(&mut self, ordinal: u32, value: &str) -> Result<()> {
        self.write_sized(Kind::ExplicitSize, ordinal, value.as_bytes())
    }

    /// Writes a blob field.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails or the blob is larger than
    /// [`u32::MAX`] bytes.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write_blob(&mut self, ordinal: u32, value: &[u8]) -> Result<()> {
        self.write_sized(Kind::ExplicitSize, ordinal, value)
    }

    /// Writes a nested record field.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails or the record's encoding is larger
    /// than [`u32::MAX`] bytes.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write_record<T: Record>(&mut self, ordinal: u32, value: &T) -> Result<()> {
        check_ordinal(ordinal);
        let payload = scratch(|sub| value.write_to(sub))?;
        self.write_sized(Kind::ExplicitSize, ordinal, &payload)
    }

    /// Writes a list field.
    ///
    /// Scalars form a [`Kind::ImplicitSizeList`], other elements a
    /// [`Kind::ExplicitSizeList`] where each element is numbered by its
    /// 1-based position.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails or the list's encoding is larger
    /// than [`u32::MAX`] bytes.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    #[track_caller]
    pub fn write_list<T: Element>(&mut self, ordinal: u32, values: &[T]) -> Result<()> {
        check_ordinal(ordinal);
        T::write_list(values, ordinal, self)
    }

    /// Writes all fields of a record without any surrounding header.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails or a payload is larger than
    /// [`u32::MAX`] bytes.
    pub fn write_message<T: Record>(&mut self, value: &T) -> Result<()> {
        value.write_to(self)
    }

    #[track_caller]
    pub(crate) fn write_scalar<T: Varint>(&mut self, ordinal: u32, value: T) -> Result<()> {
        self.write_header(Header::new(Kind::ImplicitSize, ordinal, 0))?;
        let len = varint::write(&mut self.writer, value)?;
        self.written += len as u64;
        Ok(())
    }

    pub(crate) fn write_varint_list<T: Varint>(&mut self, ordinal: u32, values: &[T]) -> Result<()> {
        let mut payload = Vec::new();
        for &value in values {
            varint::write(&mut payload, value)?;
        }

        self.write_sized(Kind::ImplicitSizeList, ordinal, &payload)
    }

    pub(crate) fn write_element_list<T: Value>(&mut self, ordinal: u32, values: &[T]) -> Result<()> {
        let payload = scratch(|sub| {
            for (index, value) in values.iter().enumerate() {
                let position = u32::try_from(index + 1)
                    .map_err(|_| Error::LengthOverflow(values.len()))?;
                value.write_value(position, sub)?;
            }

            Ok(())
        })?;

        self.write_sized(Kind::ExplicitSizeList, ordinal, &payload)
    }

    #[track_caller]
    fn write_sized(&mut self, kind: Kind, ordinal: u32, payload: &[u8]) -> Result<()> {
        let size = u32::try_from(payload.len()).map_err(|_| Error::LengthOverflow(payload.len()))?;
        self.write_header(Header::new(kind, ordinal, size))?;
        self.write_raw(payload)
    }

    fn write_header(&mut self, header: Header) -> Result<()> {
        self.write_raw(&header.encode())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }
}

#[track_caller]
fn check_ordinal(ordinal: u32) {
    assert!(ordinal > 0, "field ordinals must be at least 1");
}

/// Encodes fields into a fresh buffer.
fn scratch<F>(write: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut WireWriter<Vec<u8>>) -> Result<()>,
{
    let mut sub = WireWriter::new(Vec::new());
    write(&mut sub)?;
    Ok(sub.into_inner())
}
