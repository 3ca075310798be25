//! The traits connecting Rust types to fields on the wire.

use std::io;

use crate::error::Result;
use crate::header::{Header, Kind};
use crate::reader::WireReader;
use crate::writer::WireWriter;

/// A type made up of ordinal-tagged fields.
///
/// Usually derived via [`macro@crate::Record`]. A hand-written implementation
/// looks like this:
///
/// ```
/// use std::io;
/// use wire_type::{Header, Record, Result, WireReader, WireWriter};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Point {
///     x: Option<i32>,
///     y: Option<i32>,
/// }
///
/// impl Record for Point {
///     fn read_field<R: io::Read>(&mut self, header: Header, reader: &mut WireReader<R>) -> Result<()> {
///         match header.ordinal() {
///             1 => self.x = reader.read_or_skip()?,
///             2 => self.y = reader.read_or_skip()?,
///             _ => reader.skip()?,
///         }
///         Ok(())
///     }
///
///     fn write_to<W: io::Write>(&self, writer: &mut WireWriter<W>) -> Result<()> {
///         if let Some(x) = self.x {
///             writer.write_i32(1, x)?;
///         }
///         if let Some(y) = self.y {
///             writer.write_i32(2, y)?;
///         }
///         Ok(())
///     }
/// }
///
/// let point = Point { x: Some(3), y: None };
/// let bytes = wire_type::to_vec(&point)?;
/// assert_eq!(wire_type::from_slice::<Point>(&bytes)?, point);
/// # Ok::<(), wire_type::Error>(())
/// ```
pub trait Record: Default {
    /// Reads the field described by `header`, which is the reader's current
    /// field.
    ///
    /// Fields this record doesn't know should be skipped. If the field is
    /// left unconsumed, [`Self::read_from`] skips it.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed or the source fails.
    fn read_field<R: io::Read>(&mut self, header: Header, reader: &mut WireReader<R>) -> Result<()>;

    /// Writes every present field.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails or a payload is too large.
    fn write_to<W: io::Write>(&self, writer: &mut WireWriter<W>) -> Result<()>;

    /// Reads fields into `self` until the end of the enclosing region.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed or ends early, or the
    /// source fails.
    fn read_from<R: io::Read>(&mut self, reader: &mut WireReader<R>) -> Result<()> {
        while let Some(header) = reader.next_field()? {
            let start = reader.field_start();
            self.read_field(header, reader)?;
            if reader.field_start() == start {
                reader.skip()?;
            }
        }

        Ok(())
    }
}

/// A type that can be the value of a field.
pub trait Value: Sized {
    /// The kind of header fields of this type are written with.
    const KIND: Kind;

    /// Reads the payload of the current field.
    ///
    /// The caller has already checked that `header` is of [`Self::KIND`]. The
    /// implementation must consume the whole payload and advance the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed or truncated.
    fn read_value<R: io::Read>(reader: &mut WireReader<R>, header: Header) -> Result<Self>;

    /// Writes `self` as a field with the given ordinal.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    fn write_value<W: io::Write>(&self, ordinal: u32, writer: &mut WireWriter<W>) -> Result<()>;
}

/// A type that can be an element of a list field.
pub trait Element: Sized {
    /// The kind of header lists of this type are written with.
    const LIST_KIND: Kind;

    /// Reads the payload of the current list field.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed or truncated.
    fn read_list<R: io::Read>(reader: &mut WireReader<R>, header: Header) -> Result<Vec<Self>>;

    /// Writes `values` as a list field with the given ordinal.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    fn write_list<W: io::Write>(values: &[Self], ordinal: u32, writer: &mut WireWriter<W>) -> Result<()>;
}

macro_rules! impl_scalar {
    ($($Ty:ty),*) => { $(
        impl Value for $Ty {
            const KIND: Kind = Kind::ImplicitSize;

            fn read_value<R: io::Read>(reader: &mut WireReader<R>, _header: Header) -> Result<Self> {
                reader.read_scalar()
            }

            fn write_value<W: io::Write>(&self, ordinal: u32, writer: &mut WireWriter<W>) -> Result<()> {
                writer.write_scalar(ordinal, *self)
            }
        }

        impl Element for $Ty {
            const LIST_KIND: Kind = Kind::ImplicitSizeList;

            fn read_list<R: io::Read>(reader: &mut WireReader<R>, header: Header) -> Result<Vec<Self>> {
                reader.read_varint_list(header)
            }

            fn write_list<W: io::Write>(values: &[Self], ordinal: u32, writer: &mut WireWriter<W>) -> Result<()> {
                writer.write_varint_list(ordinal, values)
            }
        }
    )* };
}

macro_rules! impl_explicit_element {
    ($($Ty:ty),*) => { $(
        impl Element for $Ty {
            const LIST_KIND: Kind = Kind::ExplicitSizeList;

            fn read_list<R: io::Read>(reader: &mut WireReader<R>, header: Header) -> Result<Vec<Self>> {
                reader.read_element_list(header)
            }

            fn write_list<W: io::Write>(values: &[Self], ordinal: u32, writer: &mut WireWriter<W>) -> Result<()> {
                writer.write_element_list(ordinal, values)
            }
        }
    )* };
}

impl_scalar!(i32, u32, i64, u64, f32, f64);
impl_explicit_element!(String, Vec<u8>);

impl Value for String {
    const KIND: Kind = Kind::ExplicitSize;

    fn read_value<R: io::Read>(reader: &mut WireReader<R>, header: Header) -> Result<Self> {
        let bytes = reader.read_bytes(header)?;
        Ok(Self::from_utf8(bytes)?)
    }

    fn write_value<W: io::Write>(&self, ordinal: u32, writer: &mut WireWriter<W>) -> Result<()> {
        writer.write_string(ordinal, self)
    }
}

/// Blobs. Byte lists aren't supported, use this instead.
impl Value for Vec<u8> {
    const KIND: Kind = Kind::ExplicitSize;

    fn read_value<R: io::Read>(reader: &mut WireReader<R>, header: Header) -> Result<Self> {
        reader.read_bytes(header)
    }

    fn write_value<W: io::Write>(&self, ordinal: u32, writer: &mut WireWriter<W>) -> Result<()> {
        writer.write_blob(ordinal, self)
    }
}

impl<T: Record> Value for T {
    const KIND: Kind = Kind::ExplicitSize;

    fn read_value<R: io::Read>(reader: &mut WireReader<R>, header: Header) -> Result<Self> {
        reader.read_nested(header)
    }

    fn write_value<W: io::Write>(&self, ordinal: u32, writer: &mut WireWriter<W>) -> Result<()> {
        writer.write_record(ordinal, self)
    }
}

impl<T: Record> Element for T {
    const LIST_KIND: Kind = Kind::ExplicitSizeList;

    fn read_list<R: io::Read>(reader: &mut WireReader<R>, header: Header) -> Result<Vec<Self>> {
        reader.read_element_list(header)
    }

    fn write_list<W: io::Write>(values: &[Self], ordinal: u32, writer: &mut WireWriter<W>) -> Result<()> {
        writer.write_element_list(ordinal, values)
    }
}

impl<T: Element> Value for Vec<T> {
    const KIND: Kind = T::LIST_KIND;

    fn read_value<R: io::Read>(reader: &mut WireReader<R>, header: Header) -> Result<Self> {
        T::read_list(reader, header)
    }

    fn write_value<W: io::Write>(&self, ordinal: u32, writer: &mut WireWriter<W>) -> Result<()> {
        T::write_list(self, ordinal, writer)
    }
}
