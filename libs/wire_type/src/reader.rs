//! Decoding fields from a byte stream.

use std::io;

use crate::buffer::{DEFAULT_CAPACITY, StreamBuffer};
use crate::error::{Error, Result};
use crate::header::Header;
use crate::record::{Element, Record, Value};
use crate::varint::{self, Varint};

/// Payloads allocate at most this much ahead of the data actually arriving.
/// Incorrect sizes in the data could otherwise lead to a DoS.
const MAX_PREALLOC: usize = 0x1000;

/// State of the header of the next unconsumed field.
#[derive(Debug, Clone, Copy)]
enum Lookahead {
    /// Not decoded yet.
    Pending,
    Header(Header),
    /// The stream ended cleanly before another header.
    End,
    /// The stream cannot be read further.
    Malformed(Fault),
}

/// Remembers why the stream became unreadable. [`Error`] itself can't be
/// copied, so it's recreated on access.
#[derive(Debug, Clone, Copy)]
enum Fault {
    Eof,
    Overflow(usize),
    Ordinal,
}

impl From<&Error> for Fault {
    fn from(value: &Error) -> Self {
        match value {
            Error::VarintOverflow(len) => Self::Overflow(*len),
            Error::InvalidOrdinal => Self::Ordinal,
            _ => Self::Eof,
        }
    }
}

impl From<Fault> for Error {
    fn from(value: Fault) -> Self {
        match value {
            Fault::Eof => Self::UnexpectedEof,
            Fault::Overflow(len) => Self::VarintOverflow(len),
            Fault::Ordinal => Self::InvalidOrdinal,
        }
    }
}

/// Reads fields from a byte stream, one header of lookahead at a time.
///
/// The header of the next field is decoded before its payload. This lets a
/// [`Record`] look at the ordinal and kind and decide whether to read the
/// field via one of the typed reads or to [`skip`](Self::skip) it.
///
/// Every typed read checks the kind of the current header first and returns
/// [`Error::KindMismatch`] without consuming anything if it's wrong.
/// Otherwise it consumes the payload and moves on to the next header.
#[derive(Debug)]
pub struct WireReader<R> {
    source: R,
    buffer: StreamBuffer,
    lookahead: Lookahead,
    /// Bytes consumed from the source, including a decoded lookahead header.
    position: u64,
    /// Position at which the lookahead header starts.
    header_start: u64,
    /// End of the innermost sized region being read, if any.
    limit: Option<u64>,
}

impl<R: io::Read> WireReader<R> {
    /// Creates a new reader with the default buffer capacity.
    pub fn new(source: R) -> Self {
        Self::with_capacity(source, DEFAULT_CAPACITY)
    }

    /// Creates a new reader whose buffer has the given capacity.
    ///
    /// Payloads aren't limited by the capacity, it only controls how much is
    /// read from the source at once.
    pub fn with_capacity(source: R, capacity: usize) -> Self {
        Self {
            source,
            buffer: StreamBuffer::with_capacity(capacity),
            lookahead: Lookahead::Pending,
            position: 0,
            header_start: 0,
            limit: None,
        }
    }

    /// Unwraps this reader into the underlying source.
    ///
    /// Any bytes that were buffered but not consumed are lost.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// The amount of bytes consumed so far.
    ///
    /// Once the lookahead header has been decoded, its bytes are included.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Gets the header of the current field, decoding it if needed.
    ///
    /// Returns [`None`] at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed or truncated, or the source
    /// fails.
    pub fn current_header(&mut self) -> Result<Option<Header>> {
        match self.peek()? {
            Lookahead::Header(header) => Ok(Some(header)),
            // peek never leaves the lookahead pending
            Lookahead::End | Lookahead::Pending => Ok(None),
            Lookahead::Malformed(fault) => Err(fault.into()),
        }
    }

    /// Decodes the next header after the current field's payload has been
    /// consumed.
    ///
    /// Returns whether there is another field. A malformed header is not
    /// reported here but by the next call to [`Self::current_header`].
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails.
    pub fn advance(&mut self) -> Result<bool> {
        self.lookahead = self.decode_header()?;
        Ok(matches!(self.lookahead, Lookahead::Header(_)))
    }

    /// Gets the header of the next field within the region being read.
    ///
    /// Returns [`None`] once the end of the enclosing record is reached, or at
    /// the end of the stream for top-level reads. This drives
    /// [`Record::read_from`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] if the stream ends inside a record and
    /// [`Error::SizeMismatch`] if a field extends past the record's end.
    pub fn next_field(&mut self) -> Result<Option<Header>> {
        let lookahead = self.peek()?;
        if let Some(end) = self.limit {
            if self.header_start == end {
                return Ok(None);
            }

            if self.header_start > end {
                return Err(Error::SizeMismatch {
                    expected: end,
                    actual: self.header_start,
                });
            }

            if matches!(lookahead, Lookahead::End) {
                return Err(Error::UnexpectedEof);
            }
        }

        self.current_header()
    }

    /// Skips the current field without decoding its payload.
    ///
    /// Sized payloads are paged past without being kept in memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoField`] if there is no current field and
    /// [`Error::Truncated`] if the stream ends within the payload.
    pub fn skip(&mut self) -> Result<()> {
        let header = self.expect_header()?;
        if header.kind().is_sized() {
            let size = u64::from(header.size());
            let skipped = self.buffer.skip(&mut self.source, size)?;
            self.position += skipped;
            if skipped < size {
                return Err(self.fail(Error::Truncated {
                    expected: size,
                    actual: skipped,
                }));
            }
        } else {
            self.read_varint::<u64>()?;
        }

        self.advance()?;
        Ok(())
    }

    /// Reads the current field as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KindMismatch`] without consuming anything if the
    /// field's kind doesn't match `T`. Other errors mean the payload couldn't
    /// be read.
    pub fn read<T: Value>(&mut self) -> Result<T> {
        let header = self.expect_header()?;
        if header.kind() != T::KIND {
            return Err(Error::KindMismatch {
                ordinal: header.ordinal(),
                expected: T::KIND,
                found: header.kind(),
            });
        }

        T::read_value(self, header)
    }

    /// Reads the current field as `T`, or skips it if it isn't one.
    ///
    /// Returns [`None`] if the field had the wrong kind, or its payload was
    /// valid on the wire but couldn't be converted to `T` (f.e. a string with
    /// invalid UTF-8). Either way, the field is consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed or the source fails.
    pub fn read_or_skip<T: Value>(&mut self) -> Result<Option<T>> {
        match self.read() {
            Ok(value) => Ok(Some(value)),
            Err(Error::KindMismatch {
                ordinal,
                expected,
                found,
            }) => {
                log::debug!("Skipping field {ordinal}: expected {expected:?} but found {found:?}.");
                self.skip()?;
                Ok(None)
            },
            Err(why) if why.is_invalid_value() => {
                log::debug!("Dropping unreadable field: {why}");
                Ok(None)
            },
            Err(why) => Err(why),
        }
    }

    /// Reads a signed 32-bit integer field.
    ///
    /// # Errors
    ///
    /// See [`Self::read`].
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read()
    }

    /// Reads an unsigned 32-bit integer field.
    ///
    /// # Errors
    ///
    /// See [`Self::read`].
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read()
    }

    /// Reads a signed 64-bit integer field.
    ///
    /// # Errors
    ///
    /// See [`Self::read`].
    pub fn read_i64(&mut self) -> Result<i64> {
        self.read()
    }

    /// Reads an unsigned 64-bit integer field.
    ///
    /// # Errors
    ///
    /// See [`Self::read`].
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read()
    }

    /// Reads a 32-bit float field.
    ///
    /// # Errors
    ///
    /// See [`Self::read`].
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read()
    }

    /// Reads a 64-bit float field.
    ///
    /// # Errors
    ///
    /// See [`Self::read`].
    pub fn read_f64(&mut self) -> Result<f64> {
        self.read()
    }

    /// Reads a UTF-8 string field.
    ///
    /// # Errors
    ///
    /// See [`Self::read`]. Returns [`Error::InvalidUtf8`] after consuming the
    /// field if the data isn't valid UTF-8.
    pub fn read_string(&mut self) -> Result<String> {
        self.read()
    }

    /// Reads a blob field.
    ///
    /// # Errors
    ///
    /// See [`Self::read`].
    pub fn read_blob(&mut self) -> Result<Vec<u8>> {
        self.read()
    }

    /// Reads a nested record field.
    ///
    /// # Errors
    ///
    /// See [`Self::read`]. Additionally, returns [`Error::SizeMismatch`] if the
    /// record's fields don't end exactly at its declared size.
    pub fn read_record<T: Record>(&mut self) -> Result<T> {
        self.read()
    }

    /// Reads a list field.
    ///
    /// # Errors
    ///
    /// See [`Self::read`]. Additionally, returns [`Error::Overrun`] or
    /// [`Error::SizeMismatch`] if the elements don't end exactly at the list's
    /// declared size.
    pub fn read_list<T: Element>(&mut self) -> Result<Vec<T>> {
        self.read()
    }

    /// Reads a record that makes up the rest of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is malformed or truncated, or the source
    /// fails.
    pub fn read_message<T: Record>(&mut self) -> Result<T> {
        let mut value = T::default();
        value.read_from(self)?;
        Ok(value)
    }

    pub(crate) fn field_start(&self) -> u64 {
        self.header_start
    }

    /// Reads an [`Kind::ImplicitSize`](crate::Kind::ImplicitSize) payload.
    pub(crate) fn read_scalar<T: Varint>(&mut self) -> Result<T> {
        let value = self.read_varint()?;
        self.advance()?;
        Ok(value)
    }

    /// Reads an [`Kind::ExplicitSize`](crate::Kind::ExplicitSize) payload as raw bytes.
    pub(crate) fn read_bytes(&mut self, header: Header) -> Result<Vec<u8>> {
        let bytes = self.read_payload(header.size())?;
        self.advance()?;
        Ok(bytes)
    }

    /// Reads an [`Kind::ExplicitSize`](crate::Kind::ExplicitSize) payload as a nested record.
    pub(crate) fn read_nested<T: Record>(&mut self, header: Header) -> Result<T> {
        let mut value = T::default();
        self.read_region(header, |reader| value.read_from(reader))?;
        Ok(value)
    }

    /// Reads an [`Kind::ImplicitSizeList`](crate::Kind::ImplicitSizeList) payload.
    pub(crate) fn read_varint_list<T: Varint>(&mut self, header: Header) -> Result<Vec<T>> {
        let end = self.position + u64::from(header.size());
        let mut values = Vec::new();
        while self.position < end {
            let remaining = usize::try_from(end - self.position).unwrap_or(usize::MAX);
            let limit = remaining.min(T::MAX_LEN);
            match self.decode_buffered(limit, varint::decode::<T>) {
                Ok(value) => values.push(value),
                Err(Error::UnexpectedEof) if self.buffer.unread().len() >= limit => {
                    return Err(self.fail(Error::Overrun { end }));
                },
                Err(why) => return Err(self.fail(why)),
            }
        }

        self.advance()?;
        Ok(values)
    }

    /// Reads an [`Kind::ExplicitSizeList`](crate::Kind::ExplicitSizeList) payload.
    ///
    /// Elements that aren't `T` are skipped. If an element could be read but
    /// not converted, the rest of the list is still consumed before that error
    /// is returned.
    pub(crate) fn read_element_list<T: Value>(&mut self, header: Header) -> Result<Vec<T>> {
        let mut values = Vec::new();
        let mut invalid = None;

        self.read_region(header, |reader| {
            while let Some(element) = reader.next_field()? {
                if element.kind() != T::KIND {
                    log::debug!(
                        "Skipping list element {}: expected {:?} but found {:?}.",
                        element.ordinal(),
                        T::KIND,
                        element.kind()
                    );
                    reader.skip()?;
                    continue;
                }

                match T::read_value(reader, element) {
                    Ok(value) => values.push(value),
                    Err(why) if why.is_invalid_value() => {
                        if invalid.is_none() {
                            invalid = Some(why);
                        }
                    },
                    Err(why) => return Err(why),
                }
            }

            Ok(())
        })?;

        match invalid {
            Some(why) => Err(why),
            None => Ok(values),
        }
    }

    /// Reads the payload of `header` as a bounded region of fields.
    ///
    /// `read` is called with the first field of the region as the current
    /// field. When it returns, the current field must be the first one after
    /// the region.
    fn read_region<F>(&mut self, header: Header, read: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let end = self.position + u64::from(header.size());
        let outer = self.limit.replace(end);
        let result = self.read_bounded(end, read);
        self.limit = outer;
        result
    }

    fn read_bounded<F>(&mut self, end: u64, read: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.advance()?;
        read(self)?;

        if self.header_start != end {
            return Err(Error::SizeMismatch {
                expected: end,
                actual: self.header_start,
            });
        }

        Ok(())
    }

    fn expect_header(&mut self) -> Result<Header> {
        self.current_header()?.ok_or(Error::NoField)
    }

    fn peek(&mut self) -> Result<Lookahead> {
        if matches!(self.lookahead, Lookahead::Pending) {
            self.lookahead = self.decode_header()?;
        }

        Ok(self.lookahead)
    }

    fn decode_header(&mut self) -> Result<Lookahead> {
        self.header_start = self.position;
        match self.decode_buffered(Header::MAX_LEN, Header::decode) {
            Ok(header) => Ok(Lookahead::Header(header)),
            Err(Error::UnexpectedEof) if self.buffer.buffered_count() == 0 => Ok(Lookahead::End),
            Err(Error::Io(why)) => Err(Error::Io(why)),
            Err(why) => {
                log::warn!("Malformed header at byte {}: {why}", self.position);
                Ok(Lookahead::Malformed(Fault::from(&why)))
            },
        }
    }

    fn read_varint<T: Varint>(&mut self) -> Result<T> {
        self.decode_buffered(T::MAX_LEN, varint::decode::<T>)
            .map_err(|why| self.fail(why))
    }

    /// Reads exactly `size` bytes, growing the output as data arrives.
    fn read_payload(&mut self, size: u32) -> Result<Vec<u8>> {
        let size = size as usize;
        let mut out = Vec::with_capacity(size.min(MAX_PREALLOC));
        while out.len() < size {
            let filled = out.len();
            let step = (size - filled).min(MAX_PREALLOC);
            out.resize(filled + step, 0);

            let read = self.buffer.read_into(&mut self.source, &mut out[filled..])?;
            self.position += read as u64;
            if read < step {
                return Err(self.fail(Error::Truncated {
                    expected: size as u64,
                    actual: (filled + read) as u64,
                }));
            }
        }

        Ok(out)
    }

    /// Decodes a value from at most `limit` buffered bytes, refilling the
    /// buffer only when the value turns out to be incomplete.
    ///
    /// Sources that deliver data as it becomes available are never asked for
    /// more than the value needs.
    fn decode_buffered<T, F>(&mut self, limit: usize, decode: F) -> Result<T>
    where
        F: Fn(&[u8]) -> Result<(T, usize)>,
    {
        loop {
            let unread = self.buffer.unread();
            let available = unread.len();
            match decode(&unread[..available.min(limit)]) {
                Ok((value, len)) => {
                    self.buffer.consume(len);
                    self.position += len as u64;
                    return Ok(value);
                },
                Err(Error::UnexpectedEof) if available < limit => {
                    self.buffer.refill(&mut self.source)?;
                    if self.buffer.unread().len() == available {
                        return Err(Error::UnexpectedEof);
                    }
                },
                Err(why) => return Err(why),
            }
        }
    }

    /// Marks the stream as unreadable after a failure mid-payload.
    fn fail(&mut self, why: Error) -> Error {
        self.lookahead = Lookahead::Malformed(Fault::from(&why));
        why
    }
}
