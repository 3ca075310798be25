//! Field headers.
//!
//! Every field starts with a header. The first byte holds the [`Kind`] in bits
//! 7-6, the extended flag in bit 5 and, for ordinals below 32, the ordinal
//! itself in bits 4-0:
//!
//! ```text
//! | 7 6  | 5        | 4 3 2 1 0   |
//! | kind | extended | ordinal-low |
//! ```
//!
//! Larger ordinals are varint encoded and then shifted right by 3 bits as a
//! whole, which frees up the tag bits at the cost of exactly one byte. Sized
//! kinds are followed by the payload size as a plain varint.

use arrayvec::ArrayVec;

use crate::error::{Error, Result};
use crate::varint::{self, MAX_LEN_32, MAX_LEN_64};

const KIND_SHIFT: u32 = 6;
const EXTENDED: u8 = 0x20;
const ORDINAL_MASK: u8 = 0x1F;
const TAG_MASK: u8 = 0xE0;

/// The maximum length of a varint after [`shift_varint_right_3`].
pub const MAX_SHIFTED_LEN: usize = MAX_LEN_64 + 1;

/// The maximum length of an encoded header: a shifted 32-bit ordinal and a
/// 32-bit size.
pub const MAX_HEADER_LEN: usize = MAX_LEN_32 + 1 + MAX_LEN_32;

/// The shape of a field's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    /// A single varint. The header carries no size.
    ImplicitSize = 0,
    /// A length-prefixed payload: a string, a blob, or a nested record.
    ExplicitSize = 1,
    /// A length-prefixed run of varints.
    ImplicitSizeList = 2,
    /// A length-prefixed run of [`Kind::ExplicitSize`] elements, each with its
    /// own header.
    ExplicitSizeList = 3,
}

impl Kind {
    /// Gets the kind from the lowest two bits.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::ImplicitSize,
            1 => Self::ExplicitSize,
            2 => Self::ImplicitSizeList,
            _ => Self::ExplicitSizeList,
        }
    }

    /// Whether headers of this kind carry a size.
    pub const fn is_sized(self) -> bool {
        !matches!(self, Self::ImplicitSize)
    }

    /// Whether this is one of the list kinds.
    pub const fn is_list(self) -> bool {
        matches!(self, Self::ImplicitSizeList | Self::ExplicitSizeList)
    }

    /// Gets the kind used for lists of elements of this kind.
    #[must_use]
    pub const fn list(self) -> Self {
        match self {
            Self::ImplicitSize | Self::ImplicitSizeList => Self::ImplicitSizeList,
            Self::ExplicitSize | Self::ExplicitSizeList => Self::ExplicitSizeList,
        }
    }
}

/// The header preceding every field and explicit list element.
///
/// Two headers are equal if their kind, ordinal, and size are all equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    kind: Kind,
    ordinal: u32,
    size: u32,
}

impl Header {
    /// The maximum length of an encoded header.
    pub const MAX_LEN: usize = MAX_HEADER_LEN;

    /// Creates a new header.
    ///
    /// The size is ignored for [`Kind::ImplicitSize`].
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is 0.
    pub const fn new(kind: Kind, ordinal: u32, size: u32) -> Self {
        assert!(ordinal > 0, "field ordinals must be at least 1");

        let size = if kind.is_sized() { size } else { 0 };
        Self {
            kind,
            ordinal,
            size,
        }
    }

    pub const fn kind(&self) -> Kind {
        self.kind
    }

    pub const fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// The payload size in bytes. Always 0 for [`Kind::ImplicitSize`].
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Encodes the header.
    pub fn encode(&self) -> ArrayVec<u8, MAX_HEADER_LEN> {
        let ordinal = varint::to_bytes(self.ordinal);
        let tag = (self.kind as u8) << KIND_SHIFT;

        let mut buf = ArrayVec::new();
        if ordinal[0] & TAG_MASK == 0 {
            buf.push(ordinal[0] | tag);
        } else {
            buf.extend(shift_varint_right_3(&ordinal));
            buf[0] |= tag | EXTENDED;
        }

        if self.kind.is_sized() {
            buf.extend(varint::to_bytes(self.size));
        }

        buf
    }

    /// Gets the encoded length of this header.
    pub fn encoded_len(&self) -> usize {
        let ordinal = if self.ordinal <= u32::from(ORDINAL_MASK) {
            1
        } else {
            varint::encoded_len(self.ordinal) + 1
        };

        if self.kind.is_sized() {
            ordinal + varint::encoded_len(self.size)
        } else {
            ordinal
        }
    }

    /// Decodes a header from the start of `bytes`, returning it together with
    /// the number of bytes it took.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] if `bytes` ends within the header,
    /// [`Error::VarintOverflow`] if either varint is malformed, and
    /// [`Error::InvalidOrdinal`] if the ordinal is 0.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let &first = bytes.first().ok_or(Error::UnexpectedEof)?;
        let kind = Kind::from_bits(first >> KIND_SHIFT);

        let (ordinal, mut len) = if first & EXTENDED == 0 {
            (u32::from(first & ORDINAL_MASK), 1)
        } else {
            let (ordinal, len) = shift_varint_left_3(bytes)?;
            let (ordinal, _) = varint::decode::<u32>(&ordinal)?;
            (ordinal, len)
        };

        if ordinal == 0 {
            return Err(Error::InvalidOrdinal);
        }

        let mut size = 0;
        if kind.is_sized() {
            let (value, read) = varint::decode::<u32>(&bytes[len..])?;
            size = value;
            len += read;
        }

        let header = Self {
            kind,
            ordinal,
            size,
        };
        Ok((header, len))
    }
}

/// Shifts a varint right by 3 bits as a whole.
///
/// Each output byte takes the low 3 bits of the previous input byte as its
/// high bits. The output is exactly one byte longer than the input and its
/// first byte has the top 3 bits cleared.
///
/// # Panics
///
/// Panics if `bytes` is longer than [`MAX_LEN_64`].
pub fn shift_varint_right_3(bytes: &[u8]) -> ArrayVec<u8, MAX_SHIFTED_LEN> {
    let mut out = ArrayVec::new();
    let mut carry = 0u8;
    for &b in bytes {
        out.push(carry | (b >> 3));
        carry = b << 5;
    }

    out.push(carry);
    out
}

/// Reverses [`shift_varint_right_3`], ignoring the top 3 bits of the first
/// byte.
///
/// Reconstruction stops at the first byte without a continuation bit. Returns
/// the varint together with the number of shifted bytes it took.
///
/// # Errors
///
/// Returns [`Error::UnexpectedEof`] if `bytes` ends before the varint does and
/// [`Error::VarintOverflow`] if it is longer than [`MAX_LEN_64`].
pub fn shift_varint_left_3(bytes: &[u8]) -> Result<(ArrayVec<u8, MAX_LEN_64>, usize)> {
    let mut high = bytes.first().ok_or(Error::UnexpectedEof)? & ORDINAL_MASK;
    let mut out = ArrayVec::new();
    for (index, &next) in bytes.iter().enumerate().skip(1).take(MAX_LEN_64) {
        let b = (high << 3) | (next >> 5);
        out.push(b);
        if b & 0x80 == 0 {
            return Ok((out, index + 1));
        }

        high = next;
    }

    if bytes.len() > MAX_LEN_64 {
        Err(Error::VarintOverflow(MAX_LEN_64))
    } else {
        Err(Error::UnexpectedEof)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::{Rng as _, SeedableRng as _};

    use super::*;

    fn round_trip(header: Header) -> usize {
        let buf = header.encode();
        assert_eq!(buf.len(), header.encoded_len(), "length must be predicted");

        let (decoded, len) = Header::decode(&buf).expect("decoding must work");
        assert_eq!(decoded, header, "header must round-trip");
        assert_eq!(len, buf.len(), "must consume the whole header");
        len
    }

    #[test]
    fn small_ordinal_single_byte() {
        let header = Header::new(Kind::ImplicitSize, 31, 0);
        assert_eq!(header.encode().as_slice(), &[0x1F], "no extension for 31");
        assert_eq!(round_trip(header), 1, "one byte for 31");

        let header = Header::new(Kind::ExplicitSize, 31, 5);
        assert_eq!(header.encode().as_slice(), &[0x5F, 0x05], "kind in top bits");
        assert_eq!(round_trip(header), 2, "one ordinal byte plus size");
    }

    #[test]
    fn large_ordinal_extended() {
        let header = Header::new(Kind::ImplicitSize, 32, 0);
        assert_eq!(header.encode().as_slice(), &[0x24, 0x00], "32 is extended");
        assert_eq!(round_trip(header), 2, "two bytes for 32");

        let header = Header::new(Kind::ExplicitSizeList, 32, 5);
        assert_eq!(header.encode().as_slice(), &[0xE4, 0x00, 0x05], "kind and flag");
        assert_eq!(round_trip(header), 3, "two ordinal bytes plus size");

        let header = Header::new(Kind::ImplicitSize, 127, 0);
        assert_eq!(header.encode().as_slice(), &[0x2F, 0xE0], "last single-byte varint");

        let header = Header::new(Kind::ExplicitSize, 128, 0);
        assert_eq!(
            header.encode().as_slice(),
            &[0x70, 0x00, 0x20, 0x00],
            "two-byte varint grows by one byte"
        );
        assert_eq!(round_trip(header), 4, "three ordinal bytes plus size");
    }

    #[test]
    fn largest_header() {
        let header = Header::new(Kind::ExplicitSizeList, u32::MAX, u32::MAX);
        assert_eq!(round_trip(header), Header::MAX_LEN, "max length is reached");
    }

    #[test]
    fn sparse_ordinal() {
        let header = Header::new(Kind::ExplicitSizeList, 567, 12);
        assert_eq!(round_trip(header), 4, "567 takes 3 bytes plus size");
    }

    #[test]
    fn random_round_trip() {
        let mut rng = StdRng::seed_from_u64(20_121_230);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let kind = Kind::from_bits(rng.random_range(0..4));
            let ordinal = rng.random_range(1..=32767);
            let size = rng.random();

            let header = Header::new(kind, ordinal, size);
            round_trip(header);
            seen.insert(header);

            assert_ne!(header, Header::new(kind.list(), ordinal + 1, size), "ordinal differs");
            assert_ne!(
                header,
                Header::new(Kind::ExplicitSize, ordinal, size.wrapping_add(1)),
                "size differs"
            );
        }

        assert!(seen.len() > 990, "headers with distinct fields must hash apart");
    }

    #[test]
    fn equality_covers_kind() {
        let a = Header::new(Kind::ExplicitSize, 4, 10);
        let b = Header::new(Kind::ImplicitSizeList, 4, 10);
        assert_ne!(a, b, "kind must take part in equality");
        assert_eq!(a, Header::new(Kind::ExplicitSize, 4, 10), "same fields are equal");
    }

    #[test]
    fn implicit_ignores_size() {
        let header = Header::new(Kind::ImplicitSize, 3, 99);
        assert_eq!(header.size(), 0, "implicit headers have no size");
        assert_eq!(round_trip(header), 1, "size must not be encoded");
    }

    #[test]
    fn shift_boundaries() {
        assert_eq!(shift_varint_right_3(&[0x1F]).as_slice(), &[0x03, 0xE0], "31");
        assert_eq!(shift_varint_right_3(&[0x20]).as_slice(), &[0x04, 0x00], "32");
        assert_eq!(
            shift_varint_right_3(&[0x80, 0x01]).as_slice(),
            &[0x10, 0x00, 0x20],
            "128"
        );

        let (bytes, len) = shift_varint_left_3(&[0x24, 0x00]).expect("32 must decode");
        assert_eq!((bytes.as_slice(), len), (&[0x20u8][..], 2), "32");

        let (bytes, len) = shift_varint_left_3(&[0x30, 0x00, 0x20, 0xFF]).expect("128 must decode");
        assert_eq!((bytes.as_slice(), len), (&[0x80u8, 0x01][..], 3), "128");
    }

    #[test]
    fn shift_u64_max() {
        let varint = varint::to_bytes(u64::MAX);
        assert_eq!(varint.len(), MAX_LEN_64, "u64::MAX takes the full length");

        let shifted = shift_varint_right_3(&varint);
        assert_eq!(shifted.len(), MAX_SHIFTED_LEN, "grows by exactly one byte");
        assert_eq!(shifted[0] & TAG_MASK, 0, "tag bits are free");

        let (back, len) = shift_varint_left_3(&shifted).expect("must decode");
        assert_eq!(back.as_slice(), varint.as_slice(), "must restore the varint");
        assert_eq!(len, MAX_SHIFTED_LEN, "must consume every shifted byte");
    }

    #[test]
    fn shift_left_malformed() {
        assert!(
            matches!(shift_varint_left_3(&[0x3F, 0xFF]), Err(Error::UnexpectedEof)),
            "unterminated varint"
        );
        assert!(
            matches!(shift_varint_left_3(&[0x3F; 12]), Err(Error::VarintOverflow(_))),
            "overlong varint"
        );
    }

    #[test]
    fn decode_malformed() {
        assert!(matches!(Header::decode(&[]), Err(Error::UnexpectedEof)), "empty");
        assert!(matches!(Header::decode(&[0x00]), Err(Error::InvalidOrdinal)), "ordinal 0");
        assert!(matches!(Header::decode(&[0x41]), Err(Error::UnexpectedEof)), "missing size");
        assert!(
            matches!(
                Header::decode(&[0x3F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x00]),
                Err(Error::VarintOverflow(_))
            ),
            "ordinal beyond 32 bits"
        );
    }
}
