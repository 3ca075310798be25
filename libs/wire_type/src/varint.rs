//! Variable-length integer encoding/decoding.
//!
//! Every integer on the wire is an unsigned LEB128 varint: 7 bits per byte,
//! lowest group first, with the high bit marking that another byte follows.
//! Signed integers are zigzag-mapped first so that small negative values stay
//! short. [`f32`] and [`f64`] are written as their raw bit pattern.
//!
//! See also: <https://en.wikipedia.org/wiki/LEB128>

use std::io;
use std::ops::{BitOr, BitOrAssign, Shl, Shr, ShrAssign};

use arrayvec::ArrayVec;

use crate::error::{Error, Result};

/// Maximum encoded length of a 32-bit value.
pub const MAX_LEN_32: usize = 5;
/// Maximum encoded length of a 64-bit value.
pub const MAX_LEN_64: usize = 10;

/// Supports the en-/decoding functions.
///
/// Implemented for [`u32`] and [`u64`].
trait Unsigned:
    Sized
    + Default
    + Copy
    + PartialOrd
    + Shr<usize, Output = Self>
    + Shl<usize, Output = Self>
    + ShrAssign<usize>
    + BitOr<Output = Self>
    + BitOrAssign
    + From<u8>
{
    const MAX_LEN: usize;

    fn trunc_u8(self) -> u8;
}

/// Declares a type as supporting being encoded as a varint.
///
/// This type essentially specifies a conversion to/from an unsigned type that
/// is then LEB128 encoded. For unsigned integers, that is a no-op, for signed
/// integers it is the zigzag mapping and for floats the bit pattern.
pub trait Varint: Sized + Copy {
    #[allow(private_bounds)]
    type Unsigned: Unsigned;

    /// The maximum number of bytes an encoded value of this type may take.
    const MAX_LEN: usize = <Self::Unsigned as Unsigned>::MAX_LEN;

    fn into_unsigned(self) -> Self::Unsigned;
    fn from_unsigned(value: Self::Unsigned) -> Self;
}

impl<T: Unsigned> Varint for T {
    type Unsigned = Self;

    fn into_unsigned(self) -> Self::Unsigned {
        self
    }

    fn from_unsigned(value: Self::Unsigned) -> Self {
        value
    }
}

/// Encodes a value into a stack buffer.
pub fn to_bytes<T: Varint>(value: T) -> ArrayVec<u8, MAX_LEN_64> {
    to_bytes_inner(value.into_unsigned())
}

fn to_bytes_inner<T: Unsigned>(mut x: T) -> ArrayVec<u8, MAX_LEN_64> {
    let mut buf = ArrayVec::new();
    while x >= T::from(0x80) {
        buf.push(x.trunc_u8() | 0x80);
        x >>= 7;
    }

    buf.push(x.trunc_u8());
    buf
}

/// Writes the encoded value to a [`io::Write`], returning the number of bytes
/// written.
///
/// # Errors
///
/// Returns any error of the underlying writer.
pub fn write<T, W>(mut writer: W, value: T) -> io::Result<usize>
where
    T: Varint,
    W: io::Write,
{
    let buf = to_bytes(value);
    writer.write_all(&buf)?;
    Ok(buf.len())
}

/// Gets the number of bytes the value takes when encoded.
pub fn encoded_len<T: Varint>(value: T) -> usize {
    encoded_len_inner(value.into_unsigned())
}

fn encoded_len_inner<T: Unsigned>(mut x: T) -> usize {
    let mut len = 1;
    while x >= T::from(0x80) {
        x >>= 7;
        len += 1;
    }

    len
}

/// Decodes a value from the start of `bytes`, returning it together with the
/// number of bytes it took.
///
/// # Errors
///
/// Returns [`Error::UnexpectedEof`] if `bytes` ends before the final byte of
/// the varint. Returns [`Error::VarintOverflow`] if the varint is longer than
/// [`Varint::MAX_LEN`] or its value doesn't fit the target type.
pub fn decode<T: Varint>(bytes: &[u8]) -> Result<(T, usize)> {
    decode_inner(bytes).map(|(x, len)| (T::from_unsigned(x), len))
}

fn decode_inner<T: Unsigned>(bytes: &[u8]) -> Result<(T, usize)> {
    let mut x = T::default();
    let mut s = 0usize;
    for (i, &b) in bytes.iter().take(T::MAX_LEN).enumerate() {
        // convert to shifted `T`
        // ensure that all bits fit into `T`
        let tb = T::from(b & 0x7F);
        let ts = tb << s;
        if ts >> s != tb {
            return Err(Error::VarintOverflow(T::MAX_LEN));
        }

        x |= ts;
        s += 7;

        if b < 0x80 {
            // No continuation bit is set
            return Ok((x, i + 1));
        }
    }

    if bytes.len() >= T::MAX_LEN {
        Err(Error::VarintOverflow(T::MAX_LEN))
    } else {
        Err(Error::UnexpectedEof)
    }
}

macro_rules! impl_unsigned {
    ($($Ty:ty => $max_len:expr),* $(,)?) => { $(
        impl Unsigned for $Ty {
            const MAX_LEN: usize = $max_len;

            #[allow(clippy::cast_possible_truncation)]
            fn trunc_u8(self) -> u8 {
                self as u8
            }
        }
    )* };
}

macro_rules! impl_zigzag {
    ($($Ty:ty as $Unsigned:ty),* $(,)?) => { $(
        impl Varint for $Ty {
            type Unsigned = $Unsigned;

            #[allow(clippy::cast_sign_loss)]
            fn into_unsigned(self) -> Self::Unsigned {
                let mut x = (self as $Unsigned) << 1;
                if self < 0 {
                    x = !x;
                }
                x
            }

            #[allow(clippy::cast_possible_wrap)]
            fn from_unsigned(value: Self::Unsigned) -> Self {
                let mut x = value >> 1;
                if value & 1 != 0 {
                    x = !x;
                }
                x as $Ty
            }
        }
    )* };
}

macro_rules! impl_float {
    ($($Ty:ty as $Unsigned:ty),* $(,)?) => { $(
        impl Varint for $Ty {
            type Unsigned = $Unsigned;

            fn into_unsigned(self) -> Self::Unsigned {
                self.to_bits()
            }

            fn from_unsigned(value: Self::Unsigned) -> Self {
                <$Ty>::from_bits(value)
            }
        }
    )* };
}

impl_unsigned!(u32 => MAX_LEN_32, u64 => MAX_LEN_64);
impl_zigzag!(i32 as u32, i64 as u64);
impl_float!(f32 as u32, f64 as u64);

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng as _, SeedableRng as _};

    use super::*;

    macro_rules! round_trip {
        ($fn_name:ident, $Ty:ty, $values:expr) => {
            #[test]
            fn $fn_name() {
                const VALUES: &[$Ty] = &$values;
                let mut buf = Vec::new();
                for &v in VALUES {
                    buf.clear();
                    let written = write(&mut buf, v).expect("encoding worked");

                    let (r, read): ($Ty, usize) = decode(&buf).expect("decoding worked");
                    assert_eq!(v.to_bits_or_self(), r.to_bits_or_self(), "must be equal");
                    assert_eq!(written, read, "must consume what was written");
                    assert_eq!(written, encoded_len(v), "length must be predicted");
                }
            }
        };
    }

    /// Compares floats by bit pattern so NaN round-trips can be checked.
    trait BitsOrSelf {
        type Out: PartialEq + std::fmt::Debug;
        fn to_bits_or_self(self) -> Self::Out;
    }

    macro_rules! impl_bits_or_self {
        ($($Ty:ty => $Out:ty, $e:expr;)*) => { $(
            impl BitsOrSelf for $Ty {
                type Out = $Out;
                fn to_bits_or_self(self) -> $Out {
                    let f: fn($Ty) -> $Out = $e;
                    f(self)
                }
            }
        )* };
    }

    impl_bits_or_self! {
        u32 => u32, |v| v;
        u64 => u64, |v| v;
        i32 => i32, |v| v;
        i64 => i64, |v| v;
        f32 => u32, f32::to_bits;
        f64 => u64, f64::to_bits;
    }

    round_trip!(
        round_trip_u32,
        u32,
        [0, 1, 127, 128, 500, 16_383, 16_384, 500_000_000, u32::MAX]
    );
    round_trip!(
        round_trip_u64,
        u64,
        [0, 1, 127, 128, 500_000_000, 5_000_000_000_000_000_000, u64::MAX]
    );
    round_trip!(
        round_trip_i32,
        i32,
        [0, 1, -1, 63, -64, 64, -65, 500_000_000, -500_000_000, i32::MIN, i32::MAX]
    );
    round_trip!(
        round_trip_i64,
        i64,
        [
            0,
            1,
            -1,
            5_000_000_000_000_000_000,
            -5_000_000_000_000_000_000,
            i64::MIN,
            i64::MAX
        ]
    );
    round_trip!(
        round_trip_f32,
        f32,
        [0.0, -0.0, 1.5, -2.25, f32::MIN, f32::MAX, f32::EPSILON, f32::INFINITY, f32::NAN]
    );
    round_trip!(
        round_trip_f64,
        f64,
        [0.0, -0.0, 1.5, -2.25, f64::MIN, f64::MAX, f64::NEG_INFINITY, f64::NAN]
    );

    #[test]
    fn random_round_trip() {
        let mut rng = StdRng::seed_from_u64(19_770_407);
        for _ in 0..1000 {
            let v: u64 = rng.random();
            let buf = to_bytes(v);
            assert_eq!(decode::<u64>(&buf).ok(), Some((v, buf.len())), "u64 must round-trip");

            let v: i32 = rng.random();
            let buf = to_bytes(v);
            assert_eq!(decode::<i32>(&buf).ok(), Some((v, buf.len())), "i32 must round-trip");
        }
    }

    #[test]
    fn zigzag_mapping() {
        assert_eq!(0i32.into_unsigned(), 0, "0 maps to 0");
        assert_eq!((-1i32).into_unsigned(), 1, "-1 maps to 1");
        assert_eq!(1i32.into_unsigned(), 2, "1 maps to 2");
        assert_eq!((-2i32).into_unsigned(), 3, "-2 maps to 3");
        assert_eq!(i32::MAX.into_unsigned(), u32::MAX - 1, "max maps to max-1");
        assert_eq!(i32::MIN.into_unsigned(), u32::MAX, "min maps to max");
        assert_eq!(i64::MIN.into_unsigned(), u64::MAX, "min maps to max");
    }

    #[test]
    fn encoded_lengths() {
        assert_eq!(to_bytes(1_290_835_501i32).len(), 5, "large i32");
        assert_eq!(to_bytes(9_092_287_277_766_530_722i64).len(), 10, "large i64");
        assert_eq!(to_bytes(1_011_573_654u32).len(), 5, "large u32");
        assert_eq!(to_bytes(5_544_096_263_427_738_395u64).len(), 9, "large u64");
        assert_eq!(to_bytes(u32::MAX).len(), MAX_LEN_32, "u32 cap");
        assert_eq!(to_bytes(u64::MAX).len(), MAX_LEN_64, "u64 cap");
        assert_eq!(to_bytes(-64i32).as_slice(), &[0x7F], "-64 fits one byte");
        assert_eq!(to_bytes(300u32).as_slice(), &[0xAC, 0x02], "300 per LEB128");
    }

    #[test]
    fn small_values_compact() {
        let mut buf = Vec::new();
        for v in -512i32..512 {
            write(&mut buf, v).expect("writing to vec works");
        }

        assert!(
            buf.len() < 1024 * size_of::<i32>(),
            "small values must encode shorter than fixed width, got {}",
            buf.len()
        );

        let mut rest = buf.as_slice();
        for v in -512i32..512 {
            let (r, len) = decode::<i32>(rest).expect("must decode");
            assert_eq!(r, v, "values must come back in order");
            rest = &rest[len..];
        }

        assert!(rest.is_empty(), "everything must be consumed");
    }

    #[test]
    fn length_cap() {
        assert!(
            matches!(decode::<u32>(&[0xFF; 6]), Err(Error::VarintOverflow(MAX_LEN_32))),
            "continuation past 5 bytes must fail"
        );
        assert!(
            matches!(decode::<u64>(&[0x80; 11]), Err(Error::VarintOverflow(MAX_LEN_64))),
            "continuation past 10 bytes must fail"
        );
        assert!(
            matches!(decode::<u32>(&[0xFF, 0xFF, 0xFF, 0xFF, 0x1F]), Err(Error::VarintOverflow(_))),
            "value beyond 32 bits must fail"
        );
        assert!(
            matches!(decode::<u64>(&[0xFF, 0xFF]), Err(Error::UnexpectedEof)),
            "cut-off varint must report eof"
        );
        assert!(
            matches!(decode::<u32>(&[]), Err(Error::UnexpectedEof)),
            "empty input must report eof"
        );
    }

    #[test]
    fn trailing_bytes_ignored() {
        let (v, len) = decode::<u32>(&[0x05, 0xFF, 0xFF]).expect("must decode");
        assert_eq!((v, len), (5, 1), "only the first varint is read");
    }
}
