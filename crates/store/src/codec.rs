//! Byte-exact encoding of primitive values used for keys and values.
//!
//! All fixed-width integers encode big-endian, so that for unsigned types
//! the lexicographic order of encoded keys equals numeric order. Booleans
//! encode as a single 0/1 byte, strings as raw UTF-8 with no terminator,
//! and byte sequences as-is. Decoding is the exact inverse; a slice of the
//! wrong length (or an invalid UTF-8 / boolean byte) is a [`Error::Decode`]
//! failure.
//!
//! [`Error::Decode`]: crate::Error::Decode

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use snafu::ensure;

use crate::error::{DecodeSnafu, Result};

/// A value with a deterministic, order-stable byte representation.
///
/// Used for both keys (where encoded ordering matters) and values.
pub trait Datum: Sized {
    /// Encodes the value into `buf`.
    fn encode_into(&self, buf: &mut Vec<u8>);

    /// Decodes a value from a byte slice, consuming the entire slice.
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Returns the encoded size of this value in bytes.
    fn encoded_len(&self) -> usize;

    /// Encodes the value into a fresh buffer.
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }
}

macro_rules! fixed_int_datum {
    ($ty:ty, $len:expr, $read:ident, $write:ident) => {
        impl Datum for $ty {
            fn encode_into(&self, buf: &mut Vec<u8>) {
                buf.$write::<BigEndian>(*self).unwrap();
            }

            fn decode(bytes: &[u8]) -> Result<Self> {
                ensure!(
                    bytes.len() == $len,
                    DecodeSnafu { type_name: stringify!($ty), len: bytes.len() }
                );
                Ok(BigEndian::$read(bytes))
            }

            fn encoded_len(&self) -> usize {
                $len
            }
        }
    };
}

fixed_int_datum!(u16, 2, read_u16, write_u16);
fixed_int_datum!(u32, 4, read_u32, write_u32);
fixed_int_datum!(u64, 8, read_u64, write_u64);
fixed_int_datum!(i16, 2, read_i16, write_i16);
fixed_int_datum!(i32, 4, read_i32, write_i32);
fixed_int_datum!(i64, 8, read_i64, write_i64);

impl Datum for u8 {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(*self);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() == 1, DecodeSnafu { type_name: "u8", len: bytes.len() });
        Ok(bytes[0])
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl Datum for i8 {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() == 1, DecodeSnafu { type_name: "i8", len: bytes.len() });
        Ok(bytes[0] as i8)
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl Datum for bool {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(u8::from(*self));
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() == 1, DecodeSnafu { type_name: "bool", len: bytes.len() });
        match bytes[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => DecodeSnafu { type_name: "bool", len: bytes.len() }.fail(),
        }
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl Datum for String {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => DecodeSnafu { type_name: "String", len: bytes.len() }.fail(),
        }
    }

    fn encoded_len(&self) -> usize {
        self.len()
    }
}

impl Datum for Vec<u8> {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }

    fn encoded_len(&self) -> usize {
        self.len()
    }
}
