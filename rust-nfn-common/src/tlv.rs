//! TLV (Type-Length-Value) encoding and decoding utilities.
//!
//! Types and lengths share the NDN variable-size number scheme. The
//! NDNLPv2 Nack header types (0x0320, 0x0321) exceed one byte, so unlike
//! plain NDN 0.2 both fields are encoded through [`encode_var_number`].

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// NDN TLV packet and element types
pub const TLV_IMPLICIT_SHA256_DIGEST_COMPONENT: u64 = 0x01;
pub const TLV_INTEREST: u64 = 0x05;
pub const TLV_DATA: u64 = 0x06;
pub const TLV_NAME: u64 = 0x07;
pub const TLV_COMPONENT: u64 = 0x08;
pub const TLV_NONCE: u64 = 0x0A;
pub const TLV_META_INFO: u64 = 0x14;
pub const TLV_CONTENT: u64 = 0x15;

/// NDNLPv2 link protocol types
pub const TLV_LP_PACKET: u64 = 0x64;
pub const TLV_LP_FRAGMENT: u64 = 0x50;
pub const TLV_LP_NACK: u64 = 0x0320;
pub const TLV_LP_NACK_REASON: u64 = 0x0321;

/// Encodes an NDN variable-size number.
///
/// - If the value < 253, uses 1 byte
/// - If the value fits 16 bits, uses 3 bytes (253 + 2 bytes)
/// - Otherwise uses 5 bytes (254 + 4 bytes)
pub fn encode_var_number(value: u64, buf: &mut BytesMut) {
    if value < 253 {
        buf.put_u8(value as u8);
    } else if value <= 65535 {
        buf.put_u8(253);
        buf.put_u16(value as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(value as u32);
    }
}

/// Decodes an NDN variable-size number.
pub fn decode_var_number(buf: &mut impl Buf) -> Result<u64, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("buffer underflow when decoding var number".into()));
    }

    let first_byte = buf.get_u8();

    match first_byte {
        0..=252 => Ok(first_byte as u64),

        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv("buffer underflow when decoding 16-bit var number".into()));
            }
            Ok(buf.get_u16() as u64)
        }

        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv("buffer underflow when decoding 32-bit var number".into()));
            }
            Ok(buf.get_u32() as u64)
        }

        // 64-bit numbers are not used by any type or length we emit.
        255 => Err(Error::Tlv("64-bit var numbers not supported".into())),
    }
}

/// Returns the number of bytes [`encode_var_number`] uses for `value`.
pub fn var_number_size(value: u64) -> usize {
    if value < 253 {
        1
    } else if value <= 65535 {
        3
    } else {
        5
    }
}

/// A generic TLV element consisting of a type, length, and value.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u64,
    pub value: Bytes,
}

impl TlvElement {
    /// Creates a new TLV element.
    pub fn new(tlv_type: u64, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Returns the total length of this TLV element when encoded.
    pub fn len(&self) -> usize {
        let value_len = self.value.len();
        var_number_size(self.tlv_type) + var_number_size(value_len as u64) + value_len
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Encodes this TLV element into the provided buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_var_number(self.tlv_type, buf);
        encode_var_number(self.value.len() as u64, buf);
        buf.extend_from_slice(&self.value);
    }

    /// Decodes a TLV element from the provided buffer.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        let tlv_type = decode_var_number(buf)?;
        let length = decode_var_number(buf)? as usize;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        Ok(Self {
            tlv_type,
            value: buf.copy_to_bytes(length),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_number_round_trip() {
        for value in [0u64, 1, 100, 252, 253, 1000, 65535, 65536, 0x0320, 1_000_000] {
            let mut buf = BytesMut::new();
            encode_var_number(value, &mut buf);
            assert_eq!(buf.len(), var_number_size(value));
            let decoded = decode_var_number(&mut buf.freeze()).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn var_number_boundaries() {
        let mut buf = BytesMut::new();
        encode_var_number(252, &mut buf);
        assert_eq!(buf.len(), 1);

        buf.clear();
        encode_var_number(253, &mut buf);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf[0], 253);

        buf.clear();
        encode_var_number(65536, &mut buf);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf[0], 254);
    }

    #[test]
    fn element_round_trip() {
        let element = TlvElement::new(TLV_COMPONENT, &b"abc"[..]);
        let mut buf = BytesMut::new();
        element.encode(&mut buf);
        assert_eq!(buf.len(), element.len());

        let decoded = TlvElement::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, element);
    }

    #[test]
    fn element_truncated_value() {
        let mut buf = BytesMut::new();
        encode_var_number(TLV_COMPONENT, &mut buf);
        encode_var_number(10, &mut buf);
        buf.extend_from_slice(b"abc");
        assert!(TlvElement::decode(&mut buf.freeze()).is_err());
    }

    #[test]
    fn wide_type_round_trip() {
        let element = TlvElement::new(TLV_LP_NACK, Bytes::new());
        let mut buf = BytesMut::new();
        element.encode(&mut buf);
        // 3-byte type, 1-byte length
        assert_eq!(buf.len(), 4);
        let decoded = TlvElement::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.tlv_type, TLV_LP_NACK);
    }
}
