use std::num::NonZeroU16;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use bytestring::ByteString;

use crate::error::{DecodeError, EncodeError};

macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            return Err($e);
        }
    };
}

macro_rules! prim_enum {
    (
        $( #[$enum_attr:meta] )*
        pub enum $name:ident {
            $(
                $( #[$enum_item_attr:meta] )*
                $var:ident=$val:expr
            ),+
        }) => {
        $( #[$enum_attr] )*
        #[repr(u8)]
        #[derive(Debug, Eq, PartialEq, Copy, Clone)]
        pub enum $name {
            $(
                $( #[$enum_item_attr] )*
                $var = $val
            ),+
        }
        impl std::convert::TryFrom<u8> for $name {
            type Error = $crate::error::DecodeError;
            fn try_from(v: u8) -> Result<Self, Self::Error> {
                match v {
                    $($val => Ok($name::$var)),+
                    ,_ => Err($crate::error::DecodeError::MalformedPacket)
                }
            }
        }
    };
}

/// Wire-primitive reads. Every implementation consumes from the front of the
/// frame body and fails with `InvalidLength` when the field overruns it.
pub(crate) trait Decode: Sized {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError>;
}

impl Decode for u16 {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        ensure!(src.remaining() >= 2, DecodeError::InvalidLength);
        Ok(src.get_u16())
    }
}

impl Decode for NonZeroU16 {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        NonZeroU16::new(u16::decode(src)?).ok_or(DecodeError::ZeroPacketId)
    }
}

impl Decode for Bytes {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        let len = u16::decode(src)? as usize;
        ensure!(src.remaining() >= len, DecodeError::InvalidLength);
        Ok(src.split_to(len))
    }
}

impl Decode for ByteString {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        ByteString::try_from(Bytes::decode(src)?).map_err(|_| DecodeError::Utf8Error)
    }
}

/// Wire-primitive writes, mirroring [`Decode`].
pub(crate) trait Encode {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError>;
}

impl Encode for u16 {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u16(*self);
        Ok(())
    }
}

impl Encode for NonZeroU16 {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        self.get().encode(buf)
    }
}

impl Encode for Bytes {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let len = u16::try_from(self.len()).map_err(|_| EncodeError::InvalidLength)?;
        buf.put_u16(len);
        buf.extend_from_slice(self.as_ref());
        Ok(())
    }
}

impl Encode for ByteString {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        self.as_bytes().encode(buf)
    }
}

impl Encode for &[u8] {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let len = u16::try_from(self.len()).map_err(|_| EncodeError::InvalidLength)?;
        buf.put_u16(len);
        buf.extend_from_slice(self);
        Ok(())
    }
}

/// Decode the remaining-length varint from the front of `src`.
///
/// Returns `Ok(Some((value, bytes_consumed)))` for a complete encoding and
/// `Ok(None)` when `src` ends before the terminating byte. A 4th byte with
/// the continuation bit still set can never terminate and is fatal.
pub(crate) fn decode_variable_length(src: &[u8]) -> Result<Option<(u32, usize)>, DecodeError> {
    let mut value: u32 = 0;
    for (i, &byte) in src.iter().enumerate().take(4) {
        value |= ((byte & 0b0111_1111) as u32) << (7 * i);
        if byte & 0b1000_0000 == 0 {
            return Ok(Some((value, i + 1)));
        }
        if i == 3 {
            return Err(DecodeError::RemainingLengthOverflow);
        }
    }
    Ok(None)
}

/// Encode `len` as a remaining-length varint (1-4 bytes, low groups first).
pub(crate) fn write_variable_length(mut len: u32, dst: &mut BytesMut) {
    debug_assert!(len <= crate::types::MAX_REMAINING_LENGTH);
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0b1000_0000;
        }
        dst.put_u8(byte);
        if len == 0 {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_variable_length() {
        fn assert_variable_length<B: AsRef<[u8]> + 'static>(bytes: B, res: (u32, usize)) {
            assert_eq!(decode_variable_length(bytes.as_ref()).unwrap(), Some(res));
        }

        assert_variable_length(b"\x00", (0, 1));
        assert_variable_length(b"\x7f", (127, 1));
        assert_variable_length(b"\x80\x01", (128, 2));
        assert_variable_length(b"\xff\x7f", (16383, 2));
        assert_variable_length(b"\x80\x80\x01", (16384, 3));
        assert_variable_length(b"\xff\xff\x7f", (2_097_151, 3));
        assert_variable_length(b"\x80\x80\x80\x01", (2_097_152, 4));
        assert_variable_length(b"\xff\xff\xff\x7f", (268_435_455, 4));

        // only the leading encoding is read
        assert_variable_length(b"\x7f\x7f", (127, 1));

        // continuation bit set on every byte so far: incomplete, not an error
        assert_eq!(decode_variable_length(b"\xff\xff\xff").unwrap(), None);
        assert_eq!(decode_variable_length(b"").unwrap(), None);

        // a 4th continuation byte can never terminate
        assert!(matches!(
            decode_variable_length(b"\xff\xff\xff\xff"),
            Err(DecodeError::RemainingLengthOverflow)
        ));
        assert!(matches!(
            decode_variable_length(b"\xff\xff\xff\xff\x7f"),
            Err(DecodeError::RemainingLengthOverflow)
        ));
    }

    #[test]
    fn test_encode_variable_length() {
        let mut v = BytesMut::new();

        write_variable_length(123, &mut v);
        assert_eq!(v, [123].as_ref());

        v.clear();

        write_variable_length(129, &mut v);
        assert_eq!(v, b"\x81\x01".as_ref());

        v.clear();

        write_variable_length(16_383, &mut v);
        assert_eq!(v, b"\xff\x7f".as_ref());

        v.clear();

        write_variable_length(2_097_151, &mut v);
        assert_eq!(v, b"\xff\xff\x7f".as_ref());

        v.clear();

        write_variable_length(268_435_455, &mut v);
        assert_eq!(v, b"\xff\xff\xff\x7f".as_ref());
    }

    #[test]
    fn test_variable_length_round_trip() {
        for len in [0u32, 127, 128, 16_383, 16_384, 2_097_151, 2_097_152, 268_435_455] {
            let mut v = BytesMut::new();
            write_variable_length(len, &mut v);
            assert_eq!(decode_variable_length(&v).unwrap(), Some((len, v.len())));
        }
    }

    #[test]
    fn test_decode_zero_packet_id() {
        assert!(matches!(
            NonZeroU16::decode(&mut Bytes::from_static(b"\x00\x00")),
            Err(DecodeError::ZeroPacketId)
        ));
        assert_eq!(
            NonZeroU16::decode(&mut Bytes::from_static(b"\x43\x21")).unwrap(),
            NonZeroU16::new(0x4321).unwrap()
        );
    }

    #[test]
    fn test_decode_string_overrun() {
        // advertised length runs past the available bytes
        assert!(matches!(
            ByteString::decode(&mut Bytes::from_static(b"\x00\x05abc")),
            Err(DecodeError::InvalidLength)
        ));
        assert!(matches!(
            ByteString::decode(&mut Bytes::from_static(b"\x00\x02\xff\xfe")),
            Err(DecodeError::Utf8Error)
        ));
    }
}
