//! ULEB128 ("varint") decoding: 7 data bits per byte in little-endian
//! groups, high bit set on continuation bytes.

use crate::error::{fmt_err, ParquetError, ParquetResult};

/// A run indicator carries at most 32 significant bits, so 5 bytes.
pub const MAX_LEN: usize = 5;

/// Decodes one varint from the head of `data`, returning the value and the
/// number of bytes consumed. Varints longer than [`MAX_LEN`] bytes or using
/// more than 32 significant bits are rejected up front.
pub fn decode(data: &[u8]) -> ParquetResult<(u32, usize)> {
    let mut value = 0u32;
    for (index, byte) in data.iter().enumerate() {
        if index == MAX_LEN {
            return Err(fmt_err!(VarintOverflow, "varint runs over {MAX_LEN} bytes"));
        }
        let group = u32::from(byte & 0x7f);
        if index == MAX_LEN - 1 && group > 0x0f {
            return Err(fmt_err!(
                VarintOverflow,
                "varint uses more than 32 significant bits"
            ));
        }
        value |= group << (7 * index);
        if byte & 0x80 == 0 {
            return Ok((value, index + 1));
        }
    }
    Err(ParquetError::eof(
        "varint ended before its terminating byte",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParquetErrorKind;

    #[test]
    fn test_decode_single_byte() {
        assert_eq!(decode(&[0x00]).unwrap(), (0, 1));
        assert_eq!(decode(&[0x7f]).unwrap(), (127, 1));
        // trailing bytes are left alone
        assert_eq!(decode(&[0x05, 0xff]).unwrap(), (5, 1));
    }

    #[test]
    fn test_decode_multi_byte() {
        assert_eq!(decode(&[0x80, 0x01]).unwrap(), (128, 2));
        assert_eq!(decode(&[0xe5, 0x8e, 0x26]).unwrap(), (624485, 3));
        assert_eq!(
            decode(&[0xff, 0xff, 0xff, 0xff, 0x0f]).unwrap(),
            (u32::MAX, 5)
        );
    }

    #[test]
    fn test_rejects_more_than_32_bits() {
        let err = decode(&[0xff, 0xff, 0xff, 0xff, 0x1f]).unwrap_err();
        assert!(matches!(err.kind(), ParquetErrorKind::VarintOverflow));

        let err = decode(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]).unwrap_err();
        assert!(matches!(err.kind(), ParquetErrorKind::VarintOverflow));
    }

    #[test]
    fn test_rejects_truncated_input() {
        let err = decode(&[0x80, 0x80]).unwrap_err();
        assert!(matches!(err.kind(), ParquetErrorKind::Io(_)));
    }
}
