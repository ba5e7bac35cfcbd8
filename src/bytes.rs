//! Length-aware cursor over an in-memory byte window.
//!
//! Page and chunk parsing goes through this reader so that underruns surface
//! as errors instead of slice panics.

use crate::encoding::uleb128;
use crate::error::{ParquetError, ParquetResult};

#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Consumes and returns the next `count` bytes.
    #[inline]
    pub fn take(&mut self, count: usize) -> ParquetResult<&'a [u8]> {
        if count > self.remaining() {
            return Err(ParquetError::eof(format!(
                "wanted {count} bytes, {} left in buffer",
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Consumes the rest of the window.
    #[inline]
    pub fn take_remaining(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    #[inline]
    pub fn read_u8(&mut self) -> ParquetResult<u8> {
        Ok(self.take(1)?[0])
    }

    #[inline]
    pub fn read_u32_le(&mut self) -> ParquetResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    #[inline]
    pub fn read_uleb128(&mut self) -> ParquetResult<u32> {
        let (value, consumed) = uleb128::decode(&self.data[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParquetErrorKind;

    #[test]
    fn test_take_advances() {
        let mut reader = ByteReader::new(&[1, 2, 3, 4, 5]);
        assert_eq!(reader.take(2).unwrap(), &[1, 2]);
        assert_eq!(reader.remaining(), 3);
        assert_eq!(reader.take(3).unwrap(), &[3, 4, 5]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_take_underrun_is_an_io_error() {
        let mut reader = ByteReader::new(&[1, 2]);
        let err = reader.take(3).unwrap_err();
        assert!(matches!(err.kind(), ParquetErrorKind::Io(_)));
        // the cursor does not move on failure
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn test_read_u32_le() {
        let mut reader = ByteReader::new(&[0x0a, 0x00, 0x00, 0x00, 0xff]);
        assert_eq!(reader.read_u32_le().unwrap(), 10);
        assert_eq!(reader.read_u8().unwrap(), 0xff);
    }

    #[test]
    fn test_read_uleb128_advances_past_the_varint() {
        let mut reader = ByteReader::new(&[0x80, 0x01, 0x07]);
        assert_eq!(reader.read_uleb128().unwrap(), 128);
        assert_eq!(reader.read_u8().unwrap(), 7);
    }
}
