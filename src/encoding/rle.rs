//! Hybrid RLE / bit-packed decoding.
//!
//! The stream is a concatenation of runs, each introduced by a varint
//! indicator. An indicator with the low bit set starts a literal run of
//! `(indicator >> 1) * 8` bit-packed values; with the low bit clear it
//! starts a repeated run of `indicator >> 1` copies of a single value stored
//! in `ceil(num_bits / 8)` little-endian bytes. Definition levels and
//! dictionary index pages both use this encoding.

use crate::bytes::ByteReader;
use crate::encoding::bitpacked::{decode_pack, Unpackable, Unpacked};
use crate::error::{fmt_err, ParquetResult};

/// Values decoded from a literal run per scratch-buffer fill.
const LITERAL_BATCH: usize = 1024;

#[derive(Debug)]
pub struct HybridRleDecoder<'a, T: Unpackable> {
    reader: ByteReader<'a>,
    num_bits: usize,
    repeat_value: T,
    repeat_remaining: usize,
    literal_data: &'a [u8],
    literal_consumed: usize,
    literal_remaining: usize,
}

impl<'a, T: Unpackable> HybridRleDecoder<'a, T> {
    pub fn try_new(data: &'a [u8], num_bits: usize) -> ParquetResult<Self> {
        if num_bits >= 64 {
            return Err(fmt_err!(
                UnsupportedBitWidth,
                "bit width {num_bits} is too large for hybrid RLE"
            ));
        }
        Ok(Self {
            reader: ByteReader::new(data),
            num_bits,
            repeat_value: T::default(),
            repeat_remaining: 0,
            literal_data: &[],
            literal_consumed: 0,
            literal_remaining: 0,
        })
    }

    /// Decodes up to `dst.len()` values. Returns the number of values
    /// produced, which is less than requested only at end of buffer.
    pub fn get_batch(&mut self, dst: &mut [T]) -> ParquetResult<usize> {
        let mut read = 0;
        while read < dst.len() {
            if self.repeat_remaining > 0 {
                let take = self.repeat_remaining.min(dst.len() - read);
                dst[read..read + take].fill(self.repeat_value);
                self.repeat_remaining -= take;
                read += take;
            } else if self.literal_remaining > 0 {
                let take = self.literal_remaining.min(dst.len() - read);
                self.read_literals(&mut dst[read..read + take]);
                read += take;
            } else if !self.next_run()? {
                break;
            }
        }
        Ok(read)
    }

    /// Decodes `num_values - null_count` values and spreads them across
    /// `dst[..num_values]` according to `defined`: a slot with a non-zero
    /// mask byte consumes the next decoded value, a zero slot is left
    /// untouched and does not advance the stream.
    pub fn get_batch_spaced(
        &mut self,
        num_values: usize,
        null_count: usize,
        defined: &[u8],
        dst: &mut [T],
    ) -> ParquetResult<usize> {
        debug_assert!(defined.len() >= num_values);
        debug_assert!(dst.len() >= num_values);
        let mut scratch = [T::default(); LITERAL_BATCH];
        let mut values_read = 0usize;
        let mut remaining_nulls = null_count;

        while values_read < num_values {
            if defined[values_read] == 0 {
                values_read += 1;
                remaining_nulls = remaining_nulls.saturating_sub(1);
                continue;
            }

            if self.repeat_remaining == 0 && self.literal_remaining == 0 && !self.next_run()? {
                break;
            }

            if self.repeat_remaining > 0 {
                // Walk the mask while the run lasts; null slots are crossed
                // without consuming from the run.
                let mut batch = 0;
                while values_read + batch < num_values && self.repeat_remaining > 0 {
                    if defined[values_read + batch] != 0 {
                        self.repeat_remaining -= 1;
                    } else {
                        remaining_nulls = remaining_nulls.saturating_sub(1);
                    }
                    batch += 1;
                }
                for slot in 0..batch {
                    if defined[values_read + slot] != 0 {
                        dst[values_read + slot] = self.repeat_value;
                    }
                }
                values_read += batch;
            } else {
                let defined_left = (num_values - values_read)
                    .saturating_sub(remaining_nulls)
                    .max(1);
                let literal_batch = self
                    .literal_remaining
                    .min(defined_left)
                    .min(LITERAL_BATCH);
                self.read_literals(&mut scratch[..literal_batch]);

                let mut placed = 0;
                while placed < literal_batch && values_read < num_values {
                    if defined[values_read] != 0 {
                        dst[values_read] = scratch[placed];
                        placed += 1;
                    } else {
                        remaining_nulls = remaining_nulls.saturating_sub(1);
                    }
                    values_read += 1;
                }
            }
        }
        Ok(values_read)
    }

    /// Reads the next run indicator. Returns `false` at end of buffer.
    fn next_run(&mut self) -> ParquetResult<bool> {
        if self.reader.is_empty() {
            return Ok(false);
        }
        let indicator = self.reader.read_uleb128()?;
        if indicator & 1 == 1 {
            if self.num_bits > T::MAX_LITERAL_WIDTH {
                return Err(fmt_err!(
                    UnsupportedBitWidth,
                    "bit width {} is too wide for bit-packed runs",
                    self.num_bits
                ));
            }
            let count = (indicator >> 1) as usize * 8;
            let total_bytes = count * self.num_bits / 8;
            // A truncated stream decodes its tail as zeros rather than
            // reading out of bounds.
            let take = total_bytes.min(self.reader.remaining());
            self.literal_data = self.reader.take(take)?;
            self.literal_consumed = 0;
            self.literal_remaining = count;
        } else {
            let count = (indicator >> 1) as usize;
            let bytes = self.reader.take(self.num_bits.div_ceil(8))?;
            let mut value = 0u64;
            for (index, byte) in bytes.iter().enumerate() {
                value |= u64::from(*byte) << (8 * index);
            }
            if value > (1u64 << self.num_bits) - 1 {
                return Err(fmt_err!(
                    CorruptPayload,
                    "repeated value {value} does not fit in {} bits",
                    self.num_bits
                ));
            }
            self.repeat_value = T::from_u64(value);
            self.repeat_remaining = count;
        }
        Ok(true)
    }

    /// Drains `dst.len()` values from the current literal run, which must
    /// hold at least that many.
    fn read_literals(&mut self, dst: &mut [T]) {
        debug_assert!(dst.len() <= self.literal_remaining);
        let pack_len = T::Unpacked::LENGTH;
        let mut out = 0;
        while out < dst.len() {
            let pack_index = self.literal_consumed / pack_len;
            let within = self.literal_consumed % pack_len;
            let take = (pack_len - within).min(dst.len() - out);
            let byte_start = pack_index * pack_len * self.num_bits / 8;
            let packed = if byte_start < self.literal_data.len() {
                &self.literal_data[byte_start..]
            } else {
                &[]
            };
            let mut pack = T::Unpacked::zero();
            decode_pack::<T>(packed, self.num_bits, &mut pack);
            dst[out..out + take].copy_from_slice(&pack.as_ref()[within..within + take]);
            self.literal_consumed += take;
            self.literal_remaining -= take;
            out += take;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParquetErrorKind;

    /// Bit-packs `values` at `num_bits` as a single literal run.
    fn literal_run(values: &[u32], num_bits: usize) -> Vec<u8> {
        let groups = values.len().div_ceil(8);
        let mut out = vec![(groups as u8) << 1 | 1];
        let mut data = vec![0u8; groups * num_bits];
        for (index, &value) in values.iter().enumerate() {
            for bit in 0..num_bits {
                if value >> bit & 1 == 1 {
                    let pos = index * num_bits + bit;
                    data[pos / 8] |= 1 << (pos % 8);
                }
            }
        }
        out.extend_from_slice(&data);
        out
    }

    fn repeated_run(value: u32, count: usize, num_bits: usize) -> Vec<u8> {
        let mut out = vec![(count as u8) << 1];
        out.extend_from_slice(&value.to_le_bytes()[..num_bits.div_ceil(8)]);
        out
    }

    #[test]
    fn test_literal_run_round_trips() {
        let expected: Vec<u32> = (0..40).map(|i| i % 8).collect();
        let data = literal_run(&expected, 3);
        let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 3).unwrap();
        let mut out = vec![0u32; 40];
        assert_eq!(decoder.get_batch(&mut out).unwrap(), 40);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_repeated_run_fills_value() {
        let data = repeated_run(5, 17, 3);
        let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 3).unwrap();
        let mut out = vec![0u32; 17];
        assert_eq!(decoder.get_batch(&mut out).unwrap(), 17);
        assert_eq!(out, vec![5; 17]);
    }

    #[test]
    fn test_alternating_runs() {
        let mut data = repeated_run(2, 10, 3);
        data.extend(literal_run(&[0, 1, 2, 3, 4, 5, 6, 7], 3));
        data.extend(repeated_run(7, 4, 3));
        let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 3).unwrap();
        let mut out = vec![0u32; 22];
        assert_eq!(decoder.get_batch(&mut out).unwrap(), 22);
        let mut expected = vec![2u32; 10];
        expected.extend([0, 1, 2, 3, 4, 5, 6, 7]);
        expected.extend([7, 7, 7, 7]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_get_batch_stops_at_end_of_buffer() {
        let data = repeated_run(1, 4, 1);
        let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 1).unwrap();
        let mut out = vec![9u32; 10];
        assert_eq!(decoder.get_batch(&mut out).unwrap(), 4);
        assert_eq!(&out[..4], &[1, 1, 1, 1]);
    }

    #[test]
    fn test_width_zero_consumes_nothing() {
        let data = literal_run(&[0; 8], 0);
        assert_eq!(data.len(), 1); // just the indicator
        let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 0).unwrap();
        let mut out = vec![3u32; 8];
        assert_eq!(decoder.get_batch(&mut out).unwrap(), 8);
        assert_eq!(out, vec![0; 8]);
    }

    #[test]
    fn test_width_32_literal_run() {
        let expected = [u32::MAX, 0, 0xdead_beef, 42, 7, 1, 2, 3];
        let data = literal_run(&expected, 32);
        let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 32).unwrap();
        let mut out = vec![0u32; 8];
        assert_eq!(decoder.get_batch(&mut out).unwrap(), 8);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_repeated_value_above_width_is_corrupt() {
        // width 2 admits 0..=3; 9 needs 4 bits
        let data = repeated_run(9, 3, 2);
        let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 2).unwrap();
        let mut out = vec![0u32; 3];
        let err = decoder.get_batch(&mut out).unwrap_err();
        assert!(matches!(err.kind(), ParquetErrorKind::CorruptPayload));
    }

    #[test]
    fn test_rejects_wide_bit_widths() {
        let err = HybridRleDecoder::<u32>::try_new(&[], 64).unwrap_err();
        assert!(matches!(err.kind(), ParquetErrorKind::UnsupportedBitWidth));

        // width 33..63 only fails once a literal run needs the unpacker
        let data = literal_run(&[0; 8], 0);
        let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 40).unwrap();
        let mut out = vec![0u32; 8];
        let err = decoder.get_batch(&mut out).unwrap_err();
        assert!(matches!(err.kind(), ParquetErrorKind::UnsupportedBitWidth));
    }

    #[test]
    fn test_u8_definition_levels() {
        let mut data = literal_run(&[1, 0, 1, 1, 0, 1, 1, 1], 1);
        data.extend(repeated_run(1, 5, 1));
        let mut decoder = HybridRleDecoder::<u8>::try_new(&data, 1).unwrap();
        let mut out = vec![0u8; 13];
        assert_eq!(decoder.get_batch(&mut out).unwrap(), 13);
        assert_eq!(out, vec![1, 0, 1, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_spaced_matches_dense_at_defined_positions() {
        let dense: Vec<u32> = (0..50).map(|i| i % 8).collect();
        let mut data = repeated_run(6, 9, 3);
        data.extend(literal_run(&dense[..48], 3));
        let defined: Vec<u8> = (0..64).map(|i| u8::from(i % 3 != 1)).collect();
        let null_count = defined.iter().filter(|&&level| level == 0).count();
        let defined_count = defined.len() - null_count;

        let mut dense_out = vec![0u32; defined_count];
        {
            let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 3).unwrap();
            assert_eq!(decoder.get_batch(&mut dense_out).unwrap(), defined_count);
        }

        let mut spaced_out = vec![u32::MAX; defined.len()];
        let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 3).unwrap();
        assert_eq!(
            decoder
                .get_batch_spaced(defined.len(), null_count, &defined, &mut spaced_out)
                .unwrap(),
            defined.len()
        );

        let mut consumed = dense_out.iter();
        for (slot, &level) in spaced_out.iter().zip(defined.iter()) {
            if level != 0 {
                assert_eq!(slot, consumed.next().unwrap());
            }
        }
    }

    #[test]
    fn test_spaced_all_null_touches_nothing() {
        let data = repeated_run(3, 4, 2);
        let mut decoder = HybridRleDecoder::<u32>::try_new(&data, 2).unwrap();
        let defined = [0u8; 6];
        let mut out = [u32::MAX; 6];
        assert_eq!(
            decoder.get_batch_spaced(6, 6, &defined, &mut out).unwrap(),
            6
        );
        assert_eq!(out, [u32::MAX; 6]);
    }
}
