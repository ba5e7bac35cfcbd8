//! Page compression gate: identity pass-through for uncompressed pages,
//! snappy decompression for the rest of the supported set.

use parquet_format_safe::CompressionCodec;

use crate::error::{fmt_err, ParquetError, ParquetResult};

/// Trailing slack appended to every chunk and decompression buffer so the
/// 32-values-at-a-time unpacker may read a final partial block without
/// running off the allocation.
pub(crate) const READ_SLACK: usize = 32 * std::mem::size_of::<u32>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Uncompressed,
    Snappy,
}

impl TryFrom<CompressionCodec> for Compression {
    type Error = ParquetError;

    fn try_from(codec: CompressionCodec) -> ParquetResult<Self> {
        Ok(match codec {
            CompressionCodec::UNCOMPRESSED => Compression::Uncompressed,
            CompressionCodec::SNAPPY => Compression::Snappy,
            other => {
                return Err(fmt_err!(
                    UnsupportedCodec,
                    "compression codec {other:?} is not supported, use uncompressed or snappy"
                ))
            }
        })
    }
}

/// Produces the readable byte window of one page: the input itself when the
/// chunk is uncompressed, otherwise the page decompressed into `scratch`.
pub(crate) fn decompress<'a>(
    compression: Compression,
    compressed: &'a [u8],
    uncompressed_size: usize,
    scratch: &'a mut Vec<u8>,
) -> ParquetResult<&'a [u8]> {
    match compression {
        Compression::Uncompressed => Ok(compressed),
        Compression::Snappy => {
            scratch.clear();
            scratch.resize(uncompressed_size + READ_SLACK, 0);
            let written = snap::raw::Decoder::new()
                .decompress(compressed, scratch)
                .map_err(|e| fmt_err!(DecompressionFailed, "snappy: {e}"))?;
            if written != uncompressed_size {
                return Err(fmt_err!(
                    DecompressionFailed,
                    "snappy produced {written} bytes, the page header declared {uncompressed_size}"
                ));
            }
            Ok(&scratch[..uncompressed_size])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParquetErrorKind;

    #[test]
    fn test_uncompressed_is_identity() {
        let data = [1u8, 2, 3];
        let mut scratch = Vec::new();
        let window = decompress(Compression::Uncompressed, &data, 3, &mut scratch).unwrap();
        assert_eq!(window, &data);
        assert!(scratch.is_empty());
    }

    #[test]
    fn test_snappy_round_trip() {
        let payload: Vec<u8> = (0..255u8).cycle().take(4096).collect();
        let compressed = snap::raw::Encoder::new().compress_vec(&payload).unwrap();
        let mut scratch = Vec::new();
        let window = decompress(
            Compression::Snappy,
            &compressed,
            payload.len(),
            &mut scratch,
        )
        .unwrap();
        assert_eq!(window, payload.as_slice());
        // the scratch buffer carries the decoding slack
        assert_eq!(scratch.len(), payload.len() + READ_SLACK);
    }

    #[test]
    fn test_garbage_snappy_fails() {
        let mut scratch = Vec::new();
        let err = decompress(Compression::Snappy, &[0xff, 0x00, 0x12], 64, &mut scratch)
            .unwrap_err();
        assert!(matches!(err.kind(), ParquetErrorKind::DecompressionFailed));
    }

    #[test]
    fn test_unknown_codec_is_rejected() {
        let err = Compression::try_from(CompressionCodec::GZIP).unwrap_err();
        assert!(matches!(err.kind(), ParquetErrorKind::UnsupportedCodec));
    }
}
