//! Column chunk decoding: sequences the pages of one chunk, installs the
//! dictionary when one is present, and materializes data page values into
//! the result buffers with null placement driven by the definition levels.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};

use log::debug;
use parquet_format_safe::thrift::protocol::TCompactInputProtocol;
use parquet_format_safe::{ColumnChunk, Encoding, PageHeader, PageType};

use crate::bytes::ByteReader;
use crate::compression::{decompress, Compression, READ_SLACK};
use crate::encoding::rle::HybridRleDecoder;
use crate::error::{fmt_err, ParquetError, ParquetResult};
use crate::result::{ColumnValues, ResultColumn};
use crate::schema::{Column, PhysicalType};

/// The dictionary installed by a chunk's dictionary page, typed by the
/// column's physical type. Byte-array dictionaries stream straight into the
/// result column's heap, so only the entry count is tracked here.
enum Dictionary {
    None,
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Int96(Vec<[u8; 12]>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Heap(usize),
}

/// Decodes one column chunk of one row group into `result`, which must
/// already be sized to the row group's row count with a zeroed mask.
pub(crate) fn decode_column_chunk(
    file: &mut File,
    chunk: &ColumnChunk,
    column: &Column,
    result: &mut ResultColumn,
) -> ParquetResult<()> {
    if chunk.file_path.is_some() {
        return Err(fmt_err!(
            ExternalChunkUnsupported,
            "column chunk references an external file"
        ));
    }
    let meta = chunk
        .meta_data
        .as_ref()
        .ok_or_else(|| fmt_err!(MetadataDecode, "column chunk carries no metadata"))?;
    if meta.path_in_schema.len() != 1 {
        return Err(fmt_err!(
            NestedNotSupported,
            "column '{}' has a nested path in the schema",
            column.name
        ));
    }
    let compression = Compression::try_from(meta.codec)?;

    // Sometimes there is an extra offset for the dictionary page, and
    // sometimes it is bogus; only trust it when it points past the magic.
    let mut chunk_start = meta.data_page_offset;
    if let Some(dictionary_offset) = meta.dictionary_page_offset {
        if dictionary_offset >= 4 {
            chunk_start = dictionary_offset;
        }
    }
    let chunk_start = u64::try_from(chunk_start)
        .map_err(|_| fmt_err!(MetadataDecode, "column chunk start offset is negative"))?;
    let chunk_len = usize::try_from(meta.total_compressed_size)
        .map_err(|_| fmt_err!(MetadataDecode, "column chunk compressed size is negative"))?;

    debug!(
        "decoding column chunk: column={} start={chunk_start} len={chunk_len}",
        column.name
    );

    let mut chunk_buf = vec![0u8; chunk_len + READ_SLACK];
    file.seek(SeekFrom::Start(chunk_start))?;
    file.read_exact(&mut chunk_buf[..chunk_len])?;

    let mut dictionary = Dictionary::None;
    let mut scratch = Vec::new();
    let mut offset = 0usize;
    let mut row_offset = 0usize;
    while offset < chunk_len {
        let mut cursor = Cursor::new(&chunk_buf[offset..chunk_len]);
        let header = {
            // The protocol guard caps decoder allocations, which can exceed
            // the encoded byte length; size it the way the page reader does.
            let max_size = (chunk_len - offset) * 2 + 1024;
            let mut protocol = TCompactInputProtocol::new(&mut cursor, max_size);
            PageHeader::read_from_in_protocol(&mut protocol)?
        };
        offset += cursor.position() as usize;

        let compressed_size = usize::try_from(header.compressed_page_size)
            .map_err(|_| fmt_err!(MetadataDecode, "page header declares a negative size"))?;
        let uncompressed_size = usize::try_from(header.uncompressed_page_size)
            .map_err(|_| fmt_err!(MetadataDecode, "page header declares a negative size"))?;
        if offset + compressed_size > chunk_len {
            return Err(fmt_err!(
                PayloadLengthExceeded,
                "page of {compressed_size} bytes runs past the column chunk"
            ));
        }
        let page_data = &chunk_buf[offset..offset + compressed_size];

        match header.type_ {
            PageType::DICTIONARY_PAGE => {
                let window = decompress(compression, page_data, uncompressed_size, &mut scratch)?;
                read_dictionary_page(&header, window, column, result, &mut dictionary)?;
            }
            PageType::DATA_PAGE => {
                let window = decompress(compression, page_data, uncompressed_size, &mut scratch)?;
                row_offset += read_data_page(&header, window, column, result, &dictionary, row_offset)?;
            }
            PageType::DATA_PAGE_V2 => {
                return Err(fmt_err!(V2NotSupported, "data page v2 is not supported"));
            }
            // Index pages and unknown page kinds carry nothing we emit.
            _ => {}
        }
        offset += compressed_size;
    }
    Ok(())
}

fn read_dictionary_page(
    header: &PageHeader,
    window: &[u8],
    column: &Column,
    result: &mut ResultColumn,
    dictionary: &mut Dictionary,
) -> ParquetResult<()> {
    let dictionary_header = header.dictionary_page_header.as_ref().ok_or_else(|| {
        fmt_err!(
            MetadataDecode,
            "dictionary page without a dictionary page header"
        )
    })?;
    if !matches!(dictionary, Dictionary::None) {
        return Err(fmt_err!(
            DuplicateDictionary,
            "column chunk contains more than one dictionary page"
        ));
    }
    match dictionary_header.encoding {
        // PLAIN_DICTIONARY is the deprecated alias still written by old files.
        Encoding::PLAIN | Encoding::PLAIN_DICTIONARY => {}
        other => {
            return Err(fmt_err!(
                UnsupportedEncoding,
                "dictionary page encoding {other:?} is not supported"
            ))
        }
    }
    let num_values = usize::try_from(dictionary_header.num_values)
        .map_err(|_| fmt_err!(MetadataDecode, "dictionary page declares a negative value count"))?;

    let mut reader = ByteReader::new(window);
    *dictionary = match column.physical_type {
        PhysicalType::Int32 => {
            Dictionary::Int32(read_plain_fixed(&mut reader, num_values, i32::from_le_bytes)?)
        }
        PhysicalType::Int64 => {
            Dictionary::Int64(read_plain_fixed(&mut reader, num_values, i64::from_le_bytes)?)
        }
        PhysicalType::Int96 => {
            Dictionary::Int96(read_plain_fixed(&mut reader, num_values, |raw: [u8; 12]| raw)?)
        }
        PhysicalType::Float => {
            Dictionary::Float(read_plain_fixed(&mut reader, num_values, f32::from_le_bytes)?)
        }
        PhysicalType::Double => {
            Dictionary::Double(read_plain_fixed(&mut reader, num_values, f64::from_le_bytes)?)
        }
        PhysicalType::ByteArray => {
            let ColumnValues::Bytes { heap, .. } = &mut result.values else {
                return Err(fmt_err!(
                    UnsupportedType,
                    "result buffer does not hold byte array values"
                ));
            };
            for _ in 0..num_values {
                let len = reader.read_u32_le()? as usize;
                if len > reader.remaining() {
                    return Err(fmt_err!(
                        PayloadLengthExceeded,
                        "declared string length {len} exceeds the page window"
                    ));
                }
                let bytes = reader.take(len)?;
                heap.push(bytes);
            }
            Dictionary::Heap(num_values)
        }
        PhysicalType::Boolean | PhysicalType::FixedLenByteArray(_) => {
            return Err(fmt_err!(
                UnsupportedType,
                "dictionary pages are not supported for {:?} columns",
                column.physical_type
            ))
        }
    };
    Ok(())
}

/// Decodes one v1 data page and returns its value count.
fn read_data_page(
    header: &PageHeader,
    window: &[u8],
    column: &Column,
    result: &mut ResultColumn,
    dictionary: &Dictionary,
    row_offset: usize,
) -> ParquetResult<usize> {
    let data_header = header
        .data_page_header
        .as_ref()
        .ok_or_else(|| fmt_err!(MetadataDecode, "data page without a v1 data page header"))?;
    let num_values = usize::try_from(data_header.num_values)
        .map_err(|_| fmt_err!(MetadataDecode, "data page declares a negative value count"))?;
    if row_offset + num_values > result.defined.len() {
        return Err(fmt_err!(
            CorruptPayload,
            "data pages carry more values than the row group declares"
        ));
    }

    let mut reader = ByteReader::new(window);

    // Definition levels: 4-byte little-endian payload length, then a
    // width-1 hybrid RLE stream, one bit per row position.
    match data_header.definition_level_encoding {
        Encoding::RLE => {}
        other => {
            return Err(fmt_err!(
                UnsupportedEncoding,
                "definition level encoding {other:?} is not supported"
            ))
        }
    }
    let def_len = reader.read_u32_le()? as usize;
    if def_len > reader.remaining() {
        return Err(fmt_err!(
            PayloadLengthExceeded,
            "definition level payload of {def_len} bytes exceeds the page window"
        ));
    }
    let def_payload = reader.take(def_len)?;
    let defined = &mut result.defined[row_offset..row_offset + num_values];
    HybridRleDecoder::<u8>::try_new(def_payload, 1)?.get_batch(defined)?;
    let null_count = defined.iter().filter(|&&level| level == 0).count();

    match data_header.encoding {
        Encoding::PLAIN => read_plain_values(&mut reader, column, result, row_offset, num_values)?,
        Encoding::RLE_DICTIONARY | Encoding::PLAIN_DICTIONARY => {
            read_dictionary_values(&mut reader, result, dictionary, row_offset, num_values, null_count)?
        }
        other => {
            return Err(fmt_err!(
                UnsupportedEncoding,
                "data page encoding {other:?} is not supported"
            ))
        }
    }
    Ok(num_values)
}

fn read_plain_values(
    reader: &mut ByteReader<'_>,
    column: &Column,
    result: &mut ResultColumn,
    row_offset: usize,
    num_values: usize,
) -> ParquetResult<()> {
    let ResultColumn { defined, values } = result;
    let defined = &defined[row_offset..row_offset + num_values];
    match values {
        ColumnValues::Boolean(values) => {
            // Plain booleans are bit-packed, one bit per defined value,
            // LSB first.
            let data = reader.take_remaining();
            let mut bit = 0usize;
            for (slot, &level) in values[row_offset..row_offset + num_values]
                .iter_mut()
                .zip(defined.iter())
            {
                if level == 0 {
                    continue;
                }
                let byte = bit / 8;
                if byte >= data.len() {
                    return Err(ParquetError::eof(
                        "boolean page ended before all defined values were read",
                    ));
                }
                *slot = (data[byte] >> (bit % 8)) & 1;
                bit += 1;
            }
        }
        ColumnValues::Int32(values) => fill_plain_fixed(
            reader,
            &mut values[row_offset..row_offset + num_values],
            defined,
            i32::from_le_bytes,
        )?,
        ColumnValues::Int64(values) => fill_plain_fixed(
            reader,
            &mut values[row_offset..row_offset + num_values],
            defined,
            i64::from_le_bytes,
        )?,
        ColumnValues::Int96(values) => fill_plain_fixed(
            reader,
            &mut values[row_offset..row_offset + num_values],
            defined,
            |raw: [u8; 12]| raw,
        )?,
        ColumnValues::Float(values) => fill_plain_fixed(
            reader,
            &mut values[row_offset..row_offset + num_values],
            defined,
            f32::from_le_bytes,
        )?,
        ColumnValues::Double(values) => fill_plain_fixed(
            reader,
            &mut values[row_offset..row_offset + num_values],
            defined,
            f64::from_le_bytes,
        )?,
        ColumnValues::Bytes { indices, heap } => {
            let fixed_len = match column.physical_type {
                PhysicalType::FixedLenByteArray(len) => Some(len),
                _ => None,
            };
            for (slot, &level) in indices[row_offset..row_offset + num_values]
                .iter_mut()
                .zip(defined.iter())
            {
                if level == 0 {
                    continue;
                }
                let len = match fixed_len {
                    Some(len) => len,
                    None => reader.read_u32_le()? as usize,
                };
                if len > reader.remaining() {
                    return Err(fmt_err!(
                        PayloadLengthExceeded,
                        "declared string length {len} exceeds the page window"
                    ));
                }
                *slot = heap.push(reader.take(len)?);
            }
        }
    }
    Ok(())
}

fn fill_plain_fixed<T, const N: usize>(
    reader: &mut ByteReader<'_>,
    values: &mut [T],
    defined: &[u8],
    decode: impl Fn([u8; N]) -> T,
) -> ParquetResult<()> {
    for (slot, &level) in values.iter_mut().zip(defined.iter()) {
        if level == 0 {
            continue;
        }
        let bytes = reader.take(N)?;
        let mut raw = [0u8; N];
        raw.copy_from_slice(bytes);
        *slot = decode(raw);
    }
    Ok(())
}

fn read_plain_fixed<T, const N: usize>(
    reader: &mut ByteReader<'_>,
    count: usize,
    decode: impl Fn([u8; N]) -> T,
) -> ParquetResult<Vec<T>> {
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let bytes = reader.take(N)?;
        let mut raw = [0u8; N];
        raw.copy_from_slice(bytes);
        values.push(decode(raw));
    }
    Ok(values)
}

fn read_dictionary_values(
    reader: &mut ByteReader<'_>,
    result: &mut ResultColumn,
    dictionary: &Dictionary,
    row_offset: usize,
    num_values: usize,
    null_count: usize,
) -> ParquetResult<()> {
    if matches!(dictionary, Dictionary::None) {
        return Err(fmt_err!(
            MissingDictionary,
            "dictionary-coded data page appears before any dictionary page"
        ));
    }

    // A single byte gives the index bit width; the stream then carries one
    // index per defined position, spread across the page's row positions.
    let width = reader.read_u8()? as usize;
    let mut indices = vec![0u32; num_values];
    if width > 0 {
        let stream = reader.take_remaining();
        let mut decoder = HybridRleDecoder::<u32>::try_new(stream, width)?;
        let defined = &result.defined[row_offset..row_offset + num_values];
        if null_count > 0 {
            decoder.get_batch_spaced(num_values, null_count, defined, &mut indices)?;
        } else {
            decoder.get_batch(&mut indices)?;
        }
    }

    let ResultColumn { defined, values } = result;
    let defined = &defined[row_offset..row_offset + num_values];
    match (values, dictionary) {
        (ColumnValues::Int32(values), Dictionary::Int32(dict)) => fill_from_dictionary(
            &mut values[row_offset..row_offset + num_values],
            defined,
            &indices,
            dict,
        )?,
        (ColumnValues::Int64(values), Dictionary::Int64(dict)) => fill_from_dictionary(
            &mut values[row_offset..row_offset + num_values],
            defined,
            &indices,
            dict,
        )?,
        (ColumnValues::Int96(values), Dictionary::Int96(dict)) => fill_from_dictionary(
            &mut values[row_offset..row_offset + num_values],
            defined,
            &indices,
            dict,
        )?,
        (ColumnValues::Float(values), Dictionary::Float(dict)) => fill_from_dictionary(
            &mut values[row_offset..row_offset + num_values],
            defined,
            &indices,
            dict,
        )?,
        (ColumnValues::Double(values), Dictionary::Double(dict)) => fill_from_dictionary(
            &mut values[row_offset..row_offset + num_values],
            defined,
            &indices,
            dict,
        )?,
        (ColumnValues::Bytes { indices: slots, .. }, Dictionary::Heap(dictionary_len)) => {
            // The heap was populated by the dictionary page, so the stream
            // indices are already heap indices.
            for ((slot, &level), &index) in slots[row_offset..row_offset + num_values]
                .iter_mut()
                .zip(defined.iter())
                .zip(indices.iter())
            {
                if level == 0 {
                    continue;
                }
                if index as usize >= *dictionary_len {
                    return Err(fmt_err!(
                        CorruptPayload,
                        "dictionary index {index} is out of bounds ({dictionary_len} entries)"
                    ));
                }
                *slot = u64::from(index);
            }
        }
        _ => {
            return Err(fmt_err!(
                UnsupportedType,
                "dictionary type does not match the column type"
            ))
        }
    }
    Ok(())
}

fn fill_from_dictionary<T: Copy>(
    values: &mut [T],
    defined: &[u8],
    indices: &[u32],
    dictionary: &[T],
) -> ParquetResult<()> {
    for ((slot, &level), &index) in values.iter_mut().zip(defined.iter()).zip(indices.iter()) {
        if level == 0 {
            continue;
        }
        let Some(value) = dictionary.get(index as usize) else {
            return Err(fmt_err!(
                CorruptPayload,
                "dictionary index {index} is out of bounds ({} entries)",
                dictionary.len()
            ));
        };
        *slot = *value;
    }
    Ok(())
}
