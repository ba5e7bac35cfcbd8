//! The file directory: framing validation, footer metadata, and the
//! row-group scan surface.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;
use parquet_format_safe::thrift::protocol::TCompactInputProtocol;
use parquet_format_safe::FileMetaData;

use crate::decode::decode_column_chunk;
use crate::error::{fmt_err, ParquetErrorExt, ParquetResult};
use crate::result::{ResultChunk, ResultColumn};
use crate::schema::{columns_from_schema, Column};

const MAGIC: &[u8; 4] = b"PAR1";

/// Cursor across the row groups of one file.
#[derive(Debug, Default)]
pub struct ScanState {
    row_group_idx: usize,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// An open parquet file: one file handle plus its immutable metadata.
///
/// A single instance is not safe to share across threads; construct one
/// instance per thread against the same path for parallel row-group reads.
#[derive(Debug)]
pub struct ParquetFile {
    file: File,
    metadata: FileMetaData,
    columns: Vec<Column>,
    nrow: usize,
}

impl ParquetFile {
    pub fn open(path: impl AsRef<Path>) -> ParquetResult<Self> {
        Self::new(File::open(path)?)
    }

    pub fn new(mut file: File) -> ParquetResult<Self> {
        let metadata = read_file_metadata(&mut file)?;
        if metadata.encryption_algorithm.is_some() {
            return Err(fmt_err!(
                EncryptedNotSupported,
                "encrypted parquet files are not supported"
            ));
        }
        let columns = columns_from_schema(&metadata.schema)?;
        let nrow = usize::try_from(metadata.num_rows)
            .map_err(|_| fmt_err!(MetadataDecode, "file declares a negative row count"))?;
        debug!(
            "opened parquet file: {} columns, {} row groups, {nrow} rows",
            columns.len(),
            metadata.row_groups.len()
        );
        Ok(Self {
            file,
            metadata,
            columns,
            nrow,
        })
    }

    /// The leaf columns, ordered by id.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Total row count across all row groups.
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    pub fn row_group_count(&self) -> usize {
        self.metadata.row_groups.len()
    }

    /// Allocates a result container shaped to this file's columns. The
    /// buffers are sized lazily by the first scan call.
    pub fn initialize_result(&self) -> ResultChunk {
        ResultChunk {
            nrows: 0,
            columns: self
                .columns
                .iter()
                .map(|column| ResultColumn::new(column.physical_type))
                .collect(),
        }
    }

    /// Fills `result` with the next row group. Returns `false`, with
    /// `result.nrows` set to 0, once all row groups are consumed.
    pub fn scan(&mut self, state: &mut ScanState, result: &mut ResultChunk) -> ParquetResult<bool> {
        if state.row_group_idx >= self.metadata.row_groups.len() {
            result.nrows = 0;
            return Ok(false);
        }
        let row_group = &self.metadata.row_groups[state.row_group_idx];
        let nrows = usize::try_from(row_group.num_rows)
            .map_err(|_| fmt_err!(MetadataDecode, "row group declares a negative row count"))?;
        result.nrows = nrows;

        for (column, result_column) in self.columns.iter().zip(result.columns.iter_mut()) {
            result_column.reset(nrows);
            let chunk = row_group.columns.get(column.id).ok_or_else(|| {
                fmt_err!(
                    MetadataDecode,
                    "row group {} has no chunk for column '{}'",
                    state.row_group_idx,
                    column.name
                )
            })?;
            decode_column_chunk(&mut self.file, chunk, column, result_column).with_context(
                |_| {
                    format!(
                        "scanning row group {} column '{}'",
                        state.row_group_idx, column.name
                    )
                },
            )?;
        }
        state.row_group_idx += 1;
        Ok(true)
    }
}

/// Validates the file framing and decodes the footer metadata.
fn read_file_metadata(file: &mut File) -> ParquetResult<FileMetaData> {
    let file_size = file.seek(SeekFrom::End(0))?;
    if file_size < 12 {
        return Err(fmt_err!(
            BadMagic,
            "a file of {file_size} bytes cannot be a parquet file"
        ));
    }

    let mut magic = [0u8; 4];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(fmt_err!(BadMagic, "missing magic bytes at start of file"));
    }

    let mut tail = [0u8; 8];
    file.seek(SeekFrom::End(-8))?;
    file.read_exact(&mut tail)?;
    if &tail[4..] != MAGIC {
        return Err(fmt_err!(BadMagic, "missing magic bytes at end of file"));
    }

    let footer_len = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    if footer_len == 0 {
        return Err(fmt_err!(BadFooter, "footer length is zero"));
    }
    if u64::from(footer_len) + 8 > file_size {
        return Err(fmt_err!(
            BadFooter,
            "footer of {footer_len} bytes does not fit in the file"
        ));
    }

    let mut footer = vec![0u8; footer_len as usize];
    file.seek(SeekFrom::End(-(i64::from(footer_len) + 8)))?;
    file.read_exact(&mut footer)?;

    // The protocol guard caps decoder allocations, which can exceed the
    // encoded byte length of the footer.
    let max_size = footer.len() * 2 + 1024;
    let mut protocol = TCompactInputProtocol::new(footer.as_slice(), max_size);
    let metadata = FileMetaData::read_from_in_protocol(&mut protocol)
        .map_err(crate::error::ParquetError::from)
        .context("reading file metadata")?;
    Ok(metadata)
}
