//! Read-only reader for flat (non-nested) Apache Parquet files.
//!
//! The reader materializes whole row groups, column by column: it parses the
//! footer metadata, locates each column chunk, and decodes the chunk's page
//! stream (optional dictionary page, then v1 data pages) into dense typed
//! buffers with a parallel definedness mask.
//!
//! ```no_run
//! use parquet_read::{ParquetFile, ScanState};
//!
//! # fn main() -> parquet_read::ParquetResult<()> {
//! let mut file = ParquetFile::open("trades.parquet")?;
//! let mut state = ScanState::new();
//! let mut result = file.initialize_result();
//! while file.scan(&mut state, &mut result)? {
//!     // result holds one fully materialized row group
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Out of scope: writing, encryption, nested schemas, required/repeated
//! fields, data page v2, and codecs beyond uncompressed and snappy.

mod bytes;
mod compression;
mod decode;
pub mod encoding;
pub mod error;
mod file;
mod result;
mod schema;

pub use compression::Compression;
pub use error::{ParquetError, ParquetErrorKind, ParquetResult};
pub use file::{ParquetFile, ScanState};
pub use result::{ByteHeap, ColumnValues, ResultChunk, ResultColumn};
pub use schema::{Column, PhysicalType};
