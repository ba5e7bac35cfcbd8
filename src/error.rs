use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// What went wrong while reading parquet data.
#[derive(Debug, Clone)]
pub enum ParquetErrorKind {
    /// Missing or wrong `PAR1` magic bytes.
    BadMagic,
    /// Footer length is zero or unreadable.
    BadFooter,
    /// The thrift-encoded metadata could not be decoded.
    MetadataDecode,
    /// The file declares an encryption algorithm.
    EncryptedNotSupported,
    /// Schema depth > 1 or a non-flat column reference.
    NestedNotSupported,
    /// A non-root schema element is required or repeated.
    NonOptionalNotSupported,
    /// Physical type outside the supported set for a given path.
    UnsupportedType,
    /// Compression other than uncompressed or snappy.
    UnsupportedCodec,
    /// Snappy reported a failure.
    DecompressionFailed,
    /// Encoding other than plain / (plain_)dictionary / rle.
    UnsupportedEncoding,
    /// Data page v2.
    V2NotSupported,
    /// A dictionary-coded data page appeared before any dictionary page.
    MissingDictionary,
    /// A second dictionary page in one column chunk.
    DuplicateDictionary,
    /// A declared payload length runs past the page window.
    PayloadLengthExceeded,
    /// A decoded value is impossible for the declared layout.
    CorruptPayload,
    /// A varint uses more than 32 significant bits.
    VarintOverflow,
    /// A bit width the unpacker cannot handle.
    UnsupportedBitWidth,
    /// An underlying read was short or failed.
    Io(Arc<std::io::Error>),
    /// A column chunk references another file.
    ExternalChunkUnsupported,
}

impl ParquetErrorKind {
    fn descr(&self) -> &'static str {
        match self {
            ParquetErrorKind::BadMagic => "bad magic bytes",
            ParquetErrorKind::BadFooter => "bad footer",
            ParquetErrorKind::MetadataDecode => "metadata decode failed",
            ParquetErrorKind::EncryptedNotSupported => "encrypted files are not supported",
            ParquetErrorKind::NestedNotSupported => "nested schemas are not supported",
            ParquetErrorKind::NonOptionalNotSupported => "only optional fields are supported",
            ParquetErrorKind::UnsupportedType => "unsupported physical type",
            ParquetErrorKind::UnsupportedCodec => "unsupported compression codec",
            ParquetErrorKind::DecompressionFailed => "decompression failed",
            ParquetErrorKind::UnsupportedEncoding => "unsupported encoding",
            ParquetErrorKind::V2NotSupported => "data page v2 is not supported",
            ParquetErrorKind::MissingDictionary => "missing dictionary page",
            ParquetErrorKind::DuplicateDictionary => "duplicate dictionary page",
            ParquetErrorKind::PayloadLengthExceeded => "payload length exceeded",
            ParquetErrorKind::CorruptPayload => "corrupt payload",
            ParquetErrorKind::VarintOverflow => "varint overflow",
            ParquetErrorKind::UnsupportedBitWidth => "unsupported bit width",
            ParquetErrorKind::Io(_) => "io error",
            ParquetErrorKind::ExternalChunkUnsupported => "external column chunks are not supported",
        }
    }
}

/// An error reading parquet data.
#[derive(Debug, Clone)]
pub struct ParquetError {
    kind: ParquetErrorKind,

    /// Description plus pushed contextual information,
    /// printed in reverse order.
    context: Vec<String>,

    backtrace: Arc<Backtrace>,
}

impl ParquetError {
    #[track_caller]
    pub fn new(kind: ParquetErrorKind) -> Self {
        Self {
            kind,
            context: Vec::new(),
            backtrace: Backtrace::capture().into(),
        }
    }

    #[track_caller]
    pub fn with_descr(kind: ParquetErrorKind, descr: impl Into<String>) -> Self {
        Self {
            kind,
            context: vec![descr.into()],
            backtrace: Backtrace::capture().into(),
        }
    }

    /// An `Io` error for a buffer that ended before a read completed.
    #[track_caller]
    pub(crate) fn eof(descr: impl Into<String>) -> Self {
        let descr = descr.into();
        let source = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, descr.clone());
        Self::with_descr(ParquetErrorKind::Io(Arc::new(source)), descr)
    }

    pub fn kind(&self) -> &ParquetErrorKind {
        &self.kind
    }
}

impl Display for ParquetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}", self.kind.descr())?;
        } else {
            // Print the context first, in reverse order.
            for (index, context) in self.context.iter().rev().enumerate() {
                if index > 0 {
                    write!(f, ": ")?;
                }
                write!(f, "{context}")?;
            }
        }

        if let BacktraceStatus::Captured = &self.backtrace.status() {
            write!(f, "\n{:?}", self.backtrace)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParquetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParquetErrorKind::Io(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ParquetError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        let descr = source.to_string();
        Self::with_descr(ParquetErrorKind::Io(Arc::new(source)), descr)
    }
}

impl From<parquet_format_safe::thrift::Error> for ParquetError {
    #[track_caller]
    fn from(source: parquet_format_safe::thrift::Error) -> Self {
        Self::with_descr(
            ParquetErrorKind::MetadataDecode,
            format!("thrift decode: {source}"),
        )
    }
}

pub type ParquetResult<T> = Result<T, ParquetError>;

pub trait ParquetErrorExt<T> {
    fn context(self, context: &str) -> Self;
    fn with_context<F>(self, context: F) -> Self
    where
        F: FnOnce(&mut ParquetError) -> String;
}

impl<T> ParquetErrorExt<T> for ParquetResult<T> {
    fn context(self, context: &str) -> Self {
        match self {
            Ok(val) => Ok(val),
            Err(mut err) => {
                err.context.push(context.to_string());
                Err(err)
            }
        }
    }

    fn with_context<F>(self, context: F) -> Self
    where
        F: FnOnce(&mut ParquetError) -> String,
    {
        match self {
            Ok(val) => Ok(val),
            Err(mut err) => {
                let context = context(&mut err);
                err.context.push(context);
                Err(err)
            }
        }
    }
}

macro_rules! fmt_err {
    ($kind: ident, $($arg:tt)*) => {
        $crate::error::ParquetError::with_descr(
            $crate::error::ParquetErrorKind::$kind,
            format!($($arg)*))
    };
}

pub(crate) use fmt_err;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_printed_outermost_first() {
        let err: ParquetResult<()> = Err(fmt_err!(CorruptPayload, "value 9 does not fit"));
        let err = err
            .context("data page 3")
            .context("column chunk 'price'")
            .unwrap_err();
        let printed = err.to_string();
        assert!(printed.starts_with("column chunk 'price': data page 3: value 9 does not fit"));
        assert!(matches!(err.kind(), ParquetErrorKind::CorruptPayload));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = ParquetError::eof("wanted 4 bytes, 1 left in buffer");
        assert!(matches!(err.kind(), ParquetErrorKind::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
