use crate::chem::toolkit::ToolkitError;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SerialError>;

/// Failure taxonomy for the molecule I/O pipeline.
///
/// All failures surface synchronously at the point they occur in the lazy
/// sequence; no operation is retried.
#[derive(Debug, Error)]
pub enum SerialError {
    /// The file suffix matched no known format and no override was given.
    #[error("unrecognized molecule format for '{0}'")]
    UnknownFormat(String),

    /// A raw stream was supplied without an explicit format to decode it as.
    #[error("format must be set explicitly when opening a raw stream")]
    AmbiguousFormat,

    /// A record failed to parse. The index is 1-based within the stream.
    #[error("malformed record {index}: {source}")]
    MalformedRecord {
        index: usize,
        #[source]
        source: ToolkitError,
    },

    /// Underlying read/write failure, including decompression of content
    /// that is not actually gzip.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The archive payload could not be encoded or decoded.
    #[error("archive codec error: {0}")]
    Archive(String),

    /// The toolkit was unable to apply a requested normalization to a
    /// molecule. The record is aborted rather than passed through
    /// unnormalized.
    #[error("normalization failed: {source}")]
    Normalization {
        #[source]
        source: ToolkitError,
    },

    /// A toolkit operation outside normalization failed (signature
    /// computation, serialization).
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),

    /// `write` or `close` was called before `open`.
    #[error("writer is not open")]
    NotOpen,
}
