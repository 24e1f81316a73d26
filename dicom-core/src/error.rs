use thiserror::Error;

/// Main error type for DICOM codec operations
#[derive(Error, Debug)]
pub enum DicomError {
    #[error("{0}: unknown transfer syntax uid")]
    UnknownTransferSyntax(String),

    #[error("out of bounds: requested {requested} bytes, available {available} (offset {offset})")]
    OutOfBounds {
        requested: u64,
        available: u64,
        offset: u64,
    },

    #[error("transport error at offset {offset}: {source}")]
    Transport {
        #[source]
        source: std::io::Error,
        offset: u64,
    },

    #[error("sink write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("character set decode error: {0}")]
    CharsetDecode(String),

    #[error("trailing data after top-level decode (offset {offset})")]
    TrailingData { offset: u64 },
}

/// Result type alias for DICOM codec operations
pub type DicomResult<T> = Result<T, DicomError>;
