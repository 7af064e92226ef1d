//! Error types for docvert.

use std::io;
use thiserror::Error;

/// Result type alias for docvert operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while converting a document.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading the source or writing output/temporary files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No scanner or encoder exists for the requested format pair.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The container structure (central directory, headers) cannot be parsed.
    #[error("Corrupted archive: {0}")]
    ArchiveCorrupt(String),

    /// A single archive entry is truncated, fails its checksum, or uses an
    /// unknown compression method.
    #[error("Cannot read archive entry '{name}': {reason}")]
    EntryRead {
        /// Entry path inside the archive
        name: String,
        /// What went wrong
        reason: String,
    },

    /// A part required by the source format is absent from the archive.
    #[error("Missing required entry: {0}")]
    MissingEntry(String),

    /// A non-archive source (PDF, RTF) could not be decoded.
    #[error("Unreadable source document: {0}")]
    SourceUnreadable(String),

    /// An internal model invariant was violated while serializing.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The conversion was cancelled through its cancellation token.
    #[error("Conversion cancelled")]
    Cancelled,

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build an [`Error::EntryRead`] for the named entry.
    pub fn entry(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::EntryRead {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure was caused by the source document rather than
    /// by the environment or the caller.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Error::ArchiveCorrupt(_)
                | Error::EntryRead { .. }
                | Error::MissingEntry(_)
                | Error::SourceUnreadable(_)
        )
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::SourceUnreadable(format!("PDF: {}", err))
    }
}
