//! Error types for fastxmap

use thiserror::Error;

/// Result type alias for fastxmap operations
pub type Result<T> = std::result::Result<T, FastxError>;

/// Error types that can occur while opening, indexing or materializing records
///
/// Format errors carry a byte offset into the (decompressed) buffer so a bad
/// record can be located without re-reading the file.
#[derive(Debug, Error)]
pub enum FastxError {
    /// I/O error (unreadable path, truncated or corrupt compressed stream)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid FASTA format
    #[error("Invalid FASTA format at byte {offset}: {msg}")]
    InvalidFasta {
        /// Byte offset where the error was detected
        offset: u64,
        /// Error message
        msg: String,
    },

    /// Invalid FASTQ format
    #[error("Invalid FASTQ format at byte {offset}: {msg}")]
    InvalidFastq {
        /// Byte offset where the error was detected
        offset: u64,
        /// Error message
        msg: String,
    },

    /// The bounded worker pool could not be created
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl FastxError {
    /// Byte offset of a format error, `None` for other kinds
    pub fn offset(&self) -> Option<u64> {
        match self {
            FastxError::InvalidFasta { offset, .. } | FastxError::InvalidFastq { offset, .. } => {
                Some(*offset)
            }
            _ => None,
        }
    }

    /// Whether this is a FASTA or FASTQ format error
    pub fn is_format_error(&self) -> bool {
        self.offset().is_some()
    }
}
