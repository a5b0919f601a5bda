//! Error types for package ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while handling the report package and its documents.
///
/// `ArchiveIo`, `ArchiveFormat` and `MissingEntry` abort a run. `DocumentDecode`
/// is recoverable: callers substitute an empty document and continue.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to {action} '{}': {source}", path.display())]
    ArchiveIo {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' is not a readable archive: {reason}", path.display())]
    ArchiveFormat { path: PathBuf, reason: String },

    #[error("entry '{entry}' not found in '{}'", path.display())]
    MissingEntry { path: PathBuf, entry: String },

    #[error("failed to decode {document}: {reason}")]
    DocumentDecode {
        document: &'static str,
        reason: String,
    },
}

impl IngestError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::ArchiveIo {
            action,
            path: path.into(),
            source,
        }
    }

    /// Whether the run can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IngestError::DocumentDecode { .. })
    }
}

/// Second-stage parse failure of a visual container's embedded `config` string.
#[derive(Debug, Error)]
pub enum FragmentParseError {
    #[error("config field is not a string")]
    NotAString,

    #[error("config is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unexpected config shape: {0}")]
    UnexpectedShape(&'static str),
}

/// Byte-level failure decoding a UTF-16LE document.
#[derive(Debug, Error)]
pub enum Utf16Error {
    #[error("odd UTF-16 byte length ({0})")]
    OddLength(usize),

    #[error("invalid UTF-16: {0}")]
    Invalid(#[from] std::string::FromUtf16Error),
}
