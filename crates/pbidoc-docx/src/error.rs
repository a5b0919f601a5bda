use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid .docx package: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("malformed XML in {part}: {reason}")]
    Xml { part: &'static str, reason: String },

    #[error("{} has no {part} part", path.display())]
    MissingPart { path: PathBuf, part: &'static str },

    #[error("paragraph index {index} out of range ({len} paragraphs)")]
    ParagraphIndex { index: usize, len: usize },

    #[error("invalid date format {format:?}")]
    DateFormat { format: String },

    /// The save target already exists; it is never overwritten.
    #[error("output document {} already exists", path.display())]
    OutputExists { path: PathBuf },

    /// Saving the output document failed. Always fatal for a run.
    #[error("failed to write output document {}: {reason}", path.display())]
    OutputWrite { path: PathBuf, reason: String },
}

impl DocxError {
    pub(crate) fn xml(part: &'static str, err: impl std::fmt::Display) -> Self {
        DocxError::Xml {
            part,
            reason: err.to_string(),
        }
    }

    /// Create `path` for writing, refusing to touch an existing file.
    pub(crate) fn create_output(path: &std::path::Path) -> Result<std::fs::File, DocxError> {
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => DocxError::OutputExists {
                    path: path.to_path_buf(),
                },
                _ => DocxError::output(path, e),
            })
    }

    pub(crate) fn output(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        DocxError::OutputWrite {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}
