use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WpressError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid archive: {0}")]
    ArchiveInvalid(String),

    /// Short read in the middle of a record; `extracted` lists entries fully written before it.
    #[error("Archive read error or truncated file ({} entries extracted)", extracted.len())]
    ArchiveTruncated { extracted: Vec<String> },

    #[error("Archive I/O error at {}: {source}", path.display())]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database import had errors: {}", errors.join("; "))]
    DumpImport { errors: Vec<String> },

    #[error("Merge failed at {}: {source}", path.display())]
    Merge {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WpressError {
    pub(crate) fn archive_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WpressError::ArchiveIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn merge(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WpressError::Merge {
            path: path.into(),
            source,
        }
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, WpressError>;
