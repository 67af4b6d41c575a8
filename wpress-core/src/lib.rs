#![forbid(unsafe_code)]

pub mod backups;
pub mod config;
pub mod error;
pub mod merge;

pub mod container {
    pub mod header;
}

pub mod pack {
    pub mod writer;
}

pub mod read {
    pub mod extract;
    pub mod stream;
}

pub mod sql {
    pub mod detect;
    pub mod executor;
    pub mod import;
    pub mod scanner;
    pub mod transform;
}

pub mod list;
pub mod restore;

// Re-exports: stable API surface
pub use backups::{BackupFolder, is_safe_basename};
pub use config::RestoreConfig;
pub use container::header::ArchiveEntry;
pub use error::{Result, WpressError};
pub use list::list;
pub use merge::{MergeOptions, merge};
pub use pack::writer::{ArchiveWriter, pack_dir};
pub use read::extract::{extract, validate};
pub use restore::{RestoreOutcome, Restorer, Stage};
pub use sql::executor::{StatementExecutor, WriterExecutor};
pub use sql::import::{ImportOptions, ImportReport, import, import_file};
