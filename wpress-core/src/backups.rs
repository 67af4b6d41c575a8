use crate::config::DEFAULT_SUFFIX;
use crate::error::{Result, WpressError};

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

pub const FOLDER_NAME: &str = "wpress-restore-backups";
const GUARD_BODY: &str = "<?php // Silence is golden.";

#[derive(Clone, Debug, Serialize)]
pub struct BackupFile {
    pub name: String,
    pub size: u64,
    /// Unix seconds.
    pub modified: i64,
    pub path: PathBuf,
}

impl BackupFile {
    pub fn modified_rfc3339(&self) -> String {
        OffsetDateTime::from_unix_timestamp(self.modified)
            .ok()
            .and_then(|t| t.format(&Rfc3339).ok())
            .unwrap_or_else(|| self.modified.to_string())
    }
}

/// Drop folder for uploaded archives under the content directory.
pub struct BackupFolder {
    dir: PathBuf,
}

impl BackupFolder {
    pub fn new(content_dir: &Path) -> Self {
        Self {
            dir: content_dir.join(FOLDER_NAME),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the folder and its guard `index.php` if missing.
    pub fn ensure(&self) -> Result<&Path> {
        fs::create_dir_all(&self.dir).map_err(|e| WpressError::archive_io(&self.dir, e))?;
        let guard = self.dir.join("index.php");
        if !guard.is_file() {
            fs::write(&guard, GUARD_BODY).map_err(|e| WpressError::archive_io(&guard, e))?;
        }
        Ok(&self.dir)
    }

    /// Archives in the folder, newest first.
    pub fn list(&self) -> Result<Vec<BackupFile>> {
        self.ensure()?;
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| WpressError::archive_io(&self.dir, e))? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !has_suffix(&name) {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let modified = meta
                .modified()
                .map(|t| OffsetDateTime::from(t).unix_timestamp())
                .unwrap_or(0);
            out.push(BackupFile {
                path: entry.path(),
                name,
                size: meta.len(),
                modified,
            });
        }
        out.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        debug!("{} backups in {}", out.len(), self.dir.display());
        Ok(out)
    }

    /// Canonical path of an archive in the folder, given only its basename.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        if !is_safe_basename(name) {
            return Err(WpressError::InvalidInput(format!(
                "not a backup file name: {name:?}"
            )));
        }
        let dir = self.ensure()?.canonicalize()?;
        let candidate = dir.join(name.trim());
        let real = candidate
            .canonicalize()
            .map_err(|_| WpressError::InvalidInput(format!("no such backup: {name}")))?;
        if !real.is_file() || !real.starts_with(&dir) {
            return Err(WpressError::InvalidInput(format!("no such backup: {name}")));
        }
        Ok(real)
    }
}

/// A bare archive file name: no separators, no NUL, not `.`/`..`, right suffix.
pub fn is_safe_basename(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    if name.contains(['/', '\\', '\0']) {
        return false;
    }
    has_suffix(name)
}

fn has_suffix(name: &str) -> bool {
    name.len() > DEFAULT_SUFFIX.len()
        && name.to_ascii_lowercase().ends_with(DEFAULT_SUFFIX)
}
