use crate::error::{Result, WpressError};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Bootstrap files copied from the archive root into the live root after the content merge.
pub const DEFAULT_ROOT_FILES: &[&str] = &[
    "index.php",
    "wp-settings.php",
    "wp-blog-header.php",
    "wp-load.php",
    "xmlrpc.php",
    "wp-activate.php",
    "wp-links-opml.php",
    "wp-cron.php",
    "readme.html",
    "license.txt",
];

#[derive(Clone, Debug, Default)]
pub struct MergeOptions {
    /// Live paths that are neither cleared nor written.
    pub excludes: Vec<PathBuf>,
    /// Top-level names never written under the live root.
    pub reserved: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub removed: u64,
    pub dirs_created: u64,
    pub files_copied: u64,
}

/// Mirror `extracted` over `live`: clear the live counterparts of every top-level
/// directory in the backup, then copy the backup in, parents before children.
///
/// Not transactional. A failure part-way leaves a mixed tree and reports the path.
pub fn merge(extracted: &Path, live: &Path, opts: &MergeOptions) -> Result<MergeReport> {
    fs::create_dir_all(live).map_err(|e| WpressError::merge(live, e))?;
    let live = live.canonicalize().map_err(|e| WpressError::merge(live, e))?;
    let excludes = Excludes::new(&opts.excludes);
    let mut report = MergeReport::default();

    // Phase 1: clear.
    for entry in fs::read_dir(extracted).map_err(|e| WpressError::merge(extracted, e))? {
        let entry = entry.map_err(|e| WpressError::merge(extracted, e))?;
        if !entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let live_child = live.join(entry.file_name());
        let is_real_dir = fs::symlink_metadata(&live_child).is_ok_and(|m| m.is_dir());
        if !is_real_dir || excludes.covers(&live_child) {
            continue;
        }
        clear_except(&live_child, &excludes, &mut report)?;
    }

    // Phase 2: copy.
    let mut walker = WalkDir::new(extracted)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    while let Some(item) = walker.next() {
        let item = item.map_err(walk_error)?;
        let rel = item
            .path()
            .strip_prefix(extracted)
            .map_err(|e| WpressError::merge(item.path(), std::io::Error::other(e)))?;
        let target = live.join(rel);
        let reserved = item.depth() == 1
            && opts
                .reserved
                .iter()
                .any(|r| rel.as_os_str() == r.as_str());

        if reserved || excludes.covers(&target) {
            debug!("merge: leaving {} untouched", target.display());
            if item.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        if item.file_type().is_dir() {
            if !target.is_dir() {
                fs::create_dir_all(&target).map_err(|e| WpressError::merge(&target, e))?;
                report.dirs_created += 1;
            }
        } else if item.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| WpressError::merge(parent, e))?;
            }
            fs::copy(item.path(), &target).map_err(|e| WpressError::merge(&target, e))?;
            report.files_copied += 1;
        }
    }

    info!(
        "merged {} into {}: {} removed, {} dirs created, {} files copied",
        extracted.display(),
        live.display(),
        report.removed,
        report.dirs_created,
        report.files_copied
    );
    Ok(report)
}

/// Copy the listed bootstrap files found directly under `extract_root` into `live_root`.
pub fn copy_root_files(
    extract_root: &Path,
    live_root: &Path,
    names: &[String],
    reserved: &[String],
) -> Result<u64> {
    let mut copied = 0;
    for name in names {
        if reserved.contains(name) {
            continue;
        }
        let src = extract_root.join(name);
        if !src.is_file() {
            continue;
        }
        let target = live_root.join(name);
        fs::copy(&src, &target).map_err(|e| WpressError::merge(&target, e))?;
        copied += 1;
    }
    Ok(copied)
}

/// Remove every entry of `dir` except excluded paths; directories that hold an
/// exclude further down are descended into instead of removed.
fn clear_except(dir: &Path, excludes: &Excludes, report: &mut MergeReport) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(|e| WpressError::merge(dir, e))? {
        let entry = entry.map_err(|e| WpressError::merge(dir, e))?;
        let path = entry.path();
        if excludes.covers(&path) {
            continue;
        }
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        if is_dir && excludes.any_inside(&path) {
            clear_except(&path, excludes, report)?;
            continue;
        }
        if is_dir {
            fs::remove_dir_all(&path).map_err(|e| WpressError::merge(&path, e))?;
        } else {
            fs::remove_file(&path).map_err(|e| WpressError::merge(&path, e))?;
        }
        report.removed += 1;
    }
    Ok(())
}

/// Excluded paths in every spelling the walk can meet them under: as given, fully
/// resolved, and with only the parent resolved (the location of a symlinked exclude).
struct Excludes(Vec<PathBuf>);

impl Excludes {
    fn new(paths: &[PathBuf]) -> Self {
        let mut forms = Vec::new();
        for p in paths {
            forms.push(p.clone());
            if let Ok(resolved) = p.canonicalize() {
                forms.push(resolved);
            }
            if let (Some(parent), Some(name)) = (p.parent(), p.file_name()) {
                if let Ok(parent) = parent.canonicalize() {
                    forms.push(parent.join(name));
                }
            }
        }
        forms.sort();
        forms.dedup();
        Self(forms)
    }

    /// `path` is an exclude or inside one, before or after resolving its links.
    fn covers(&self, path: &Path) -> bool {
        let hit = |p: &Path| self.0.iter().any(|x| p.starts_with(x));
        hit(path) || path.canonicalize().is_ok_and(|c| hit(&c))
    }

    /// Some exclude sits further down inside `dir`.
    fn any_inside(&self, dir: &Path) -> bool {
        let hit = |d: &Path| self.0.iter().any(|x| x.starts_with(d));
        hit(dir) || dir.canonicalize().is_ok_and(|c| hit(&c))
    }
}

fn walk_error(e: walkdir::Error) -> WpressError {
    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("directory loop"));
    WpressError::Merge { path, source }
}
