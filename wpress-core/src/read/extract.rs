use crate::container::header::{HEADER_LEN, is_sentinel};
use crate::error::{Result, WpressError};
use crate::read::stream::{EntryReader, Record};

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// True iff the last `HEADER_LEN` bytes of the file are the all-zero sentinel.
pub fn validate(archive: &Path) -> bool {
    match read_last_block(archive) {
        Ok(block) => is_sentinel(&block),
        Err(e) => {
            debug!("validate {}: {e}", archive.display());
            false
        }
    }
}

fn read_last_block(archive: &Path) -> std::io::Result<Vec<u8>> {
    let mut f = File::open(archive)?;
    let len = f.seek(SeekFrom::End(0))?;
    if len < HEADER_LEN as u64 {
        return Err(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            "file too small for end block",
        ));
    }
    f.seek(SeekFrom::End(-(HEADER_LEN as i64)))?;
    let mut block = vec![0u8; HEADER_LEN];
    f.read_exact(&mut block)?;
    Ok(block)
}

/// Extract every entry under `dest`, returning the `/`-separated relative paths written.
///
/// Entries that would land outside `dest` are skipped (payload discarded) rather than
/// aborting the whole run.
pub fn extract(archive: &Path, dest: &Path) -> Result<Vec<String>> {
    fs::create_dir_all(dest).map_err(|e| WpressError::archive_io(dest, e))?;
    let root = dest
        .canonicalize()
        .map_err(|e| WpressError::archive_io(dest, e))?;
    let f = File::open(archive).map_err(|e| WpressError::archive_io(archive, e))?;
    extract_from(BufReader::new(f), &root)
}

/// Extraction over any byte stream; `root` must already be canonical.
pub fn extract_from<R: Read>(src: R, root: &Path) -> Result<Vec<String>> {
    let mut reader = EntryReader::new(src);
    let mut extracted = Vec::new();

    loop {
        let entry = match reader.next_record()? {
            Record::Entry(e) => e,
            Record::Sentinel => break,
            Record::Short(n) => {
                debug!("archive ended with {n} stray header bytes and no end block");
                return Err(WpressError::ArchiveTruncated { extracted });
            }
        };

        let name = entry.full_name();
        let Some(target) = resolve_within(root, &name)? else {
            warn!("skipping entry outside destination: {name}");
            match reader.skip_payload(entry.size) {
                Ok(()) => continue,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Err(WpressError::ArchiveTruncated { extracted });
                }
                Err(e) => return Err(e.into()),
            }
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| WpressError::archive_io(parent, e))?;
        }
        let out = File::create(&target).map_err(|e| WpressError::archive_io(&target, e))?;
        let mut out = BufWriter::new(out);

        match reader.copy_payload(entry.size, &mut out) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(WpressError::ArchiveTruncated { extracted });
            }
            Err(e) => return Err(WpressError::archive_io(&target, e)),
        }
        out.flush()
            .map_err(|e| WpressError::archive_io(&target, e))?;

        debug!("extracted {name} ({} bytes)", entry.size);
        extracted.push(name);
    }

    Ok(extracted)
}

/// Map an archive-relative name to a path under the canonical `root`.
///
/// `None` when the name escapes `root`, either lexically (`..`, absolute paths) or through
/// a symlink in an already existing ancestor directory.
pub fn resolve_within(root: &Path, rel: &str) -> Result<Option<PathBuf>> {
    let mut clean = PathBuf::new();
    for comp in Path::new(&rel.replace('\\', "/")).components() {
        match comp {
            Component::Normal(c) => clean.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return Ok(None);
                }
            }
            Component::RootDir | Component::Prefix(_) => return Ok(None),
        }
    }
    if clean.as_os_str().is_empty() {
        return Ok(None);
    }

    let target = root.join(&clean);
    let mut existing = target.parent().unwrap_or(root).to_path_buf();
    while !existing.exists() {
        if !existing.pop() {
            return Ok(None);
        }
    }
    let real = existing
        .canonicalize()
        .map_err(|e| WpressError::archive_io(&existing, e))?;
    if !real.starts_with(root) {
        return Ok(None);
    }
    Ok(Some(target))
}
