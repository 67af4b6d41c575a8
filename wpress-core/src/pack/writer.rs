use crate::container::header::{ArchiveEntry, EOF_BLOCK};
use crate::error::{Result, WpressError};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use walkdir::WalkDir;

/// Writes header+payload records and closes the stream with the sentinel.
pub struct ArchiveWriter<W: Write> {
    out: W,
    entries: u64,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, entries: 0 }
    }

    pub fn append_bytes(
        &mut self,
        dir: &str,
        filename: &str,
        data: &[u8],
        mtime: u64,
    ) -> Result<()> {
        self.append_reader(dir, filename, &mut &data[..], data.len() as u64, mtime)
    }

    /// Stream exactly `size` bytes from `src` as the entry's payload.
    pub fn append_reader(
        &mut self,
        dir: &str,
        filename: &str,
        src: &mut dyn Read,
        size: u64,
        mtime: u64,
    ) -> Result<()> {
        ArchiveEntry::new(dir, filename, size, mtime).write_to(&mut self.out)?;
        let copied = std::io::copy(&mut src.take(size), &mut self.out)?;
        if copied != size {
            return Err(WpressError::InvalidInput(format!(
                "{filename}: source ended after {copied} of {size} bytes"
            )));
        }
        self.entries += 1;
        Ok(())
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.write_all(&EOF_BLOCK)?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Pack every regular file under `root` into `out`, in sorted path order.
pub fn pack_dir(root: &Path, out: &Path) -> Result<u64> {
    let mut w = ArchiveWriter::new(BufWriter::new(File::create(out)?));
    for e in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let e = e.map_err(std::io::Error::other)?;
        if !e.file_type().is_file() {
            continue; // symlinks and specials are not representable
        }
        let rel = e
            .path()
            .strip_prefix(root)
            .map_err(|e| WpressError::InvalidInput(e.to_string()))?;
        let filename = e.file_name().to_string_lossy();
        let dir = rel
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let md = fs::metadata(e.path())?;
        let mut src = File::open(e.path())?;
        w.append_reader(&dir, &filename, &mut src, md.len(), mtime_from(&md))?;
    }
    let n = w.entries();
    w.finish()?;
    Ok(n)
}

fn mtime_from(md: &std::fs::Metadata) -> u64 {
    md.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
