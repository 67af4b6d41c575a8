use crate::error::{Result, WpressError};
use std::io::{Read, Write};

pub const NAME_LEN: usize = 255;
pub const SIZE_LEN: usize = 14;
pub const MTIME_LEN: usize = 12;
pub const PATH_LEN: usize = 4096;

/// Fixed width of every header record, including the end-of-archive sentinel.
pub const HEADER_LEN: usize = NAME_LEN + SIZE_LEN + MTIME_LEN + PATH_LEN;

const SIZE_OFF: usize = NAME_LEN;
const MTIME_OFF: usize = SIZE_OFF + SIZE_LEN;
const PATH_OFF: usize = MTIME_OFF + MTIME_LEN;

/// The all-zero record that terminates an archive.
pub const EOF_BLOCK: [u8; HEADER_LEN] = [0u8; HEADER_LEN];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub filename: String,
    pub size: u64,
    pub mtime: u64,
    /// Directory of the entry inside the archive, `/`-separated. Empty at the archive root.
    pub relative_path: String,
}

impl ArchiveEntry {
    pub fn new(relative_path: &str, filename: &str, size: u64, mtime: u64) -> Self {
        Self {
            filename: filename.to_string(),
            size,
            mtime,
            relative_path: normalize_dir(relative_path),
        }
    }

    /// `relative_path/filename`, or just `filename` for root entries.
    pub fn full_name(&self) -> String {
        if self.relative_path.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.relative_path, self.filename)
        }
    }

    pub fn encode(&self) -> Result<Box<[u8; HEADER_LEN]>> {
        if self.filename.is_empty() || self.filename.contains('\0') {
            return Err(WpressError::InvalidInput(format!(
                "unusable entry filename: {:?}",
                self.filename
            )));
        }
        let size = self.size.to_string();
        let mtime = self.mtime.to_string();
        let fields: [(&[u8], usize, usize, &str); 4] = [
            (self.filename.as_bytes(), 0, NAME_LEN, "filename"),
            (size.as_bytes(), SIZE_OFF, SIZE_LEN, "size"),
            (mtime.as_bytes(), MTIME_OFF, MTIME_LEN, "mtime"),
            (self.relative_path.as_bytes(), PATH_OFF, PATH_LEN, "path"),
        ];

        let mut block = Box::new([0u8; HEADER_LEN]);
        for (bytes, off, width, what) in fields {
            if bytes.len() > width {
                return Err(WpressError::InvalidInput(format!(
                    "{what} does not fit in {width} bytes: {} bytes",
                    bytes.len()
                )));
            }
            block[off..off + bytes.len()].copy_from_slice(bytes);
        }
        Ok(block)
    }

    pub fn write_to(&self, mut w: impl Write) -> Result<()> {
        let block = self.encode()?;
        w.write_all(&block[..])?;
        Ok(())
    }

    /// Decode a non-sentinel header record.
    pub fn decode(block: &[u8; HEADER_LEN]) -> Result<Self> {
        let filename = field_str(&block[..SIZE_OFF], "filename")?;
        let size = field_str(&block[SIZE_OFF..MTIME_OFF], "size")?;
        let mtime = field_str(&block[MTIME_OFF..PATH_OFF], "mtime")?;
        let path = field_str(&block[PATH_OFF..], "path")?;

        if filename.is_empty() {
            return Err(WpressError::ArchiveInvalid(
                "invalid header: empty filename".into(),
            ));
        }
        let size = size.parse::<u64>().map_err(|_| {
            WpressError::ArchiveInvalid(format!("invalid header: bad size field {size:?}"))
        })?;
        let mtime = if mtime.is_empty() {
            0
        } else {
            mtime.parse::<u64>().map_err(|_| {
                WpressError::ArchiveInvalid(format!("invalid header: bad mtime field {mtime:?}"))
            })?
        };

        Ok(Self {
            filename: filename.to_string(),
            size,
            mtime,
            relative_path: normalize_dir(path),
        })
    }

    /// Read one record. `Ok(None)` means the sentinel was read.
    pub fn read_from(mut r: impl Read) -> Result<Option<Self>> {
        let mut block = Box::new([0u8; HEADER_LEN]);
        r.read_exact(&mut block[..])?;
        if is_sentinel(&block[..]) {
            return Ok(None);
        }
        Self::decode(&block).map(Some)
    }
}

pub fn is_sentinel(block: &[u8]) -> bool {
    block.len() == HEADER_LEN && block == &EOF_BLOCK[..]
}

fn field_str<'a>(raw: &'a [u8], what: &str) -> Result<&'a str> {
    let s = std::str::from_utf8(raw).map_err(|_| {
        WpressError::ArchiveInvalid(format!("invalid header: {what} is not UTF-8"))
    })?;
    Ok(s.trim_matches(|c: char| c == '\0' || c.is_ascii_whitespace()))
}

fn normalize_dir(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path.trim_end_matches('/');
    if path == "." {
        String::new()
    } else {
        path.to_string()
    }
}
