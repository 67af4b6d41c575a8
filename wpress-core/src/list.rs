use crate::container::header::ArchiveEntry;
use crate::error::{Result, WpressError};
use crate::read::stream::{EntryReader, Record};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

/// Enumerate entries without writing anything; payloads are skipped.
pub fn list(archive: &Path) -> Result<Vec<ArchiveEntry>> {
    let f = File::open(archive).map_err(|e| WpressError::archive_io(archive, e))?;
    let mut reader = EntryReader::new(BufReader::new(f));
    let mut out = Vec::new();
    loop {
        match reader.next_record()? {
            Record::Entry(e) => match reader.skip_payload(e.size) {
                Ok(()) => out.push(e),
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    return Err(WpressError::ArchiveTruncated {
                        extracted: Vec::new(),
                    });
                }
                Err(err) => return Err(WpressError::archive_io(archive, err)),
            },
            Record::Sentinel => return Ok(out),
            Record::Short(_) => {
                return Err(WpressError::ArchiveTruncated {
                    extracted: Vec::new(),
                });
            }
        }
    }
}
