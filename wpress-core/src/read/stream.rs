use crate::container::header::{ArchiveEntry, HEADER_LEN, is_sentinel};
use crate::error::Result;
use std::io::{ErrorKind, Read, Write};

/// Payload bytes moved per read, independent of the entry size.
pub const CHUNK_SIZE: usize = 512_000;

/// What the next header slot held.
#[derive(Debug)]
pub enum Record {
    Entry(ArchiveEntry),
    Sentinel,
    /// Fewer than `HEADER_LEN` bytes were left; carries how many.
    Short(usize),
}

/// Sequential walker over header+payload records.
///
/// The caller must consume every entry's payload (`copy_payload` or `skip_payload`)
/// before asking for the next record, otherwise the stream falls out of alignment.
pub struct EntryReader<R: Read> {
    inner: R,
    pos: u64,
    buf: Vec<u8>,
}

impl<R: Read> EntryReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pos: 0,
            buf: vec![0u8; CHUNK_SIZE],
        }
    }

    /// Bytes consumed from the underlying stream so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn next_record(&mut self) -> Result<Record> {
        let mut block = Box::new([0u8; HEADER_LEN]);
        let n = self.fill(&mut block[..])?;
        if n != HEADER_LEN {
            return Ok(Record::Short(n));
        }
        if is_sentinel(&block[..]) {
            return Ok(Record::Sentinel);
        }
        ArchiveEntry::decode(&block).map(Record::Entry)
    }

    /// Stream exactly `size` payload bytes into `out`, `CHUNK_SIZE` at a time.
    ///
    /// A short read surfaces as `ErrorKind::UnexpectedEof`.
    pub fn copy_payload(&mut self, size: u64, out: &mut impl Write) -> std::io::Result<()> {
        let mut remaining = size;
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            self.inner.read_exact(&mut self.buf[..want])?;
            self.pos += want as u64;
            out.write_all(&self.buf[..want])?;
            remaining -= want as u64;
        }
        Ok(())
    }

    /// Discard exactly `size` payload bytes so the next header lines up.
    ///
    /// A short read surfaces as `ErrorKind::UnexpectedEof`, same as `copy_payload`.
    pub fn skip_payload(&mut self, size: u64) -> std::io::Result<()> {
        let skipped = std::io::copy(&mut (&mut self.inner).take(size), &mut std::io::sink())?;
        self.pos += skipped;
        if skipped != size {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("payload ended after {skipped} of {size} bytes"),
            ));
        }
        Ok(())
    }

    /// Like `read_exact`, but reports how much was read instead of failing on EOF.
    fn fill(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut got = 0;
        while got < buf.len() {
            match self.inner.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.pos += got as u64;
        Ok(got)
    }
}
