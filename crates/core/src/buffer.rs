//! Spooled transfer buffer.
//!
//! A `SpoolBuffer` keeps serialized bytes in memory while they fit under a
//! configurable limit and transparently spills to an anonymous temporary file
//! once a write would exceed it. The temp file is unlinked on creation, so the
//! OS reclaims it as soon as the last handle drops, on success and error paths
//! alike.

use bytes::Bytes;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::DEFAULT_SPOOL_MEMORY_LIMIT;

enum Spool {
    Memory(Cursor<Vec<u8>>),
    Disk(File),
}

/// A byte buffer that stays resident below a memory limit and spills to a
/// temporary file above it.
///
/// Buffers are exclusively owned by the single upload or download call that
/// created them and are released when dropped.
pub struct SpoolBuffer {
    limit: usize,
    inner: Spool,
}

impl SpoolBuffer {
    /// Create a buffer with the given memory limit in bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            inner: Spool::Memory(Cursor::new(Vec::new())),
        }
    }

    /// Create a buffer with the default memory limit.
    pub fn with_default_limit() -> Self {
        Self::new(DEFAULT_SPOOL_MEMORY_LIMIT)
    }

    /// Total number of bytes written.
    pub fn len(&self) -> io::Result<u64> {
        match &self.inner {
            Spool::Memory(cursor) => Ok(cursor.get_ref().len() as u64),
            Spool::Disk(file) => Ok(file.metadata()?.len()),
        }
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns true if the contents have spilled to disk.
    pub fn is_spilled(&self) -> bool {
        matches!(self.inner, Spool::Disk(_))
    }

    /// Seek back to the start, so the contents can be read back.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Hand out an independent re-readable view of the contents, positioned
    /// at the start.
    ///
    /// For spilled buffers the view shares the file offset with the buffer,
    /// so readers must be used one at a time and re-created per pass.
    pub fn reader(&self) -> io::Result<SpoolReader> {
        match &self.inner {
            Spool::Memory(cursor) => Ok(SpoolReader {
                part: Part::Memory(Cursor::new(Bytes::copy_from_slice(cursor.get_ref()))),
            }),
            Spool::Disk(file) => {
                let mut clone = file.try_clone()?;
                clone.seek(SeekFrom::Start(0))?;
                Ok(SpoolReader {
                    part: Part::File(clone),
                })
            }
        }
    }

    fn spill(&mut self, cursor_pos: u64) -> io::Result<()> {
        if let Spool::Memory(cursor) = &self.inner {
            let mut file = tempfile::tempfile()?;
            file.write_all(cursor.get_ref())?;
            file.seek(SeekFrom::Start(cursor_pos))?;
            self.inner = Spool::Disk(file);
        }
        Ok(())
    }
}

impl Write for SpoolBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Spool::Memory(cursor) = &self.inner {
            if cursor.get_ref().len() + buf.len() > self.limit {
                let pos = cursor.position();
                self.spill(pos)?;
            }
        }
        match &mut self.inner {
            Spool::Memory(cursor) => cursor.write(buf),
            Spool::Disk(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Spool::Memory(cursor) => cursor.flush(),
            Spool::Disk(file) => file.flush(),
        }
    }
}

impl Read for SpoolBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Spool::Memory(cursor) => cursor.read(buf),
            Spool::Disk(file) => file.read(buf),
        }
    }
}

impl Seek for SpoolBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.inner {
            Spool::Memory(cursor) => cursor.seek(pos),
            Spool::Disk(file) => file.seek(pos),
        }
    }
}

enum Part {
    Memory(Cursor<Bytes>),
    File(File),
}

/// A re-readable view of a `SpoolBuffer`, positioned at the start.
pub struct SpoolReader {
    part: Part,
}

impl SpoolReader {
    /// Decompose into the underlying storage, for hand-off to transports that
    /// want to own the body (cheap bytes for resident contents, a file handle
    /// for spilled contents).
    pub fn into_part(self) -> SpoolPart {
        match self.part {
            Part::Memory(cursor) => SpoolPart::Memory(cursor.into_inner()),
            Part::File(file) => SpoolPart::File(file),
        }
    }
}

impl Read for SpoolReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.part {
            Part::Memory(cursor) => cursor.read(buf),
            Part::File(file) => file.read(buf),
        }
    }
}

/// The underlying storage of a `SpoolReader`.
pub enum SpoolPart {
    /// Contents resident in memory.
    Memory(Bytes),
    /// Contents spilled to an anonymous temp file, positioned at the start.
    File(File),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_writes_stay_in_memory() {
        let mut spool = SpoolBuffer::new(1024);
        spool.write_all(b"hello").unwrap();
        assert!(!spool.is_spilled());
        assert_eq!(spool.len().unwrap(), 5);

        spool.rewind().unwrap();
        let mut out = Vec::new();
        spool.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_large_writes_spill_to_disk() {
        let mut spool = SpoolBuffer::new(16);
        let data: Vec<u8> = (0..100u8).collect();
        spool.write_all(&data[..10]).unwrap();
        assert!(!spool.is_spilled());
        spool.write_all(&data[10..]).unwrap();
        assert!(spool.is_spilled());
        assert_eq!(spool.len().unwrap(), 100);

        spool.rewind().unwrap();
        let mut out = Vec::new();
        spool.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_reader_replays_from_start() {
        for limit in [4usize, 4096] {
            let mut spool = SpoolBuffer::new(limit);
            spool.write_all(b"replay me").unwrap();

            for _ in 0..2 {
                let mut reader = spool.reader().unwrap();
                let mut out = Vec::new();
                reader.read_to_end(&mut out).unwrap();
                assert_eq!(out, b"replay me");
            }
        }
    }

    #[test]
    fn test_empty_buffer() {
        let mut spool = SpoolBuffer::with_default_limit();
        assert!(spool.is_empty().unwrap());
        spool.rewind().unwrap();
        let mut out = Vec::new();
        spool.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
