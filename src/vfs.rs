//! # I/O Capability Table
//!
//! Both store engines perform file access exclusively through the [`Vfs`]
//! trait, a capability table of blocking byte-stream primitives: open,
//! read, write, seek, tell, flush, remove, plus a locale-independent
//! string-to-double parser used by the attribute engine. Swapping the table
//! redirects every byte the codec touches, so an embedder can back the
//! codec with something other than the local filesystem.
//!
//! [`StdVfs`] is the default implementation over `std::fs`. It is what
//! [`ShapeStore::open`](crate::shp::ShapeStore::open) and
//! [`DbfStore::open`](crate::dbf::DbfStore::open) use when no table is
//! injected.
//!
//! All I/O is synchronous and blocking. Nothing here is thread-safe and
//! nothing needs to be; handles are single-owner by design.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// Store access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    Update,
}

impl Access {
    pub(crate) fn open_mode(self) -> OpenMode {
        match self {
            Access::ReadOnly => OpenMode::Read,
            Access::Update => OpenMode::ReadWrite,
        }
    }
}

/// File access mode requested from [`Vfs::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read only.
    Read,
    /// Existing file, read and write.
    ReadWrite,
    /// New file, truncating any existing one, read and write.
    Create,
}

/// One open byte stream obtained from a [`Vfs`].
pub trait VfsFile {
    /// Reads up to `buf.len()` bytes, returning the number transferred.
    /// A short count signals end of file, not an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes the whole buffer or fails.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Moves the file position, returning the new absolute offset.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Reports the current absolute file position.
    fn tell(&mut self) -> Result<u64>;

    /// Flushes buffered writes to the underlying store.
    fn flush(&mut self) -> Result<()>;
}

impl dyn VfsFile + '_ {
    /// Reads exactly `buf.len()` bytes or reports how many arrived.
    pub(crate) fn read_fully(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = self.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }
}

/// The capability table injected into both store engines.
pub trait Vfs {
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn VfsFile>>;

    fn remove(&self, path: &Path) -> Result<()>;

    /// Locale-independent text-to-double conversion. The on-disk numeric
    /// fields always use `.` as the decimal separator regardless of the
    /// process locale.
    fn parse_double(&self, text: &str) -> f64 {
        text.trim().parse().unwrap_or(0.0)
    }
}

/// Strips a trailing `.shp`/`.shx`/`.dbf` extension, in either case, so
/// callers may pass any member of a file set.
pub(crate) fn base_path(path: &Path) -> std::path::PathBuf {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if matches!(
            ext.to_ascii_lowercase().as_str(),
            "shp" | "shx" | "dbf" | "cpg"
        ) {
            return path.with_extension("");
        }
    }
    path.to_path_buf()
}

/// Opens `base` with the lower-case extension, falling back to the
/// upper-case one. The first error is reported when both fail.
pub(crate) fn open_with_fallback(
    vfs: &dyn Vfs,
    base: &Path,
    ext: &str,
    mode: OpenMode,
) -> Result<Box<dyn VfsFile>> {
    match vfs.open(&base.with_extension(ext), mode) {
        Ok(file) => Ok(file),
        Err(first) => vfs
            .open(&base.with_extension(ext.to_ascii_uppercase()), mode)
            .map_err(|_| first),
    }
}

/// Default capability table over `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdVfs;

struct StdVfsFile {
    file: File,
}

impl VfsFile for StdVfsFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.file
            .read(buf)
            .map_err(|e| Error::io("read failed", e))
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.file
            .write_all(buf)
            .map_err(|e| Error::io("write failed", e))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.file
            .seek(pos)
            .map_err(|e| Error::io("seek failed", e))
    }

    fn tell(&mut self) -> Result<u64> {
        self.file
            .stream_position()
            .map_err(|e| Error::io("tell failed", e))
    }

    fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| Error::io("flush failed", e))
    }
}

impl Vfs for StdVfs {
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn VfsFile>> {
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::ReadWrite => options.read(true).write(true),
            OpenMode::Create => options.read(true).write(true).create(true).truncate(true),
        };
        let file = options
            .open(path)
            .map_err(|e| Error::io("failed to open file", e))?;
        Ok(Box::new(StdVfsFile { file }))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| Error::io("failed to remove file", e))
    }
}
