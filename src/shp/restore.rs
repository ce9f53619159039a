//! # Index Reconstruction
//!
//! Rebuilds a lost or corrupt `.shx` file from the primary file alone.
//! Every record in the primary file carries its own frame with ordinal and
//! content length, so a single linear scan recovers the full offset table.
//! The scan is strict: an unknown shape type code, a record extending past
//! the declared file size, or a scan that does not land exactly on the
//! declared end all abort with the byte offset of the violation, since a
//! misaligned frame would poison every entry after it.

use std::io::SeekFrom;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::shp::shape_type_from_code;
use crate::vfs::{base_path, open_with_fallback, OpenMode, StdVfs, Vfs};
use crate::wire::{
    ShpFileHeader, ShpRecordHeader, ShxRecordEntry, SHP_HEADER_SIZE, SHP_RECORD_HEADER_SIZE,
};
use zerocopy::IntoBytes;

/// Scans the primary file and writes a fresh index beside it, returning
/// the number of records recovered.
pub fn restore_index(path: impl AsRef<Path>) -> Result<usize> {
    restore_index_with(&StdVfs, path.as_ref())
}

/// [`restore_index`] through a caller-supplied capability table.
pub fn restore_index_with(vfs: &dyn Vfs, path: &Path) -> Result<usize> {
    let base = base_path(path);
    let mut shp = open_with_fallback(vfs, &base, "shp", OpenMode::Read)?;

    let mut header_buf = [0u8; SHP_HEADER_SIZE];
    if shp.read_fully(&mut header_buf)? != SHP_HEADER_SIZE {
        return Err(Error::corrupt(0, "primary file shorter than its header"));
    }
    let declared_size = {
        let header = ShpFileHeader::from_bytes(&header_buf)?;
        shape_type_from_code(header.shape_type(), 32)?;
        header.file_length_bytes()
    };

    let mut entries: Vec<ShxRecordEntry> = Vec::new();
    let mut offset = SHP_HEADER_SIZE as u64;
    let mut frame_buf = [0u8; SHP_RECORD_HEADER_SIZE + 4];
    while offset < declared_size {
        if offset + (SHP_RECORD_HEADER_SIZE + 4) as u64 > declared_size {
            return Err(Error::corrupt(
                offset,
                "trailing bytes too short for a record",
            ));
        }
        shp.seek(SeekFrom::Start(offset))?;
        if shp.read_fully(&mut frame_buf)? != frame_buf.len() {
            return Err(Error::corrupt(offset, "record frame truncated"));
        }
        let content_len = {
            let frame = ShpRecordHeader::from_bytes(&frame_buf, offset)?;
            frame.content_bytes()
        };
        let type_code = i32::from_le_bytes([
            frame_buf[8],
            frame_buf[9],
            frame_buf[10],
            frame_buf[11],
        ]);
        shape_type_from_code(type_code, offset + SHP_RECORD_HEADER_SIZE as u64)?;

        if content_len < 4
            || offset + SHP_RECORD_HEADER_SIZE as u64 + content_len > declared_size
        {
            return Err(Error::corrupt(
                offset,
                format!("record content of {content_len} bytes does not fit the file"),
            ));
        }

        entries.push(ShxRecordEntry::new(offset, content_len));
        offset += SHP_RECORD_HEADER_SIZE as u64 + content_len;
    }
    if offset != declared_size {
        return Err(Error::corrupt(
            offset,
            format!("scan overran declared file size of {declared_size} bytes"),
        ));
    }

    let mut shx = vfs.open(&base.with_extension("shx"), OpenMode::Create)?;
    let mut header = *ShpFileHeader::from_bytes(&header_buf)?;
    header.set_file_length_bytes(
        (SHP_HEADER_SIZE + entries.len() * SHP_RECORD_HEADER_SIZE) as u64,
    );
    shx.write(header.as_bytes())?;
    for entry in &entries {
        shx.write(entry.as_bytes())?;
    }
    shx.flush()?;

    debug!(records = entries.len(), "index reconstructed");
    Ok(entries.len())
}
