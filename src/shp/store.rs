//! # Geometry Store Engine
//!
//! [`ShapeStore`] owns the `.shp`/`.shx` file pair: header lifecycle, the
//! in-memory slot table mapping record index to (offset, size), record
//! reads with scratch-buffer reuse, and the append/overwrite placement
//! policy. All file access goes through the injected [`Vfs`].
//!
//! ## Slot Table
//!
//! One `RecordSlot` per record, offset and size in bytes, size excluding
//! the 8-byte record frame. Eager opens load the whole `.shx` body up
//! front; lazy opens leave slots zeroed and fill each on first use (offset
//! zero cannot occur for a real record, the file header occupies bytes
//! 0..100). Appends reserve a third of the current length plus a hundred
//! slots ahead of need.
//!
//! ## Write Placement
//!
//! Overwriting the record that currently ends the file rewrites it in
//! place even when it grows. Any other overwrite stays in place only when
//! the new content fits in the old slot; otherwise the record is appended
//! at end of file and the old bytes become dead space. The index always
//! points at the live copy.
//!
//! ## Header Rewrite
//!
//! Writes mark the store dirty. Flush and close rewrite the 100-byte
//! header into both files with the current bounds and file length, plus
//! the full index body. A store opened read-only never writes.

use std::io::SeekFrom;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::shp::object::{ShapeObject, ShapeRead};
use crate::shp::{shape_type_from_code, BoundingBox, ShapeType};
use crate::vfs::{base_path, open_with_fallback, OpenMode, StdVfs, Vfs, VfsFile};
use crate::wire::{
    ShpFileHeader, ShpRecordHeader, ShxRecordEntry, SHP_HEADER_SIZE, SHP_RECORD_HEADER_SIZE,
};
use zerocopy::{FromBytes, IntoBytes};

/// Hard ceiling on the record count an index may declare.
const MAX_RECORDS: u64 = 256_000_000;
/// Declared counts at or above this are cross-checked against the actual
/// index file size before being trusted.
const CROSS_CHECK_RECORDS: u64 = 1_048_576;
/// Buffer allocations at or above this are cross-checked against the
/// actual primary file size before being trusted.
const DISTRUST_BUFFER_SIZE: usize = 10 * 1024 * 1024;

pub use crate::vfs::Access;

/// Byte position and content length of one record in the primary file.
#[derive(Debug, Clone, Copy, Default)]
struct RecordSlot {
    offset: u64,
    size: u32,
}

/// An open geometry store.
pub struct ShapeStore {
    vfs: Box<dyn Vfs>,
    shp: Box<dyn VfsFile>,
    shx: Option<Box<dyn VfsFile>>,
    access: Access,
    shape_type: ShapeType,
    bounds: BoundingBox,
    bounds_seeded: bool,
    file_size: u64,
    slots: Vec<RecordSlot>,
    lazy: bool,
    scratch: Vec<u8>,
    fast_mode: bool,
    cache: ShapeObject,
    cache_busy: bool,
    update: bool,
}

impl ShapeStore {
    /// Opens an existing store with the default filesystem table, loading
    /// the whole index.
    pub fn open(path: impl AsRef<Path>, access: Access) -> Result<Self> {
        Self::open_with(Box::new(StdVfs), path.as_ref(), access, false)
    }

    /// Opens an existing store without loading the index body; each slot
    /// is read from the index file on first use.
    pub fn open_lazy(path: impl AsRef<Path>, access: Access) -> Result<Self> {
        Self::open_with(Box::new(StdVfs), path.as_ref(), access, true)
    }

    /// Opens an existing store through a caller-supplied capability table.
    pub fn open_with(
        vfs: Box<dyn Vfs>,
        path: &Path,
        access: Access,
        lazy: bool,
    ) -> Result<Self> {
        let base = base_path(path);
        let mode = access.open_mode();
        let mut shp = open_with_fallback(vfs.as_ref(), &base, "shp", mode)?;
        let mut shx = open_with_fallback(vfs.as_ref(), &base, "shx", mode)?;

        let mut header_buf = [0u8; SHP_HEADER_SIZE];
        if shp.read_fully(&mut header_buf)? != SHP_HEADER_SIZE {
            return Err(Error::corrupt(0, "primary file shorter than its header"));
        }
        let (file_size, shape_type, bounds) = {
            let header = ShpFileHeader::from_bytes(&header_buf)?;
            let b = header.bounds();
            (
                header.file_length_bytes(),
                shape_type_from_code(header.shape_type(), 32)?,
                BoundingBox {
                    x_min: b[0],
                    y_min: b[1],
                    x_max: b[2],
                    y_max: b[3],
                    z_min: b[4],
                    z_max: b[5],
                    m_min: b[6],
                    m_max: b[7],
                },
            )
        };

        if shx.read_fully(&mut header_buf)? != SHP_HEADER_SIZE {
            return Err(Error::corrupt(0, "index file shorter than its header"));
        }
        let shx_len = ShpFileHeader::from_bytes(&header_buf)?.file_length_bytes();
        let mut record_count = shx_len.saturating_sub(SHP_HEADER_SIZE as u64) / 8;
        if record_count > MAX_RECORDS {
            return Err(Error::corrupt(
                24,
                format!("index declares {record_count} records"),
            ));
        }
        if record_count >= CROSS_CHECK_RECORDS {
            // headers lie; measure the index file before allocating
            let actual = shx.seek(SeekFrom::End(0))?;
            let measured = actual.saturating_sub(SHP_HEADER_SIZE as u64) / 8;
            if measured < record_count {
                debug!(
                    declared = record_count,
                    measured, "index header overstates record count"
                );
                record_count = measured;
            }
            shx.seek(SeekFrom::Start(SHP_HEADER_SIZE as u64))?;
        }
        let record_count = record_count as usize;

        let mut slots = vec![RecordSlot::default(); record_count];
        if !lazy {
            let mut body = vec![0u8; record_count * SHP_RECORD_HEADER_SIZE];
            if shx.read_fully(&mut body)? != body.len() {
                return Err(Error::corrupt(
                    SHP_HEADER_SIZE as u64,
                    "index body shorter than its header declares",
                ));
            }
            for (i, slot) in slots.iter_mut().enumerate() {
                let raw = &body[i * SHP_RECORD_HEADER_SIZE..][..SHP_RECORD_HEADER_SIZE];
                *slot = parse_entry(raw, SHP_HEADER_SIZE as u64 + (i * 8) as u64)?;
            }
        }

        let shx = match (access, lazy) {
            // nothing left to read from the index; release the descriptor
            (Access::ReadOnly, false) => None,
            _ => Some(shx),
        };

        Ok(ShapeStore {
            vfs,
            shp,
            shx,
            access,
            shape_type,
            bounds,
            bounds_seeded: record_count > 0,
            file_size,
            slots,
            lazy,
            scratch: Vec::new(),
            fast_mode: false,
            cache: ShapeObject::null(),
            cache_busy: false,
            update: false,
        })
    }

    /// Creates a new, empty store of the given type.
    pub fn create(path: impl AsRef<Path>, shape_type: ShapeType) -> Result<Self> {
        Self::create_with(Box::new(StdVfs), path.as_ref(), shape_type)
    }

    pub fn create_with(
        vfs: Box<dyn Vfs>,
        path: &Path,
        shape_type: ShapeType,
    ) -> Result<Self> {
        let base = base_path(path);
        let mut shp = vfs.open(&base.with_extension("shp"), OpenMode::Create)?;
        let mut shx = vfs.open(&base.with_extension("shx"), OpenMode::Create)?;

        let header = ShpFileHeader::new(shape_type.code());
        shp.write(header.as_bytes())?;
        shx.write(header.as_bytes())?;
        shp.flush()?;
        shx.flush()?;

        Ok(ShapeStore {
            vfs,
            shp,
            shx: Some(shx),
            access: Access::Update,
            shape_type,
            bounds: BoundingBox::default(),
            bounds_seeded: false,
            file_size: SHP_HEADER_SIZE as u64,
            slots: Vec::new(),
            lazy: false,
            scratch: Vec::new(),
            fast_mode: false,
            cache: ShapeObject::null(),
            cache_busy: false,
            update: false,
        })
    }

    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    pub fn record_count(&self) -> usize {
        self.slots.len()
    }

    /// File-wide bounds over all written records.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Switches single-object reuse on or off. While on, at most one read
    /// result is alive and it must be released before the next read.
    pub fn set_fast_mode(&mut self, on: bool) {
        self.fast_mode = on;
        if !on {
            self.cache_busy = false;
        }
    }

    /// Releases the fast-mode cache slot for the next read. The memory
    /// stays with the store until it closes.
    pub fn release_cached(&mut self) {
        self.cache_busy = false;
    }

    /// Reads and decodes record `index`.
    pub fn read_shape(&mut self, index: usize) -> Result<ShapeRead<'_>> {
        if index >= self.slots.len() {
            return Err(Error::usage(format!(
                "record index {index} out of range 0..{}",
                self.slots.len()
            )));
        }
        if self.fast_mode && self.cache_busy {
            return Err(Error::usage(
                "previous fast-mode record not released before next read",
            ));
        }

        let slot = self.load_slot(index)?;
        let mut entity_size = slot.size as usize + SHP_RECORD_HEADER_SIZE;

        if self.scratch.len() < entity_size {
            let mut target = entity_size + entity_size / 3;
            if target >= DISTRUST_BUFFER_SIZE {
                // before a large allocation, confirm the record really fits
                let actual = self.shp.seek(SeekFrom::End(0))?;
                if slot.offset + entity_size as u64 > actual {
                    return Err(Error::corrupt(
                        slot.offset,
                        format!(
                            "record of {} bytes extends past end of file ({} bytes)",
                            entity_size, actual
                        ),
                    ));
                }
                target = entity_size;
            }
            self.scratch.resize(target, 0);
        }

        self.shp.seek(SeekFrom::Start(slot.offset))?;
        let got = self.shp.read_fully(&mut self.scratch[..entity_size])?;
        if got != entity_size {
            // some writers count the record frame into the index length;
            // the embedded content length settles it
            let frame_ok = got >= SHP_RECORD_HEADER_SIZE
                && got == entity_size - SHP_RECORD_HEADER_SIZE;
            let embedded = if frame_ok {
                ShpRecordHeader::ref_from_bytes(&self.scratch[..SHP_RECORD_HEADER_SIZE])
                    .ok()
                    .map(|h| h.content_bytes())
            } else {
                None
            };
            match embedded {
                Some(len) if len as usize + SHP_RECORD_HEADER_SIZE == got => {
                    debug!(index, "index length off by one record frame, recovered");
                    entity_size = got;
                }
                _ => {
                    return Err(Error::corrupt(
                        slot.offset,
                        format!("short record read: {got} of {entity_size} bytes"),
                    ));
                }
            }
        }

        let content = &self.scratch[SHP_RECORD_HEADER_SIZE..entity_size];
        let at = slot.offset + SHP_RECORD_HEADER_SIZE as u64;
        if self.fast_mode {
            self.cache.decode_into(index, content, at)?;
            self.cache_busy = true;
            Ok(ShapeRead::Cached(&self.cache))
        } else {
            Ok(ShapeRead::Owned(ShapeObject::decode(index, content, at)?))
        }
    }

    /// Writes a record, returning its index. `target` of `None` appends;
    /// an explicit target overwrites that record.
    pub fn write_shape(
        &mut self,
        shape: &ShapeObject,
        target: Option<usize>,
    ) -> Result<usize> {
        if self.access != Access::Update {
            return Err(Error::usage("store is open read-only"));
        }
        if shape.shape_type != self.shape_type && shape.shape_type != ShapeType::Null {
            return Err(Error::usage(format!(
                "cannot write {} record into {} store",
                shape.shape_type.name(),
                self.shape_type.name()
            )));
        }
        if let Some(index) = target {
            if index >= self.slots.len() {
                return Err(Error::usage(format!(
                    "record index {index} out of range 0..{}",
                    self.slots.len()
                )));
            }
        }
        if self.lazy {
            self.load_all_slots()?;
        }

        let index = target.unwrap_or(self.slots.len());
        let mut content = std::mem::take(&mut self.scratch);
        content.reserve(shape.max_encoded_size());
        shape.encode(&mut content);

        let record_len = (content.len() + SHP_RECORD_HEADER_SIZE) as u64;
        // true when the write defines the new end of file, so the declared
        // size may shrink as well as grow
        let (offset, ends_file) = match target {
            Some(i)
                if self.slots[i].offset
                    + self.slots[i].size as u64
                    + SHP_RECORD_HEADER_SIZE as u64
                    == self.file_size =>
            {
                // last record in the file may grow or shrink in place
                (self.slots[i].offset, true)
            }
            Some(i) if content.len() <= self.slots[i].size as usize => {
                (self.slots[i].offset, false)
            }
            _ => (self.file_size, true),
        };

        let frame = ShpRecordHeader::new(index, content.len());
        let result = self.write_record_at(offset, frame.as_bytes(), &content);
        self.scratch = content;
        result?;

        if target.is_none() {
            if self.slots.len() == self.slots.capacity() {
                self.slots.reserve(self.slots.len() / 3 + 100);
            }
            self.slots.push(RecordSlot::default());
        }
        self.slots[index] = RecordSlot {
            offset,
            size: (record_len - SHP_RECORD_HEADER_SIZE as u64) as u32,
        };
        self.file_size = if ends_file {
            offset + record_len
        } else {
            self.file_size.max(offset + record_len)
        };

        self.expand_bounds(shape);
        self.update = true;
        Ok(index)
    }

    fn write_record_at(&mut self, offset: u64, frame: &[u8], content: &[u8]) -> Result<()> {
        if self.shp.tell()? != offset {
            self.shp.seek(SeekFrom::Start(offset))?;
        }
        self.shp.write(frame)?;
        self.shp.write(content)
    }

    fn expand_bounds(&mut self, shape: &ShapeObject) {
        if shape.vertex_count() == 0 {
            return;
        }
        let b = shape.bounds;
        if !self.bounds_seeded {
            self.bounds = b;
            if !shape.shape_type.has_z() {
                self.bounds.z_min = 0.0;
                self.bounds.z_max = 0.0;
            }
            if !shape.has_measure {
                self.bounds.m_min = 0.0;
                self.bounds.m_max = 0.0;
            }
            self.bounds_seeded = true;
            return;
        }
        self.bounds.x_min = self.bounds.x_min.min(b.x_min);
        self.bounds.y_min = self.bounds.y_min.min(b.y_min);
        self.bounds.x_max = self.bounds.x_max.max(b.x_max);
        self.bounds.y_max = self.bounds.y_max.max(b.y_max);
        if shape.shape_type.has_z() {
            self.bounds.z_min = self.bounds.z_min.min(b.z_min);
            self.bounds.z_max = self.bounds.z_max.max(b.z_max);
        }
        if shape.has_measure {
            self.bounds.m_min = self.bounds.m_min.min(b.m_min);
            self.bounds.m_max = self.bounds.m_max.max(b.m_max);
        }
    }

    fn load_slot(&mut self, index: usize) -> Result<RecordSlot> {
        let slot = self.slots[index];
        if slot.offset != 0 || !self.lazy {
            return Ok(slot);
        }
        let shx = self.shx.as_mut().ok_or_else(|| {
            Error::usage("index file handle not available for lazy load")
        })?;
        let entry_offset = SHP_HEADER_SIZE as u64 + (index * SHP_RECORD_HEADER_SIZE) as u64;
        shx.seek(SeekFrom::Start(entry_offset))?;
        let mut raw = [0u8; SHP_RECORD_HEADER_SIZE];
        if shx.read_fully(&mut raw)? != SHP_RECORD_HEADER_SIZE {
            return Err(Error::corrupt(entry_offset, "index entry truncated"));
        }
        let slot = parse_entry(&raw, entry_offset)?;
        self.slots[index] = slot;
        Ok(slot)
    }

    fn load_all_slots(&mut self) -> Result<()> {
        for i in 0..self.slots.len() {
            self.load_slot(i)?;
        }
        self.lazy = false;
        Ok(())
    }

    /// Rewrites both file headers and the index body if anything changed
    /// since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if !self.update {
            return Ok(());
        }
        let shx = self.shx.as_mut().ok_or_else(|| {
            Error::usage("cannot flush a store whose index handle is closed")
        })?;

        let mut header = ShpFileHeader::new(self.shape_type.code());
        header.set_bounds([
            self.bounds.x_min,
            self.bounds.y_min,
            self.bounds.x_max,
            self.bounds.y_max,
            self.bounds.z_min,
            self.bounds.z_max,
            self.bounds.m_min,
            self.bounds.m_max,
        ]);

        header.set_file_length_bytes(self.file_size);
        self.shp.seek(SeekFrom::Start(0))?;
        self.shp.write(header.as_bytes())?;

        header.set_file_length_bytes(
            (SHP_HEADER_SIZE + self.slots.len() * SHP_RECORD_HEADER_SIZE) as u64,
        );
        shx.seek(SeekFrom::Start(0))?;
        shx.write(header.as_bytes())?;
        let mut body = Vec::with_capacity(self.slots.len() * SHP_RECORD_HEADER_SIZE);
        for slot in &self.slots {
            body.extend_from_slice(
                ShxRecordEntry::new(slot.offset, slot.size as u64).as_bytes(),
            );
        }
        shx.write(&body)?;

        self.shp.flush()?;
        shx.flush()?;
        self.update = false;
        Ok(())
    }

    /// Flushes and drops the store.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    /// The capability table this store was opened with.
    pub fn vfs(&self) -> &dyn Vfs {
        self.vfs.as_ref()
    }
}

impl Drop for ShapeStore {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

fn parse_entry(raw: &[u8], at: u64) -> Result<RecordSlot> {
    let entry = ShxRecordEntry::ref_from_bytes(raw)
        .map_err(|e| Error::corrupt(at, format!("unreadable index entry: {e:?}")))?;
    let offset = entry.offset_bytes();
    let size = entry.content_bytes();
    if offset > i32::MAX as u64 {
        return Err(Error::corrupt(at, format!("record offset {offset} overflows")));
    }
    if size > i32::MAX as u64 - SHP_RECORD_HEADER_SIZE as u64 {
        return Err(Error::corrupt(at, format!("record length {size} overflows")));
    }
    Ok(RecordSlot {
        offset,
        size: size as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn point(x: f64, y: f64) -> ShapeObject {
        ShapeObject::create(ShapeType::Point, &[], &[], &[x], &[y], None, None).unwrap()
    }

    #[test]
    fn create_write_reopen_read() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("cities");

        let mut store = ShapeStore::create(&base, ShapeType::Point).unwrap();
        assert_eq!(store.write_shape(&point(1.0, 2.0), None).unwrap(), 0);
        assert_eq!(store.write_shape(&point(-3.0, 4.0), None).unwrap(), 1);
        store.close().unwrap();

        let mut store = ShapeStore::open(&base, Access::ReadOnly).unwrap();
        assert_eq!(store.shape_type(), ShapeType::Point);
        assert_eq!(store.record_count(), 2);
        let shape = store.read_shape(0).unwrap();
        assert_eq!(shape.x, vec![1.0]);
        assert_eq!(shape.y, vec![2.0]);
        assert_eq!(shape.bounds.x_min, 1.0);
        drop(shape);

        let b = store.bounds();
        assert_eq!(b.x_min, -3.0);
        assert_eq!(b.x_max, 1.0);
        assert_eq!(b.y_max, 4.0);
    }

    #[test]
    fn empty_store_has_header_only_and_rejects_reads() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("empty");
        ShapeStore::create(&base, ShapeType::Arc)
            .unwrap()
            .close()
            .unwrap();

        assert_eq!(
            std::fs::metadata(base.with_extension("shp")).unwrap().len(),
            100
        );
        let mut store = ShapeStore::open(&base, Access::ReadOnly).unwrap();
        assert_eq!(store.record_count(), 0);
        assert!(matches!(store.read_shape(0), Err(Error::Usage(_))));
    }

    #[test]
    fn overwrite_last_record_grows_in_place() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("grow");

        let mut store = ShapeStore::create(&base, ShapeType::Arc).unwrap();
        let small = ShapeObject::simple(ShapeType::Arc, &[0.0, 1.0], &[0.0, 1.0]).unwrap();
        store.write_shape(&small, None).unwrap();

        let big = ShapeObject::simple(
            ShapeType::Arc,
            &[0.0, 1.0, 2.0, 3.0],
            &[0.0, 1.0, 2.0, 3.0],
        )
        .unwrap();
        store.write_shape(&big, Some(0)).unwrap();
        store.close().unwrap();

        let mut store = ShapeStore::open(&base, Access::ReadOnly).unwrap();
        assert_eq!(store.record_count(), 1);
        let back = store.read_shape(0).unwrap();
        assert_eq!(back.vertex_count(), 4);
    }

    #[test]
    fn overwrite_middle_record_with_larger_content_appends() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("append");

        let mut store = ShapeStore::create(&base, ShapeType::Arc).unwrap();
        let small = ShapeObject::simple(ShapeType::Arc, &[0.0, 1.0], &[0.0, 1.0]).unwrap();
        store.write_shape(&small, None).unwrap();
        store.write_shape(&small, None).unwrap();

        let big = ShapeObject::simple(
            ShapeType::Arc,
            &[5.0, 6.0, 7.0, 8.0],
            &[5.0, 6.0, 7.0, 8.0],
        )
        .unwrap();
        store.write_shape(&big, Some(0)).unwrap();
        store.close().unwrap();

        let mut store = ShapeStore::open(&base, Access::ReadOnly).unwrap();
        let back = store.read_shape(0).unwrap();
        assert_eq!(back.x, vec![5.0, 6.0, 7.0, 8.0]);
        drop(back);
        let other = store.read_shape(1).unwrap();
        assert_eq!(other.vertex_count(), 2);
    }

    #[test]
    fn write_rejects_type_mismatch_but_accepts_null() {
        let dir = tempdir().unwrap();
        let mut store =
            ShapeStore::create(dir.path().join("typed"), ShapeType::Polygon).unwrap();
        let arc = ShapeObject::simple(ShapeType::Arc, &[0.0], &[0.0]).unwrap();
        assert!(matches!(
            store.write_shape(&arc, None),
            Err(Error::Usage(_))
        ));
        store.write_shape(&ShapeObject::null(), None).unwrap();
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("ro");
        ShapeStore::create(&base, ShapeType::Point)
            .unwrap()
            .close()
            .unwrap();

        let mut store = ShapeStore::open(&base, Access::ReadOnly).unwrap();
        assert!(matches!(
            store.write_shape(&point(0.0, 0.0), None),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn fast_mode_requires_release_between_reads() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("fast");
        let mut store = ShapeStore::create(&base, ShapeType::Point).unwrap();
        store.write_shape(&point(1.0, 1.0), None).unwrap();
        store.write_shape(&point(2.0, 2.0), None).unwrap();

        store.set_fast_mode(true);
        {
            let first = store.read_shape(0).unwrap();
            assert!(matches!(first, ShapeRead::Cached(_)));
            assert_eq!(first.x, vec![1.0]);
        }
        assert!(matches!(store.read_shape(1), Err(Error::Usage(_))));
        store.release_cached();
        let second = store.read_shape(1).unwrap();
        assert_eq!(second.x, vec![2.0]);
        // one-vertex cached shapes carry their vertex as bounds
        assert_eq!(second.bounds.x_min, 2.0);
        assert_eq!(second.bounds.x_max, 2.0);
    }

    #[test]
    fn lazy_open_reads_match_eager_open() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("lazy");
        let mut store = ShapeStore::create(&base, ShapeType::Point).unwrap();
        for i in 0..5 {
            store.write_shape(&point(i as f64, -(i as f64)), None).unwrap();
        }
        store.close().unwrap();

        let mut lazy = ShapeStore::open_lazy(&base, Access::ReadOnly).unwrap();
        assert_eq!(lazy.record_count(), 5);
        for i in (0..5).rev() {
            let shape = lazy.read_shape(i).unwrap();
            assert_eq!(shape.x, vec![i as f64]);
        }
    }

    #[test]
    fn uppercase_extension_fallback() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("upper");
        let mut store = ShapeStore::create(&base, ShapeType::Point).unwrap();
        store.write_shape(&point(7.0, 8.0), None).unwrap();
        store.close().unwrap();

        std::fs::rename(
            base.with_extension("shp"),
            base.with_extension("SHP"),
        )
        .unwrap();
        std::fs::rename(
            base.with_extension("shx"),
            base.with_extension("SHX"),
        )
        .unwrap();

        let mut store = ShapeStore::open(&base, Access::ReadOnly).unwrap();
        assert_eq!(store.read_shape(0).unwrap().x, vec![7.0]);
    }

    #[test]
    fn open_rejects_garbage_header() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("junk");
        std::fs::write(base.with_extension("shp"), [0u8; 100]).unwrap();
        std::fs::write(base.with_extension("shx"), [0u8; 100]).unwrap();
        assert!(matches!(
            ShapeStore::open(&base, Access::ReadOnly),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn null_records_do_not_disturb_bounds() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("nulls");
        let mut store = ShapeStore::create(&base, ShapeType::Point).unwrap();
        store.write_shape(&ShapeObject::null(), None).unwrap();
        store.write_shape(&point(5.0, 6.0), None).unwrap();
        let b = store.bounds();
        assert_eq!((b.x_min, b.x_max), (5.0, 5.0));
        assert_eq!((b.y_min, b.y_max), (6.0, 6.0));
    }
}
