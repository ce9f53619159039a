//! # Attribute Store Engine
//!
//! [`DbfStore`] owns the `.dbf` file: the 32-byte header, the raw
//! field-descriptor block, and a single-record write-back cache. At most
//! one record buffer is resident; loading a different record flushes a
//! dirty buffer first, and every schema mutation or close does the same.
//!
//! ## Seek Discipline
//!
//! Consecutive record writes advance through the file without re-seeking.
//! Any read, header write, or end-of-file marker invalidates the known
//! position and forces the next record write to seek. The flag models the
//! cost asymmetry between buffered sequential writes and mixed access.
//!
//! ## Code Page
//!
//! A sibling `.cpg` file names the character encoding explicitly; when
//! absent, a non-zero language driver byte in the header yields a derived
//! `LDID/n` label. This codec records the resolved name and never
//! transcodes.

use std::io::SeekFrom;
use std::path::Path;

use hashbrown::HashMap;
use tracing::warn;

use crate::dbf::{is_value_null, null_fill, FieldDescr, FieldType};
use crate::error::{Error, Result};
use crate::vfs::{base_path, open_with_fallback, Access, OpenMode, StdVfs, Vfs, VfsFile};
use crate::wire::{
    DbfFieldDescriptor, DbfFileHeader, DBF_BLOCK_SIZE, DBF_EOF_CHAR, DBF_HEADER_TERMINATOR,
};
use zerocopy::IntoBytes;

/// Smallest legal header: the 32-byte block plus the terminator.
pub(crate) const MIN_HEADER_LENGTH: usize = DBF_BLOCK_SIZE + 1;
/// Header and record lengths are 16-bit on disk.
pub(crate) const MAX_HEADER_LENGTH: usize = u16::MAX as usize;
/// Widest single field the descriptor can express.
pub(crate) const MAX_FIELD_WIDTH: usize = 255;

/// Update date stamped into newly created tables.
const CREATE_DATE: (u16, u8, u8) = (1995, 7, 26);

/// Outcome of an attribute write. Over-width values are truncated into
/// the field rather than rejected; this type is how that is reported.
#[must_use = "a truncated write is reported here, not as an error"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Complete,
    /// The value was cut down to the field width before storing.
    Truncated,
}

impl WriteOutcome {
    pub fn is_truncated(self) -> bool {
        self == WriteOutcome::Truncated
    }

    /// Explicitly discards the outcome. Truncation still happened.
    pub fn ignore(self) {}
}

/// An open attribute store.
pub struct DbfStore {
    pub(crate) vfs: Box<dyn Vfs>,
    pub(crate) file: Box<dyn VfsFile>,
    pub(crate) access: Access,
    pub(crate) record_count: usize,
    pub(crate) header_length: usize,
    pub(crate) record_length: usize,
    pub(crate) fields: Vec<FieldDescr>,
    pub(crate) name_index: HashMap<String, usize>,
    /// Descriptor block plus terminator as stored on disk, preserved
    /// byte-for-byte so foreign reserved bytes survive a rewrite.
    pub(crate) raw_header: Vec<u8>,
    pub(crate) record_buf: Vec<u8>,
    pub(crate) current_record: Option<usize>,
    pub(crate) record_modified: bool,
    work_buf: Vec<u8>,
    last_update: (u16, u8, u8),
    language_driver: u8,
    code_page: Option<String>,
    pub(crate) header_pending: bool,
    pub(crate) header_dirty: bool,
    write_eof_char: bool,
    pub(crate) requires_seek: bool,
}

impl DbfStore {
    /// Opens an existing table with the default filesystem table.
    pub fn open(path: impl AsRef<Path>, access: Access) -> Result<Self> {
        Self::open_with(Box::new(StdVfs), path.as_ref(), access)
    }

    /// Opens an existing table through a caller-supplied capability table.
    pub fn open_with(vfs: Box<dyn Vfs>, path: &Path, access: Access) -> Result<Self> {
        let base = base_path(path);
        let mut file = open_with_fallback(vfs.as_ref(), &base, "dbf", access.open_mode())?;

        let mut header_buf = [0u8; DBF_BLOCK_SIZE];
        if file.read_fully(&mut header_buf)? != DBF_BLOCK_SIZE {
            return Err(Error::corrupt(0, "table file shorter than its header"));
        }
        let (record_count, header_length, record_length, last_update, language_driver) = {
            let header = DbfFileHeader::from_bytes(&header_buf)?;
            (
                header.record_count() as usize,
                header.header_length() as usize,
                header.record_length() as usize,
                header.last_update(),
                header.language_driver(),
            )
        };
        if record_length == 0 {
            return Err(Error::corrupt(10, "record length of zero"));
        }
        if header_length < MIN_HEADER_LENGTH {
            return Err(Error::corrupt(
                8,
                format!("header length {header_length} below minimum {MIN_HEADER_LENGTH}"),
            ));
        }

        let mut raw_header = vec![0u8; header_length - DBF_BLOCK_SIZE];
        if file.read_fully(&mut raw_header)? != raw_header.len() {
            return Err(Error::corrupt(
                DBF_BLOCK_SIZE as u64,
                "descriptor block shorter than the header declares",
            ));
        }

        let declared_fields = (header_length - DBF_BLOCK_SIZE) / DBF_BLOCK_SIZE;
        let mut fields = Vec::with_capacity(declared_fields);
        let mut offset = 1;
        for i in 0..declared_fields {
            let chunk = &raw_header[i * DBF_BLOCK_SIZE..][..DBF_BLOCK_SIZE];
            if chunk[0] == DBF_HEADER_TERMINATOR {
                break;
            }
            let at = (DBF_BLOCK_SIZE + i * DBF_BLOCK_SIZE) as u64;
            let descr = DbfFieldDescriptor::from_bytes(chunk, at)?;
            fields.push(FieldDescr {
                name: descr.name().to_string(),
                tag: descr.type_tag(),
                width: descr.width(),
                decimals: descr.decimals(),
                offset,
            });
            offset += descr.width();
        }
        if offset > record_length {
            return Err(Error::corrupt(
                10,
                format!("field widths total {offset} but records are {record_length} bytes"),
            ));
        }

        let code_page = read_code_page(vfs.as_ref(), &base, language_driver);

        let mut store = DbfStore {
            vfs,
            file,
            access,
            record_count,
            header_length,
            record_length,
            name_index: HashMap::new(),
            fields,
            raw_header,
            record_buf: Vec::new(),
            current_record: None,
            record_modified: false,
            work_buf: Vec::new(),
            last_update,
            language_driver,
            code_page,
            header_pending: false,
            header_dirty: false,
            write_eof_char: true,
            requires_seek: true,
        };
        store.rebuild_name_index();
        Ok(store)
    }

    /// Creates a new, empty table with no fields.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(Box::new(StdVfs), path.as_ref(), None)
    }

    /// Creates a new table, recording a code page. A hint of the form
    /// `LDID/n` becomes the header's language driver byte; any other hint
    /// is written verbatim into a sibling `.cpg` file.
    pub fn create_with(
        vfs: Box<dyn Vfs>,
        path: &Path,
        code_page: Option<&str>,
    ) -> Result<Self> {
        let base = base_path(path);
        let file = vfs.open(&base.with_extension("dbf"), OpenMode::Create)?;

        let mut language_driver = 0u8;
        let mut resolved = None;
        if let Some(hint) = code_page {
            if let Some(n) = hint.strip_prefix("LDID/") {
                language_driver = n.parse().unwrap_or(0);
            } else {
                let mut cpg = vfs.open(&base.with_extension("cpg"), OpenMode::Create)?;
                cpg.write(hint.as_bytes())?;
                cpg.flush()?;
            }
            resolved = Some(hint.to_string());
        }

        Ok(DbfStore {
            vfs,
            file,
            access: Access::Update,
            record_count: 0,
            header_length: MIN_HEADER_LENGTH,
            record_length: 1,
            fields: Vec::new(),
            name_index: HashMap::new(),
            raw_header: vec![DBF_HEADER_TERMINATOR],
            record_buf: Vec::new(),
            current_record: None,
            record_modified: false,
            work_buf: Vec::new(),
            last_update: CREATE_DATE,
            language_driver,
            code_page: resolved,
            header_pending: true,
            header_dirty: false,
            write_eof_char: true,
            requires_seek: true,
        })
    }

    /// Creates an empty table at `path` with this table's exact schema.
    pub fn clone_schema(&self, path: impl AsRef<Path>) -> Result<Self> {
        let base = base_path(path.as_ref());
        let file = StdVfs.open(&base.with_extension("dbf"), OpenMode::Create)?;
        let mut clone = DbfStore {
            vfs: Box::new(StdVfs),
            file,
            access: Access::Update,
            record_count: 0,
            header_length: self.header_length,
            record_length: self.record_length,
            fields: self.fields.clone(),
            name_index: self.name_index.clone(),
            raw_header: self.raw_header.clone(),
            record_buf: Vec::new(),
            current_record: None,
            record_modified: false,
            work_buf: Vec::new(),
            last_update: self.last_update,
            language_driver: self.language_driver,
            code_page: self.code_page.clone(),
            header_pending: true,
            header_dirty: false,
            write_eof_char: self.write_eof_char,
            requires_seek: true,
        };
        clone.write_header()?;
        Ok(clone)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Name, logical type, width and decimal count of one field.
    pub fn field_info(&self, field: usize) -> Result<(&str, FieldType, usize, u8)> {
        let f = self.field(field)?;
        Ok((f.name.as_str(), f.field_type(), f.width, f.decimals))
    }

    /// Case-insensitive field lookup by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.name_index.get(&name.to_ascii_uppercase()).copied()
    }

    /// Raw single-character type tag as stored on disk.
    pub fn native_field_type(&self, field: usize) -> Result<u8> {
        Ok(self.field(field)?.tag)
    }

    /// Resolved character-encoding name, if any.
    pub fn code_page(&self) -> Option<&str> {
        self.code_page.as_deref()
    }

    pub fn last_modified_date(&self) -> (u16, u8, u8) {
        self.last_update
    }

    pub fn set_last_modified_date(&mut self, year: u16, month: u8, day: u8) {
        self.last_update = (year, month, day);
        self.header_dirty = true;
    }

    /// Governs the trailing 0x1a marker some consumers expect.
    pub fn set_write_end_of_file_char(&mut self, write: bool) {
        self.write_eof_char = write;
    }

    // ---- record cache ----

    pub(crate) fn record_offset(&self, record: usize) -> u64 {
        (self.header_length + record * self.record_length) as u64
    }

    /// Writes the resident record back if it was modified.
    pub(crate) fn flush_record(&mut self) -> Result<()> {
        let Some(record) = self.current_record else {
            return Ok(());
        };
        if !self.record_modified {
            return Ok(());
        }
        let target = self.record_offset(record);
        if self.requires_seek || self.file.tell()? != target {
            self.file.seek(SeekFrom::Start(target))?;
        }
        self.file.write(&self.record_buf)?;
        self.requires_seek = false;
        if self.write_eof_char && record + 1 == self.record_count {
            self.file.write(&[DBF_EOF_CHAR])?;
            self.requires_seek = true;
        }
        self.record_modified = false;
        self.header_dirty = true;
        Ok(())
    }

    /// Makes `record` resident, flushing any dirty buffer first.
    pub(crate) fn load_record(&mut self, record: usize) -> Result<()> {
        if self.current_record == Some(record) {
            return Ok(());
        }
        self.flush_record()?;
        let offset = self.record_offset(record);
        self.file.seek(SeekFrom::Start(offset))?;
        self.record_buf.resize(self.record_length, 0);
        if self.file.read_fully(&mut self.record_buf)? != self.record_length {
            return Err(Error::corrupt(
                offset,
                format!("record {record} truncated"),
            ));
        }
        self.current_record = Some(record);
        // mixed read/write access always reseeks
        self.requires_seek = true;
        Ok(())
    }

    /// Ensures `record` is resident and writable. Writing one past the
    /// last record appends a fresh blank record.
    pub(crate) fn prepare_record(&mut self, record: usize) -> Result<()> {
        if self.access != Access::Update {
            return Err(Error::usage("store is open read-only"));
        }
        if self.header_pending {
            self.write_header()?;
        }
        if record > self.record_count {
            return Err(Error::usage(format!(
                "record {record} past append position {}",
                self.record_count
            )));
        }
        if record == self.record_count {
            self.flush_record()?;
            self.record_buf.clear();
            self.record_buf.resize(self.record_length, b' ');
            self.current_record = Some(record);
            self.record_count += 1;
            self.record_modified = true;
            self.header_dirty = true;
            Ok(())
        } else {
            self.load_record(record)
        }
    }

    // ---- attribute reads ----

    fn field(&self, field: usize) -> Result<&FieldDescr> {
        self.fields.get(field).ok_or_else(|| {
            Error::usage(format!(
                "field index {field} out of range 0..{}",
                self.fields.len()
            ))
        })
    }

    /// Copies the field's fixed-width slot into the work buffer.
    fn extract_field(&mut self, record: usize, field: usize) -> Result<()> {
        if record >= self.record_count {
            return Err(Error::usage(format!(
                "record index {record} out of range 0..{}",
                self.record_count
            )));
        }
        let f = self.field(field)?;
        let (offset, width) = (f.offset, f.width);
        self.load_record(record)?;
        self.work_buf.clear();
        self.work_buf
            .extend_from_slice(&self.record_buf[offset..offset + width]);
        Ok(())
    }

    /// Field value with leading and trailing spaces trimmed.
    pub fn read_string(&mut self, record: usize, field: usize) -> Result<String> {
        self.extract_field(record, field)?;
        let text = String::from_utf8_lossy(&self.work_buf);
        Ok(text.trim_matches([' ', '\0']).to_string())
    }

    pub fn read_double(&mut self, record: usize, field: usize) -> Result<f64> {
        let tag = self.field(field)?.tag;
        self.extract_field(record, field)?;
        if is_value_null(tag, &self.work_buf) {
            return Ok(0.0);
        }
        let text = String::from_utf8_lossy(&self.work_buf);
        Ok(self.vfs.parse_double(&text))
    }

    pub fn read_int(&mut self, record: usize, field: usize) -> Result<i32> {
        Ok(self.read_double(record, field)? as i32)
    }

    /// `None` for the NULL convention or any unrecognized byte.
    pub fn read_logical(&mut self, record: usize, field: usize) -> Result<Option<bool>> {
        self.extract_field(record, field)?;
        Ok(match self.work_buf.first() {
            Some(b'T' | b't' | b'Y' | b'y') => Some(true),
            Some(b'F' | b'f' | b'N' | b'n') => Some(false),
            _ => None,
        })
    }

    /// Whether the stored value matches its type's NULL convention.
    pub fn is_null(&mut self, record: usize, field: usize) -> Result<bool> {
        let tag = self.field(field)?.tag;
        self.extract_field(record, field)?;
        if tag == b'C' {
            let trimmed: Vec<u8> = self
                .work_buf
                .iter()
                .copied()
                .filter(|&b| b != b' ' && b != 0)
                .collect();
            return Ok(trimmed.is_empty());
        }
        Ok(is_value_null(tag, &self.work_buf))
    }

    /// Deletion flag of one record.
    pub fn is_record_deleted(&mut self, record: usize) -> Result<bool> {
        if record >= self.record_count {
            return Err(Error::usage(format!(
                "record index {record} out of range 0..{}",
                self.record_count
            )));
        }
        self.load_record(record)?;
        Ok(self.record_buf.first() == Some(&b'*'))
    }

    /// Marks or unmarks a record as deleted without touching its fields.
    pub fn set_record_deleted(&mut self, record: usize, deleted: bool) -> Result<()> {
        if record >= self.record_count {
            return Err(Error::usage(format!(
                "record index {record} out of range 0..{}",
                self.record_count
            )));
        }
        if self.access != Access::Update {
            return Err(Error::usage("store is open read-only"));
        }
        self.load_record(record)?;
        self.record_buf[0] = if deleted { b'*' } else { b' ' };
        self.record_modified = true;
        Ok(())
    }

    /// Raw fixed-width record bytes, deletion flag included.
    pub fn read_tuple(&mut self, record: usize) -> Result<&[u8]> {
        if record >= self.record_count {
            return Err(Error::usage(format!(
                "record index {record} out of range 0..{}",
                self.record_count
            )));
        }
        self.load_record(record)?;
        Ok(&self.record_buf)
    }

    /// Overwrites a record's raw bytes. Shorter input leaves the tail of
    /// the record unchanged.
    pub fn write_tuple(&mut self, record: usize, tuple: &[u8]) -> Result<()> {
        self.prepare_record(record)?;
        let take = tuple.len().min(self.record_length);
        self.record_buf[..take].copy_from_slice(&tuple[..take]);
        self.record_modified = true;
        Ok(())
    }

    // ---- attribute writes ----

    fn write_formatted(
        &mut self,
        record: usize,
        field: usize,
        text: &str,
        right_justify: bool,
    ) -> Result<WriteOutcome> {
        let f = self.field(field)?;
        let (offset, width) = (f.offset, f.width);
        self.prepare_record(record)?;

        let bytes = text.as_bytes();
        let slot = &mut self.record_buf[offset..offset + width];
        let outcome = if bytes.len() > width {
            slot.copy_from_slice(&bytes[..width]);
            WriteOutcome::Truncated
        } else {
            let pad = width - bytes.len();
            if right_justify {
                slot[..pad].fill(b' ');
                slot[pad..].copy_from_slice(bytes);
            } else {
                slot[..bytes.len()].copy_from_slice(bytes);
                slot[bytes.len()..].fill(b' ');
            }
            WriteOutcome::Complete
        };
        self.record_modified = true;
        Ok(outcome)
    }

    /// Left-justified, space-padded; over-width input is truncated and
    /// reported.
    pub fn write_string(
        &mut self,
        record: usize,
        field: usize,
        value: &str,
    ) -> Result<WriteOutcome> {
        self.write_formatted(record, field, value, false)
    }

    /// Fixed-point, right-justified in the field's width and decimals.
    pub fn write_double(
        &mut self,
        record: usize,
        field: usize,
        value: f64,
    ) -> Result<WriteOutcome> {
        let f = self.field(field)?;
        let text = format!("{value:.prec$}", prec = f.decimals as usize);
        self.write_formatted(record, field, &text, true)
    }

    pub fn write_int(
        &mut self,
        record: usize,
        field: usize,
        value: i32,
    ) -> Result<WriteOutcome> {
        self.write_formatted(record, field, &value.to_string(), true)
    }

    /// Stores `T` or `F`. The field must be logical.
    pub fn write_logical(&mut self, record: usize, field: usize, value: bool) -> Result<()> {
        if self.field(field)?.tag != b'L' {
            return Err(Error::usage(format!(
                "field {field} is not a logical field"
            )));
        }
        let outcome =
            self.write_formatted(record, field, if value { "T" } else { "F" }, false)?;
        debug_assert_eq!(outcome, WriteOutcome::Complete);
        Ok(())
    }

    /// Stores a `YYYYMMDD` date.
    pub fn write_date(
        &mut self,
        record: usize,
        field: usize,
        year: u16,
        month: u8,
        day: u8,
    ) -> Result<WriteOutcome> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) || year > 9999 {
            return Err(Error::usage(format!(
                "invalid date {year:04}-{month:02}-{day:02}"
            )));
        }
        let text = format!("{year:04}{month:02}{day:02}");
        self.write_formatted(record, field, &text, false)
    }

    /// Fills the field with its type's NULL convention.
    pub fn write_null(&mut self, record: usize, field: usize) -> Result<()> {
        let f = self.field(field)?;
        let (offset, width, fill) = (f.offset, f.width, null_fill(f.tag));
        self.prepare_record(record)?;
        self.record_buf[offset..offset + width].fill(fill);
        self.record_modified = true;
        Ok(())
    }

    // ---- header lifecycle ----

    pub(crate) fn rebuild_name_index(&mut self) {
        self.name_index.clear();
        for (i, f) in self.fields.iter().enumerate() {
            self.name_index.insert(f.name.to_ascii_uppercase(), i);
        }
    }

    /// Re-stamps the 0x1a marker at the data end after a schema rewrite
    /// moved it.
    pub(crate) fn rewrite_eof_marker(&mut self) -> Result<()> {
        if !self.write_eof_char || self.record_count == 0 {
            return Ok(());
        }
        self.file
            .seek(SeekFrom::Start(self.record_offset(self.record_count)))?;
        self.file.write(&[DBF_EOF_CHAR])?;
        self.requires_seek = true;
        Ok(())
    }

    /// Writes the 32-byte header and the descriptor block.
    pub(crate) fn write_header(&mut self) -> Result<()> {
        let header = DbfFileHeader::new(
            self.last_update,
            self.record_count as u32,
            self.header_length as u16,
            self.record_length as u16,
            self.language_driver,
        );
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write(header.as_bytes())?;
        self.file.write(&self.raw_header)?;
        self.requires_seek = true;
        self.header_pending = false;
        self.header_dirty = false;
        Ok(())
    }

    /// Flushes the record cache and a dirty header.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_record()?;
        if self.header_pending || self.header_dirty {
            self.write_header()?;
        }
        self.file.flush()
    }

    /// Flushes and drops the store.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    /// Clamps a requested field width into the descriptor's legal range.
    pub(crate) fn clamp_width(name: &str, width: usize) -> Result<usize> {
        if width == 0 {
            return Err(Error::schema(format!("field {name} has zero width")));
        }
        if width > MAX_FIELD_WIDTH {
            warn!(name, width, "field width clamped to {MAX_FIELD_WIDTH}");
            return Ok(MAX_FIELD_WIDTH);
        }
        Ok(width)
    }
}

impl Drop for DbfStore {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

fn read_code_page(vfs: &dyn Vfs, base: &Path, language_driver: u8) -> Option<String> {
    if let Ok(mut cpg) = open_with_fallback(vfs, base, "cpg", OpenMode::Read) {
        let mut buf = [0u8; 255];
        if let Ok(n) = cpg.read_fully(&mut buf) {
            let text = String::from_utf8_lossy(&buf[..n]);
            let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    if language_driver != 0 {
        return Some(format!("LDID/{language_driver}"));
    }
    None
}
