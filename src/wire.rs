//! # On-Disk Structure Definitions
//!
//! Fixed-layout, zerocopy-based structs for every header and fixed record
//! this codec reads or writes. The format predates a single-endianness
//! convention: header and record-frame integers are big-endian, version and
//! shape-type fields plus all coordinates are little-endian, and the
//! attribute table is little-endian throughout. Each field states its own
//! byte order through the zerocopy wrapper types instead of a runtime
//! byte-swap pass.
//!
//! ## Structures
//!
//! | Struct               | File        | Size | Contents                          |
//! |----------------------|-------------|------|-----------------------------------|
//! | `ShpFileHeader`      | .shp / .shx | 100  | magic, length, type, bounds       |
//! | `ShpRecordHeader`    | .shp        | 8    | 1-based ordinal, content length   |
//! | `ShxRecordEntry`     | .shx        | 8    | record offset, content length     |
//! | `DbfFileHeader`      | .dbf        | 32   | date, counts, lengths, LDID       |
//! | `DbfFieldDescriptor` | .dbf        | 32   | name, type tag, width, decimals   |
//!
//! Lengths and offsets in the geometry pair are counted in 16-bit words, a
//! convention this module keeps at the wire boundary only; everything above
//! it speaks bytes.
//!
//! ## Geometry File Shape
//!
//! ```text
//! +--------------------+
//! | ShpFileHeader 100B |
//! +--------------------+
//! | ShpRecordHeader 8B |  per record, followed by
//! | record content     |  content_words * 2 bytes
//! +--------------------+
//! | ...                |
//! +--------------------+
//! ```
//!
//! The index file carries the same 100-byte header followed by one
//! `ShxRecordEntry` per record.
//!
//! ## Zerocopy Safety
//!
//! All structs derive `FromBytes`, `IntoBytes`, `Immutable`, `KnownLayout`
//! and `Unaligned`, so they can be read out of or written into unaligned
//! byte buffers without copies. Sizes are verified at compile time.

use zerocopy::big_endian::U32 as U32Be;
use zerocopy::little_endian::{F64, I32, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Error, Result};

/// First four bytes of both geometry files, big-endian 9994.
pub const SHP_MAGIC: u32 = 9994;
/// Format version stored little-endian at byte 28.
pub const SHP_VERSION: u32 = 1000;
/// Size of [`ShpFileHeader`] on disk.
pub const SHP_HEADER_SIZE: usize = 100;
/// Size of [`ShpRecordHeader`] and [`ShxRecordEntry`] on disk.
pub const SHP_RECORD_HEADER_SIZE: usize = 8;

/// Version byte of an attribute table without memo file.
pub const DBF_VERSION: u8 = 0x03;
/// Size of [`DbfFileHeader`] and [`DbfFieldDescriptor`] on disk.
pub const DBF_BLOCK_SIZE: usize = 32;
/// Byte closing the field-descriptor block.
pub const DBF_HEADER_TERMINATOR: u8 = 0x0d;
/// Optional trailing end-of-file marker.
pub const DBF_EOF_CHAR: u8 = 0x1a;

/// 100-byte header shared by the primary and index geometry files.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ShpFileHeader {
    magic: U32Be,
    unused: [u8; 20],
    file_length_words: U32Be,
    version: U32,
    shape_type: I32,
    x_min: F64,
    y_min: F64,
    x_max: F64,
    y_max: F64,
    z_min: F64,
    z_max: F64,
    m_min: F64,
    m_max: F64,
}

const _: () = assert!(std::mem::size_of::<ShpFileHeader>() == SHP_HEADER_SIZE);

impl ShpFileHeader {
    pub fn new(shape_type: i32) -> Self {
        Self {
            magic: U32Be::new(SHP_MAGIC),
            unused: [0u8; 20],
            file_length_words: U32Be::new((SHP_HEADER_SIZE / 2) as u32),
            version: U32::new(SHP_VERSION),
            shape_type: I32::new(shape_type),
            x_min: F64::new(0.0),
            y_min: F64::new(0.0),
            x_max: F64::new(0.0),
            y_max: F64::new(0.0),
            z_min: F64::new(0.0),
            z_max: F64::new(0.0),
            m_min: F64::new(0.0),
            m_max: F64::new(0.0),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        if bytes.len() < SHP_HEADER_SIZE {
            return Err(Error::corrupt(
                0,
                format!(
                    "file header truncated: {} of {} bytes",
                    bytes.len(),
                    SHP_HEADER_SIZE
                ),
            ));
        }
        let header = Self::ref_from_bytes(&bytes[..SHP_HEADER_SIZE])
            .map_err(|e| Error::corrupt(0, format!("unreadable file header: {e:?}")))?;
        if header.magic.get() != SHP_MAGIC {
            return Err(Error::corrupt(
                0,
                format!("bad magic {:#010x}", header.magic.get()),
            ));
        }
        Ok(header)
    }

    /// Declared file length in bytes. The on-disk word count is masked to
    /// 31 bits before doubling, matching files written with the sign bit
    /// accidentally set.
    pub fn file_length_bytes(&self) -> u64 {
        2 * (self.file_length_words.get() & 0x7fff_ffff) as u64
    }

    pub fn set_file_length_bytes(&mut self, bytes: u64) {
        self.file_length_words = U32Be::new((bytes / 2) as u32);
    }

    pub fn shape_type(&self) -> i32 {
        self.shape_type.get()
    }

    pub fn bounds(&self) -> [f64; 8] {
        [
            self.x_min.get(),
            self.y_min.get(),
            self.x_max.get(),
            self.y_max.get(),
            self.z_min.get(),
            self.z_max.get(),
            self.m_min.get(),
            self.m_max.get(),
        ]
    }

    /// Bounds order: x min, y min, x max, y max, z min, z max, m min, m max.
    pub fn set_bounds(&mut self, b: [f64; 8]) {
        self.x_min = F64::new(b[0]);
        self.y_min = F64::new(b[1]);
        self.x_max = F64::new(b[2]);
        self.y_max = F64::new(b[3]);
        self.z_min = F64::new(b[4]);
        self.z_max = F64::new(b[5]);
        self.m_min = F64::new(b[6]);
        self.m_max = F64::new(b[7]);
    }
}

/// 8-byte frame preceding each record in the primary geometry file.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ShpRecordHeader {
    record_number: U32Be,
    content_words: U32Be,
}

const _: () = assert!(std::mem::size_of::<ShpRecordHeader>() == SHP_RECORD_HEADER_SIZE);

impl ShpRecordHeader {
    pub fn new(ordinal: usize, content_bytes: usize) -> Self {
        Self {
            record_number: U32Be::new(ordinal as u32 + 1),
            content_words: U32Be::new((content_bytes / 2) as u32),
        }
    }

    pub fn from_bytes(bytes: &[u8], at: u64) -> Result<&Self> {
        if bytes.len() < SHP_RECORD_HEADER_SIZE {
            return Err(Error::corrupt(at, "record header truncated"));
        }
        Self::ref_from_bytes(&bytes[..SHP_RECORD_HEADER_SIZE])
            .map_err(|e| Error::corrupt(at, format!("unreadable record header: {e:?}")))
    }

    /// On-disk ordinal, 1-based.
    pub fn record_number(&self) -> u32 {
        self.record_number.get()
    }

    pub fn content_bytes(&self) -> u64 {
        self.content_words.get() as u64 * 2
    }
}

/// 8-byte index entry: where a record sits in the primary file and how
/// long its content is, both in 16-bit words.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ShxRecordEntry {
    offset_words: U32Be,
    content_words: U32Be,
}

const _: () = assert!(std::mem::size_of::<ShxRecordEntry>() == SHP_RECORD_HEADER_SIZE);

impl ShxRecordEntry {
    pub fn new(offset_bytes: u64, content_bytes: u64) -> Self {
        Self {
            offset_words: U32Be::new((offset_bytes / 2) as u32),
            content_words: U32Be::new((content_bytes / 2) as u32),
        }
    }

    pub fn offset_bytes(&self) -> u64 {
        self.offset_words.get() as u64 * 2
    }

    pub fn content_bytes(&self) -> u64 {
        self.content_words.get() as u64 * 2
    }
}

/// 32-byte attribute table header.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct DbfFileHeader {
    version: u8,
    year: u8,
    month: u8,
    day: u8,
    record_count: U32,
    header_length: U16,
    record_length: U16,
    reserved1: [u8; 17],
    language_driver: u8,
    reserved2: [u8; 2],
}

const _: () = assert!(std::mem::size_of::<DbfFileHeader>() == DBF_BLOCK_SIZE);

impl DbfFileHeader {
    pub fn new(
        (year, month, day): (u16, u8, u8),
        record_count: u32,
        header_length: u16,
        record_length: u16,
        language_driver: u8,
    ) -> Self {
        Self {
            version: DBF_VERSION,
            year: year.saturating_sub(1900).min(255) as u8,
            month,
            day,
            record_count: U32::new(record_count),
            header_length: U16::new(header_length),
            record_length: U16::new(record_length),
            reserved1: [0u8; 17],
            language_driver,
            reserved2: [0u8; 2],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        if bytes.len() < DBF_BLOCK_SIZE {
            return Err(Error::corrupt(
                0,
                format!(
                    "table header truncated: {} of {} bytes",
                    bytes.len(),
                    DBF_BLOCK_SIZE
                ),
            ));
        }
        Self::ref_from_bytes(&bytes[..DBF_BLOCK_SIZE])
            .map_err(|e| Error::corrupt(0, format!("unreadable table header: {e:?}")))
    }

    /// Last-update date, year as full Gregorian year.
    pub fn last_update(&self) -> (u16, u8, u8) {
        (self.year as u16 + 1900, self.month, self.day)
    }

    pub fn record_count(&self) -> u32 {
        self.record_count.get()
    }

    pub fn header_length(&self) -> u16 {
        self.header_length.get()
    }

    pub fn record_length(&self) -> u16 {
        self.record_length.get()
    }

    pub fn language_driver(&self) -> u8 {
        self.language_driver
    }
}

/// 32-byte field descriptor, one per column after the table header.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct DbfFieldDescriptor {
    name: [u8; 11],
    type_tag: u8,
    reserved1: [u8; 4],
    width: u8,
    decimals: u8,
    reserved2: [u8; 14],
}

const _: () = assert!(std::mem::size_of::<DbfFieldDescriptor>() == DBF_BLOCK_SIZE);

impl DbfFieldDescriptor {
    pub fn new(name: &str, type_tag: u8, width: u8, decimals: u8) -> Self {
        let mut name_bytes = [0u8; 11];
        let take = name.len().min(10);
        name_bytes[..take].copy_from_slice(&name.as_bytes()[..take]);
        Self {
            name: name_bytes,
            type_tag,
            reserved1: [0u8; 4],
            width,
            decimals,
            reserved2: [0u8; 14],
        }
    }

    pub fn from_bytes(bytes: &[u8], at: u64) -> Result<&Self> {
        if bytes.len() < DBF_BLOCK_SIZE {
            return Err(Error::corrupt(at, "field descriptor truncated"));
        }
        Self::ref_from_bytes(&bytes[..DBF_BLOCK_SIZE])
            .map_err(|e| Error::corrupt(at, format!("unreadable field descriptor: {e:?}")))
    }

    /// Field name with NUL padding stripped.
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(11);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    pub fn type_tag(&self) -> u8 {
        self.type_tag
    }

    /// Field byte width. Character fields historically spread a 16-bit
    /// width across the width and decimals bytes; widths above the sane
    /// maximum are capped rather than rejected.
    pub fn width(&self) -> usize {
        if self.type_tag == b'C' && self.decimals > 0 {
            let wide = u16::from_le_bytes([self.width, self.decimals]) as usize;
            wide.min(u8::MAX as usize * 2)
        } else {
            self.width as usize
        }
    }

    pub fn decimals(&self) -> u8 {
        if self.type_tag == b'C' {
            0
        } else {
            self.decimals
        }
    }
}
