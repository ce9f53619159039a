//! # Attribute Store
//!
//! The tabular side of the codec: a `.dbf` file of fixed-width records,
//! one per feature, preceded by a field-descriptor table. [`DbfStore`]
//! owns the file, a single-record write-back cache, and the schema
//! mutation operations that rewrite the whole data region.
//!
//! Field values are stored as formatted text in fixed-width slots. NULL is
//! a per-type byte convention, not a marker: numeric slots full of `*` or
//! blanks, date slots of zeros, a `?` logical, an empty string.

mod schema;
mod store;

pub use store::{DbfStore, WriteOutcome};

/// Logical field type, derived from the native type tag, width and
/// decimal count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Double,
    Logical,
    Date,
    /// A native tag this codec does not interpret; the raw bytes are still
    /// readable as a string.
    Invalid,
}

impl FieldType {
    /// Maps a native tag to the logical type. Numeric fields wide enough
    /// to overflow an `i32`, or with decimals, read as doubles.
    pub(crate) fn from_native(tag: u8, width: usize, decimals: u8) -> Self {
        match tag {
            b'C' => FieldType::String,
            b'D' => FieldType::Date,
            b'L' => FieldType::Logical,
            b'N' | b'F' => {
                if decimals > 0 || width >= 10 {
                    FieldType::Double
                } else {
                    FieldType::Integer
                }
            }
            _ => FieldType::Invalid,
        }
    }

    /// The native tag used when this codec creates a field of this type.
    pub(crate) fn native_tag(self) -> Option<u8> {
        match self {
            FieldType::String => Some(b'C'),
            FieldType::Integer | FieldType::Double => Some(b'N'),
            FieldType::Logical => Some(b'L'),
            FieldType::Date => Some(b'D'),
            FieldType::Invalid => None,
        }
    }
}

/// One column of the attribute table.
#[derive(Debug, Clone)]
pub struct FieldDescr {
    pub name: String,
    /// Native single-character type tag as stored on disk.
    pub tag: u8,
    pub width: usize,
    pub decimals: u8,
    /// Byte offset of this field within a record. Offset zero is the
    /// deletion flag, so the first field starts at one.
    pub offset: usize,
}

impl FieldDescr {
    pub fn field_type(&self) -> FieldType {
        FieldType::from_native(self.tag, self.width, self.decimals)
    }
}

/// The byte a NULL value of the given native type fills its slot with.
pub(crate) fn null_fill(tag: u8) -> u8 {
    match tag {
        b'N' | b'F' => b'*',
        b'D' => b'0',
        b'L' => b'?',
        _ => b' ',
    }
}

/// Whether a raw field slot holds the NULL convention for its type.
pub(crate) fn is_value_null(tag: u8, raw: &[u8]) -> bool {
    match tag {
        b'N' | b'F' => raw.iter().all(|&b| b == b'*' || b == b' '),
        b'D' => {
            raw.starts_with(b"00000000") || raw == b" " || raw == b"0"
        }
        b'L' => raw.first() == Some(&b'?'),
        _ => raw.iter().all(|&b| b == b' ' || b == 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_type_depends_on_width_and_decimals() {
        assert_eq!(FieldType::from_native(b'N', 5, 0), FieldType::Integer);
        assert_eq!(FieldType::from_native(b'N', 5, 2), FieldType::Double);
        assert_eq!(FieldType::from_native(b'F', 12, 0), FieldType::Double);
        assert_eq!(FieldType::from_native(b'C', 20, 0), FieldType::String);
        assert_eq!(FieldType::from_native(b'X', 4, 0), FieldType::Invalid);
    }

    #[test]
    fn null_conventions_per_type() {
        assert!(is_value_null(b'N', b"****"));
        assert!(is_value_null(b'N', b"    "));
        assert!(!is_value_null(b'N', b"  42"));
        assert!(is_value_null(b'D', b"00000000"));
        assert!(!is_value_null(b'D', b"20240315"));
        assert!(is_value_null(b'L', b"?"));
        assert!(!is_value_null(b'L', b"T"));
        assert!(is_value_null(b'C', b"     "));
        assert!(!is_value_null(b'C', b"  x  "));
    }

    #[test]
    fn fill_characters_per_type() {
        assert_eq!(null_fill(b'N'), b'*');
        assert_eq!(null_fill(b'F'), b'*');
        assert_eq!(null_fill(b'D'), b'0');
        assert_eq!(null_fill(b'L'), b'?');
        assert_eq!(null_fill(b'C'), b' ');
    }
}
