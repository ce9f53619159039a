//! End-to-end attribute table tests: schema definition, record IO, reopen.

use eyre::Result;
use shapekit::{Access, DbfStore, FieldType};
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

fn table_path(name: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

#[test]
fn fixed_width_strings_pad_to_field_width() -> Result<()> {
    let (_dir, path) = table_path("names");

    let mut table = DbfStore::create(&path)?;
    table.add_field("tag", FieldType::String, 5, 0)?;
    table.write_string(0, 0, "AB")?.ignore();
    table.close()?;

    let mut table = DbfStore::open(&path, Access::ReadOnly)?;
    assert_eq!(table.record_count(), 1);
    assert_eq!(table.read_string(0, 0)?, "AB");

    let raw = std::fs::read(path.with_extension("dbf"))?;
    let header_length = u16::from_le_bytes([raw[8], raw[9]]) as usize;
    // deletion flag, then "AB" padded to the declared width of 5
    assert_eq!(&raw[header_length..header_length + 6], b" AB   ");
    Ok(())
}

#[test]
fn numeric_fields_round_trip_with_declared_precision() -> Result<()> {
    let (_dir, path) = table_path("metrics");

    let mut table = DbfStore::create(&path)?;
    table.add_field("area", FieldType::Double, 12, 3)?;
    table.add_field("count", FieldType::Integer, 6, 0)?;
    table.write_double(0, 0, 1234.5)?.ignore();
    table.write_int(0, 1, -42)?.ignore();
    table.close()?;

    let mut table = DbfStore::open(&path, Access::ReadOnly)?;
    assert_eq!(table.read_double(0, 0)?, 1234.5);
    assert_eq!(table.read_int(0, 1)?, -42);
    assert_eq!(table.native_field_type(0)?, b'N');
    let (name, field_type, width, decimals) = table.field_info(0)?;
    assert_eq!(name, "area");
    assert_eq!(field_type, FieldType::Double);
    assert_eq!(width, 12);
    assert_eq!(decimals, 3);
    Ok(())
}

#[test]
fn record_count_matches_appends_after_reopen() -> Result<()> {
    let (_dir, path) = table_path("rows");
    let n = 50;

    let mut table = DbfStore::create(&path)?;
    table.add_field("id", FieldType::Integer, 8, 0)?;
    for i in 0..n {
        table.write_int(i, 0, i as i32)?.ignore();
    }
    table.close()?;

    let mut table = DbfStore::open(&path, Access::ReadOnly)?;
    assert_eq!(table.record_count(), n);
    for i in 0..n {
        assert_eq!(table.read_int(i, 0)?, i as i32);
    }
    Ok(())
}

#[test]
fn null_markers_round_trip_per_type() -> Result<()> {
    let (_dir, path) = table_path("nulls");

    let mut table = DbfStore::create(&path)?;
    table.add_field("label", FieldType::String, 8, 0)?;
    table.add_field("value", FieldType::Double, 10, 2)?;
    table.add_field("flag", FieldType::Logical, 1, 0)?;
    table.add_field("seen", FieldType::Date, 8, 0)?;
    for field in 0..4 {
        table.write_null(0, field)?;
    }
    table.close()?;

    let mut table = DbfStore::open(&path, Access::ReadOnly)?;
    for field in 0..4 {
        assert!(table.is_null(0, field)?);
    }
    assert_eq!(table.read_double(0, 1)?, 0.0);
    assert_eq!(table.read_logical(0, 2)?, None);
    Ok(())
}

#[test]
fn logical_and_date_values_round_trip() -> Result<()> {
    let (_dir, path) = table_path("typed");

    let mut table = DbfStore::create(&path)?;
    table.add_field("ok", FieldType::Logical, 1, 0)?;
    table.add_field("when", FieldType::Date, 8, 0)?;
    table.write_logical(0, 0, true)?;
    table.write_date(0, 1, 2024, 12, 31)?.ignore();
    table.write_logical(1, 0, false)?;
    table.close()?;

    let mut table = DbfStore::open(&path, Access::ReadOnly)?;
    assert_eq!(table.read_logical(0, 0)?, Some(true));
    assert_eq!(table.read_string(0, 1)?, "20241231");
    assert_eq!(table.read_logical(1, 0)?, Some(false));
    Ok(())
}

#[test]
fn truncation_is_reported_but_data_is_kept_to_width() -> Result<()> {
    let (_dir, path) = table_path("narrow");

    let mut table = DbfStore::create(&path)?;
    table.add_field("code", FieldType::String, 3, 0)?;
    let outcome = table.write_string(0, 0, "ABCDEF")?;
    assert!(outcome.is_truncated());
    assert_eq!(table.read_string(0, 0)?, "ABC");
    Ok(())
}

#[test]
fn deletion_flag_round_trips() -> Result<()> {
    let (_dir, path) = table_path("tombstone");

    let mut table = DbfStore::create(&path)?;
    table.add_field("id", FieldType::Integer, 4, 0)?;
    table.write_int(0, 0, 1)?.ignore();
    table.write_int(1, 0, 2)?.ignore();
    table.set_record_deleted(0, true)?;
    table.close()?;

    let mut table = DbfStore::open(&path, Access::ReadOnly)?;
    assert!(table.is_record_deleted(0)?);
    assert!(!table.is_record_deleted(1)?);
    assert_eq!(table.read_int(0, 0)?, 1);
    Ok(())
}

#[test]
fn field_lookup_is_case_insensitive() -> Result<()> {
    let (_dir, path) = table_path("lookup");

    let mut table = DbfStore::create(&path)?;
    table.add_field("Name", FieldType::String, 10, 0)?;
    table.add_field("Area", FieldType::Double, 12, 2)?;
    assert_eq!(table.field_index("name"), Some(0));
    assert_eq!(table.field_index("AREA"), Some(1));
    assert_eq!(table.field_index("missing"), None);
    Ok(())
}

#[test]
fn cloned_schema_starts_empty_with_same_fields() -> Result<()> {
    let (_dir, path) = table_path("proto");
    let copy = _dir.path().join("copy");

    let mut table = DbfStore::create(&path)?;
    table.add_field("id", FieldType::Integer, 8, 0)?;
    table.add_field("name", FieldType::String, 20, 0)?;
    table.write_int(0, 0, 7)?.ignore();

    let mut clone = table.clone_schema(&copy)?;
    assert_eq!(clone.field_count(), 2);
    assert_eq!(clone.record_count(), 0);
    clone.write_int(0, 0, 9)?.ignore();
    clone.close()?;
    table.close()?;

    let mut clone = DbfStore::open(&copy, Access::ReadOnly)?;
    assert_eq!(clone.read_int(0, 0)?, 9);
    Ok(())
}

mod tuples {
    use super::*;

    #[test]
    fn raw_tuple_copy_preserves_every_byte() -> Result<()> {
        let (_dir, path) = table_path("raw");

        let mut table = DbfStore::create(&path)?;
        table.add_field("a", FieldType::String, 4, 0)?;
        table.add_field("b", FieldType::Integer, 6, 0)?;
        table.write_string(0, 0, "ab")?.ignore();
        table.write_int(0, 1, 33)?.ignore();

        let tuple = table.read_tuple(0)?.to_vec();
        table.write_tuple(1, &tuple)?;
        table.close()?;

        let mut table = DbfStore::open(&path, Access::ReadOnly)?;
        assert_eq!(table.read_string(1, 0)?, "ab");
        assert_eq!(table.read_int(1, 1)?, 33);
        Ok(())
    }
}
