//! End-to-end geometry store tests: create, append, close, reopen, decode.

use eyre::Result;
use shapekit::{
    restore_index, Access, PartType, ShapeObject, ShapeStore, ShapeType,
};
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

fn store_path(name: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

#[test]
fn single_point_survives_reopen() -> Result<()> {
    let (_dir, path) = store_path("point");

    let mut store = ShapeStore::create(&path, ShapeType::Point)?;
    let point =
        ShapeObject::create(ShapeType::Point, &[], &[], &[1.0], &[2.0], None, None)?;
    assert_eq!(store.write_shape(&point, None)?, 0);
    store.close()?;

    let mut store = ShapeStore::open(&path, Access::ReadOnly)?;
    assert_eq!(store.shape_type(), ShapeType::Point);
    assert_eq!(store.record_count(), 1);

    let shape = store.read_shape(0)?;
    assert_eq!(shape.shape_type, ShapeType::Point);
    assert_eq!(shape.vertex_count(), 1);
    assert_eq!((shape.x[0], shape.y[0]), (1.0, 2.0));
    assert_eq!(shape.bounds.x_min, 1.0);
    assert_eq!(shape.bounds.x_max, 1.0);
    assert_eq!(shape.bounds.y_min, 2.0);
    assert_eq!(shape.bounds.y_max, 2.0);
    Ok(())
}

#[test]
fn appended_records_all_decode_after_reopen() -> Result<()> {
    let (_dir, path) = store_path("many");
    let n = 100;

    let mut store = ShapeStore::create(&path, ShapeType::Arc)?;
    for i in 0..n {
        let t = i as f64;
        let arc = ShapeObject::simple(
            ShapeType::Arc,
            &[t, t + 1.0, t + 2.0],
            &[-t, -t - 1.0, -t - 2.0],
        )?;
        assert_eq!(store.write_shape(&arc, None)?, i);
    }
    store.close()?;

    let mut store = ShapeStore::open(&path, Access::ReadOnly)?;
    assert_eq!(store.record_count(), n);
    for i in 0..n {
        let shape = store.read_shape(i)?;
        assert_eq!(shape.vertex_count(), 3);
        assert_eq!(shape.x[0], i as f64);
        assert_eq!(shape.y[2], -(i as f64) - 2.0);
    }
    Ok(())
}

#[test]
fn polygon_z_with_measures_round_trips_through_disk() -> Result<()> {
    let (_dir, path) = store_path("terrain");

    let x = [0.0, 10.0, 10.0, 0.0, 0.0];
    let y = [0.0, 0.0, 10.0, 10.0, 0.0];
    let z = [1.0, 2.0, 3.0, 4.0, 1.0];
    let m = [0.1, 0.2, 0.3, 0.4, 0.1];
    let polygon = ShapeObject::create(
        ShapeType::PolygonZ,
        &[0],
        &[],
        &x,
        &y,
        Some(&z),
        Some(&m),
    )?;

    let mut store = ShapeStore::create(&path, ShapeType::PolygonZ)?;
    store.write_shape(&polygon, None)?;
    store.close()?;

    let mut store = ShapeStore::open(&path, Access::ReadOnly)?;
    let shape = store.read_shape(0)?;
    assert_eq!(shape.x, x.to_vec());
    assert_eq!(shape.y, y.to_vec());
    assert_eq!(shape.z, z.to_vec());
    assert_eq!(shape.m, m.to_vec());
    assert!(shape.has_measure);
    assert_eq!(shape.bounds.z_min, 1.0);
    assert_eq!(shape.bounds.z_max, 4.0);
    drop(shape);

    let b = store.bounds();
    assert_eq!(b.m_min, 0.1);
    assert_eq!(b.m_max, 0.4);
    Ok(())
}

#[test]
fn multipatch_part_types_survive_reopen() -> Result<()> {
    let (_dir, path) = store_path("patch");

    let patch = ShapeObject::create(
        ShapeType::MultiPatch,
        &[0, 4],
        &[PartType::TriangleStrip, PartType::OuterRing],
        &[0.0, 1.0, 0.0, 1.0, 5.0, 6.0, 6.0, 5.0],
        &[0.0, 0.0, 1.0, 1.0, 5.0, 5.0, 6.0, 5.0],
        Some(&[0.0; 8]),
        None,
    )?;

    let mut store = ShapeStore::create(&path, ShapeType::MultiPatch)?;
    store.write_shape(&patch, None)?;
    store.close()?;

    let mut store = ShapeStore::open(&path, Access::ReadOnly)?;
    let shape = store.read_shape(0)?;
    assert_eq!(
        shape.part_types.as_slice(),
        &[PartType::TriangleStrip, PartType::OuterRing]
    );
    assert_eq!(shape.part_starts.as_slice(), &[0, 4]);
    Ok(())
}

#[test]
fn bounds_cover_all_records_after_reopen() -> Result<()> {
    let (_dir, path) = store_path("bounds");

    let mut store = ShapeStore::create(&path, ShapeType::MultiPoint)?;
    let a = ShapeObject::create(
        ShapeType::MultiPoint,
        &[],
        &[],
        &[-5.0, 0.0],
        &[2.0, 3.0],
        None,
        None,
    )?;
    let b = ShapeObject::create(
        ShapeType::MultiPoint,
        &[],
        &[],
        &[7.0],
        &[-1.0],
        None,
        None,
    )?;
    store.write_shape(&a, None)?;
    store.write_shape(&b, None)?;
    store.close()?;

    let store = ShapeStore::open(&path, Access::ReadOnly)?;
    let bounds = store.bounds();
    assert_eq!(bounds.x_min, -5.0);
    assert_eq!(bounds.x_max, 7.0);
    assert_eq!(bounds.y_min, -1.0);
    assert_eq!(bounds.y_max, 3.0);
    Ok(())
}

mod restore {
    use super::*;

    #[test]
    fn regenerated_index_matches_primary_file() -> Result<()> {
        let (_dir, path) = store_path("lost");

        let mut store = ShapeStore::create(&path, ShapeType::Polygon)?;
        for i in 0..7 {
            let t = i as f64;
            let ring = ShapeObject::simple(
                ShapeType::Polygon,
                &[t, t + 1.0, t, t],
                &[t, t, t + 1.0, t],
            )?;
            store.write_shape(&ring, None)?;
        }
        store.close()?;

        std::fs::remove_file(path.with_extension("shx"))?;
        assert_eq!(restore_index(&path)?, 7);

        let mut store = ShapeStore::open(&path, Access::ReadOnly)?;
        assert_eq!(store.record_count(), 7);
        for i in 0..7 {
            let shape = store.read_shape(i)?;
            assert_eq!(shape.x[0], i as f64);
        }
        Ok(())
    }

    #[test]
    fn restore_then_restore_again_is_byte_identical() -> Result<()> {
        let (_dir, path) = store_path("twice");

        let mut store = ShapeStore::create(&path, ShapeType::Point)?;
        for i in 0..3 {
            let p = ShapeObject::create(
                ShapeType::Point,
                &[],
                &[],
                &[i as f64],
                &[i as f64],
                None,
                None,
            )?;
            store.write_shape(&p, None)?;
        }
        store.close()?;

        restore_index(&path)?;
        let first = std::fs::read(path.with_extension("shx"))?;
        restore_index(&path)?;
        let second = std::fs::read(path.with_extension("shx"))?;
        assert_eq!(first, second);
        Ok(())
    }
}

mod overwrite {
    use super::*;

    #[test]
    fn overwriting_a_record_keeps_its_neighbors() -> Result<()> {
        let (_dir, path) = store_path("edit");

        let mut store = ShapeStore::create(&path, ShapeType::Point)?;
        for i in 0..3 {
            let p = ShapeObject::create(
                ShapeType::Point,
                &[],
                &[],
                &[i as f64],
                &[0.0],
                None,
                None,
            )?;
            store.write_shape(&p, None)?;
        }

        let replacement =
            ShapeObject::create(ShapeType::Point, &[], &[], &[99.0], &[99.0], None, None)?;
        assert_eq!(store.write_shape(&replacement, Some(1))?, 1);
        store.close()?;

        let mut store = ShapeStore::open(&path, Access::ReadOnly)?;
        assert_eq!(store.record_count(), 3);
        assert_eq!(store.read_shape(0)?.x, vec![0.0]);
        assert_eq!(store.read_shape(1)?.x, vec![99.0]);
        assert_eq!(store.read_shape(2)?.x, vec![2.0]);
        Ok(())
    }

    #[test]
    fn explicit_ordinal_must_reference_an_existing_record() -> Result<()> {
        let (_dir, path) = store_path("oob");
        let mut store = ShapeStore::create(&path, ShapeType::Point)?;
        let p = ShapeObject::create(ShapeType::Point, &[], &[], &[0.0], &[0.0], None, None)?;
        assert!(store.write_shape(&p, Some(0)).is_err());
        store.write_shape(&p, None)?;
        assert!(store.write_shape(&p, Some(0)).is_ok());
        Ok(())
    }
}
