//! # shpinfo CLI Entry Point
//!
//! Dumps the contents of a shapefile set: geometry header, per-record
//! geometry, and the attribute table.
//!
//! ## Usage
//!
//! ```bash
//! # Summarize headers and counts
//! shpinfo ./lakes
//!
//! # Dump every geometry record
//! shpinfo --shapes ./lakes
//!
//! # Dump the attribute table
//! shpinfo --attributes ./lakes
//!
//! # Rebuild a missing or corrupt .shx index
//! shpinfo --restore ./lakes
//! ```

use eyre::{bail, Result, WrapErr};
use shapekit::{restore_index, Access, DbfStore, ShapeStore};
use std::env;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let mut dump_shapes = false;
    let mut dump_attributes = false;
    let mut restore = false;
    let mut path = None;

    for arg in &args[1..] {
        match arg.as_str() {
            "--shapes" | "-s" => dump_shapes = true,
            "--attributes" | "-a" => dump_attributes = true,
            "--restore" | "-r" => restore = true,
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("shpinfo {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other if other.starts_with('-') => bail!("unknown option: {other}"),
            other => path = Some(other.to_string()),
        }
    }
    let Some(path) = path else {
        bail!("no shapefile path given; see --help");
    };

    if restore {
        let records = restore_index(&path)
            .wrap_err_with(|| format!("failed to restore index for {path}"))?;
        println!("restored index: {records} records");
    }

    let mut store = ShapeStore::open(&path, Access::ReadOnly)
        .wrap_err_with(|| format!("failed to open geometry store {path}"))?;
    let b = store.bounds();
    println!(
        "geometry: {} records, type {}",
        store.record_count(),
        store.shape_type().name()
    );
    println!("  x: {} .. {}", b.x_min, b.x_max);
    println!("  y: {} .. {}", b.y_min, b.y_max);
    if store.shape_type().has_z() {
        println!("  z: {} .. {}", b.z_min, b.z_max);
    }
    if store.shape_type().supports_m() {
        println!("  m: {} .. {}", b.m_min, b.m_max);
    }

    if dump_shapes {
        for i in 0..store.record_count() {
            let shape = store.read_shape(i)?;
            println!(
                "record {i}: {} with {} vertices in {} parts",
                shape.shape_type.name(),
                shape.vertex_count(),
                shape.part_count().max(1)
            );
            for (p, &start) in shape.part_starts.iter().enumerate() {
                println!("  part {p} ({}) from vertex {start}", shape.part_types[p].name());
            }
            for v in 0..shape.vertex_count() {
                let z = shape.z.get(v).map(|z| format!(" z={z}")).unwrap_or_default();
                let m = if shape.has_measure {
                    format!(" m={}", shape.m[v])
                } else {
                    String::new()
                };
                println!("  ({}, {}){z}{m}", shape.x[v], shape.y[v]);
            }
        }
    }

    if dump_attributes {
        let mut dbf = DbfStore::open(&path, Access::ReadOnly)
            .wrap_err_with(|| format!("failed to open attribute store {path}"))?;
        println!(
            "attributes: {} records, {} fields{}",
            dbf.record_count(),
            dbf.field_count(),
            dbf.code_page()
                .map(|cp| format!(", code page {cp}"))
                .unwrap_or_default()
        );
        for f in 0..dbf.field_count() {
            let (name, ty, width, decimals) = dbf.field_info(f)?;
            println!("  {name}: {ty:?}({width}.{decimals})");
        }
        for r in 0..dbf.record_count() {
            let deleted = if dbf.is_record_deleted(r)? { " [deleted]" } else { "" };
            let mut row = Vec::with_capacity(dbf.field_count());
            for f in 0..dbf.field_count() {
                row.push(if dbf.is_null(r, f)? {
                    "(null)".to_string()
                } else {
                    dbf.read_string(r, f)?
                });
            }
            println!("record {r}{deleted}: {}", row.join(" | "));
        }
    }

    Ok(())
}

fn print_usage() {
    println!("shpinfo - dump shapefile geometry and attributes");
    println!();
    println!("Usage: shpinfo [OPTIONS] <path>");
    println!();
    println!("The path may name any of the .shp/.shx/.dbf files or their basename.");
    println!();
    println!("Options:");
    println!("  -s, --shapes       Dump every geometry record");
    println!("  -a, --attributes   Dump the attribute table");
    println!("  -r, --restore      Rebuild the .shx index from the .shp file first");
    println!("  -h, --help         Show this help");
    println!("  -V, --version      Show version");
}
