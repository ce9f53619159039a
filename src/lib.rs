//! # shapekit - Shapefile Record Codec
//!
//! shapekit reads and writes the shapefile trio: a `.shp` geometry file of
//! variable-length coordinate records, its `.shx` offset index, and the
//! `.dbf` fixed-width attribute table that carries one record per feature.
//! It is a record-level codec, not a GIS: no projections, no geometric
//! validation, no spatial index. The design goals are
//!
//! - **Byte-exact wire fidelity**: headers, record frames and field slots
//!   match the legacy format bit for bit, mixed endianness included
//! - **Incremental access**: read or append one record at a time without
//!   loading the dataset
//! - **Defensive decoding**: counts, offsets and lengths from the file are
//!   validated before any allocation or array indexing trusts them
//!
//! ## Quick Start
//!
//! ```ignore
//! use shapekit::{Access, DbfStore, FieldType, ShapeObject, ShapeStore, ShapeType};
//!
//! let mut shp = ShapeStore::create("./lakes", ShapeType::Point)?;
//! let point = ShapeObject::create(ShapeType::Point, &[], &[], &[1.0], &[2.0], None, None)?;
//! shp.write_shape(&point, None)?;
//! shp.close()?;
//!
//! let mut dbf = DbfStore::create("./lakes")?;
//! dbf.add_field("NAME", FieldType::String, 24, 0)?;
//! dbf.write_string(0, 0, "Mirror Lake")?.ignore();
//! dbf.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────┬──────────────────┐
//! │ ShapeStore (.shp/.shx) │ DbfStore (.dbf)  │
//! ├────────────────────────┼──────────────────┤
//! │ ShapeObject codec      │ field slot codec │
//! ├────────────────────────┴──────────────────┤
//! │ wire (zerocopy on-disk structs)           │
//! ├───────────────────────────────────────────┤
//! │ vfs (injected byte-stream capability)     │
//! └───────────────────────────────────────────┘
//! ```
//!
//! The two stores never reference each other in memory; record `i` on both
//! sides describes feature `i`, correlated only by a shared basename.
//!
//! ## Concurrency
//!
//! Everything is synchronous, blocking and single-owner. A store handle is
//! not usable from two threads, and the single-record caches make even
//! interleaved single-threaded readers on one handle incorrect; open a
//! second handle instead. Concurrent writers through separate handles are
//! not coordinated and will corrupt each other's view.
//!
//! ## Module Overview
//!
//! - [`shp`]: geometry store, record model, index reconstruction
//! - [`dbf`]: attribute store, schema mutations, NULL conventions
//! - [`wire`]: fixed-layout on-disk structs
//! - [`vfs`]: the I/O capability table and its `std::fs` default
//! - [`error`]: the typed failure taxonomy

pub mod dbf;
pub mod error;
pub mod shp;
pub mod vfs;
pub mod wire;

pub use dbf::{DbfStore, FieldDescr, FieldType, WriteOutcome};
pub use error::{Error, Result};
pub use shp::{
    restore_index, BoundingBox, PartType, ShapeObject, ShapeRead, ShapeStore, ShapeType,
};
pub use vfs::{Access, StdVfs, Vfs, VfsFile};
