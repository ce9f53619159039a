//! # Geometry Record Model
//!
//! [`ShapeObject`] is one feature's geometry in memory: parallel vertex
//! arrays, a part table, and a cached bounding box. This module also owns
//! the record content codec, the variable layout each shape family uses
//! between the 8-byte record frame and the end of the record.
//!
//! ## Content Layout
//!
//! Offsets are from the start of the record content; every value is
//! little-endian. The shape type code always occupies bytes 0..4.
//!
//! ```text
//! point family       type | x y [z] [m]
//! multipoint family  type | bounds(4 f64) | n | xy*n | [zrange z*n] | [mrange m*n]
//! part family        type | bounds(4 f64) | nparts npoints | starts
//!                    [patch part types] | xy*n | [zrange z*n] | [mrange m*n]
//! null               type
//! ```
//!
//! The Z block is present exactly when the type carries elevation. The M
//! block is written only when the measure flag is set, and on read its
//! presence is inferred from the bytes remaining after the Z block, which
//! is how the format distinguishes an `ArcM` with measures from one
//! without.
//!
//! ## Decode Validation
//!
//! Counts are bounded (50 million points, 10 million parts) and the
//! minimum size a record's declared counts imply is checked against the
//! bytes actually present before any array is trusted. Part starts must
//! begin at zero, increase strictly, and stay inside the vertex range.

use std::ops::Deref;

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::shp::{shape_type_from_code, BoundingBox, PartType, ShapeType};

/// Upper bound on the vertex count a record may declare.
pub const MAX_POINTS: i32 = 50_000_000;
/// Upper bound on the part count a record may declare.
pub const MAX_PARTS: i32 = 10_000_000;

/// One feature's geometry: a part table and parallel vertex arrays.
///
/// `z` and `m` are empty for families without those channels and
/// zero-filled when the channel exists but no values were supplied.
/// `has_measure` tells whether `m` holds real data; it controls whether
/// the M block is written at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeObject {
    pub shape_type: ShapeType,
    /// Record index in the store, `None` until first written.
    pub ordinal: Option<usize>,
    pub part_starts: SmallVec<[i32; 4]>,
    pub part_types: SmallVec<[PartType; 4]>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub m: Vec<f64>,
    pub has_measure: bool,
    pub bounds: BoundingBox,
}

/// Result of a store read: an owned record, or a view of the store's
/// reusable cache slot when fast mode is on. Either way it dereferences to
/// [`ShapeObject`].
#[derive(Debug)]
pub enum ShapeRead<'a> {
    Owned(ShapeObject),
    Cached(&'a ShapeObject),
}

impl Deref for ShapeRead<'_> {
    type Target = ShapeObject;

    fn deref(&self) -> &ShapeObject {
        match self {
            ShapeRead::Owned(shape) => shape,
            ShapeRead::Cached(shape) => shape,
        }
    }
}

impl ShapeRead<'_> {
    /// Detaches the record from the store cache, cloning if needed.
    pub fn into_owned(self) -> ShapeObject {
        match self {
            ShapeRead::Owned(shape) => shape,
            ShapeRead::Cached(shape) => shape.clone(),
        }
    }
}

impl ShapeObject {
    /// Builds a record from caller-supplied arrays.
    ///
    /// Absent Z and M arrays default to zeros for families that carry the
    /// channel; absent part types default to [`PartType::Ring`]. The first
    /// part start is forced to zero and the bounding box is computed from
    /// the vertices. The measure flag is set only when `m` is supplied for
    /// a measure-capable type.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        shape_type: ShapeType,
        part_starts: &[i32],
        part_types: &[PartType],
        x: &[f64],
        y: &[f64],
        z: Option<&[f64]>,
        m: Option<&[f64]>,
    ) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::usage(format!(
                "vertex array length mismatch: {} x vs {} y",
                x.len(),
                y.len()
            )));
        }
        let n = x.len();

        let mut starts: SmallVec<[i32; 4]> = SmallVec::new();
        let mut types: SmallVec<[PartType; 4]> = SmallVec::new();
        if shape_type.has_parts() && !part_starts.is_empty() {
            starts.extend_from_slice(part_starts);
            starts[0] = 0;
            for w in starts.windows(2) {
                if w[1] <= w[0] {
                    return Err(Error::usage(format!(
                        "part starts must increase strictly: {} then {}",
                        w[0], w[1]
                    )));
                }
            }
            if let Some(&last) = starts.last() {
                if last as usize >= n.max(1) {
                    return Err(Error::usage(format!(
                        "part start {last} outside vertex range 0..{n}"
                    )));
                }
            }
            for i in 0..starts.len() {
                types.push(
                    part_types.get(i).copied().unwrap_or(PartType::Ring),
                );
            }
        }

        let z_vec = if shape_type.has_z() {
            z.map(<[f64]>::to_vec).unwrap_or_else(|| vec![0.0; n])
        } else {
            Vec::new()
        };
        let m_vec = if shape_type.supports_m() {
            m.map(<[f64]>::to_vec).unwrap_or_else(|| vec![0.0; n])
        } else {
            Vec::new()
        };
        let has_measure = m.is_some() && shape_type.supports_m();

        let mut shape = ShapeObject {
            shape_type,
            ordinal: None,
            part_starts: starts,
            part_types: types,
            x: x.to_vec(),
            y: y.to_vec(),
            z: z_vec,
            m: m_vec,
            has_measure,
            bounds: BoundingBox::default(),
        };
        shape.compute_extents();
        Ok(shape)
    }

    /// Single-part convenience constructor.
    pub fn simple(shape_type: ShapeType, x: &[f64], y: &[f64]) -> Result<Self> {
        Self::create(shape_type, &[0], &[], x, y, None, None)
    }

    /// A record with no geometry at all.
    pub fn null() -> Self {
        ShapeObject {
            shape_type: ShapeType::Null,
            ordinal: None,
            part_starts: SmallVec::new(),
            part_types: SmallVec::new(),
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            m: Vec::new(),
            has_measure: false,
            bounds: BoundingBox::default(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.x.len()
    }

    pub fn part_count(&self) -> usize {
        self.part_starts.len()
    }

    /// Recomputes the cached bounding box from the vertex arrays.
    pub fn compute_extents(&mut self) {
        self.bounds = BoundingBox::of_vertices(&self.x, &self.y, &self.z, &self.m);
    }

    /// Serializes the record content into `buf`, replacing its contents.
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        buf.clear();
        put_i32(buf, self.shape_type.code());

        if self.shape_type.has_parts() {
            self.encode_part_family(buf);
        } else if self.shape_type.is_multipoint() {
            self.encode_multipoint(buf);
        } else if self.shape_type.is_point() {
            self.encode_point(buf);
        }
        // Null: the type code is the whole content.
    }

    fn write_m_block(&self) -> bool {
        self.has_measure && self.shape_type.supports_m()
    }

    fn encode_part_family(&self, buf: &mut Vec<u8>) {
        put_xy_bounds(buf, &self.bounds);
        put_i32(buf, self.part_starts.len() as i32);
        put_i32(buf, self.x.len() as i32);
        for &start in &self.part_starts {
            put_i32(buf, start);
        }
        if self.shape_type == ShapeType::MultiPatch {
            for &ty in &self.part_types {
                put_i32(buf, ty.code());
            }
        }
        put_xy_pairs(buf, &self.x, &self.y);
        if self.shape_type.has_z() {
            put_range_and_values(buf, self.bounds.z_min, self.bounds.z_max, &self.z);
        }
        if self.write_m_block() {
            put_range_and_values(buf, self.bounds.m_min, self.bounds.m_max, &self.m);
        }
    }

    fn encode_multipoint(&self, buf: &mut Vec<u8>) {
        put_xy_bounds(buf, &self.bounds);
        put_i32(buf, self.x.len() as i32);
        put_xy_pairs(buf, &self.x, &self.y);
        if self.shape_type.has_z() {
            put_range_and_values(buf, self.bounds.z_min, self.bounds.z_max, &self.z);
        }
        if self.write_m_block() {
            put_range_and_values(buf, self.bounds.m_min, self.bounds.m_max, &self.m);
        }
    }

    fn encode_point(&self, buf: &mut Vec<u8>) {
        put_f64(buf, self.x.first().copied().unwrap_or(0.0));
        put_f64(buf, self.y.first().copied().unwrap_or(0.0));
        if self.shape_type.has_z() {
            put_f64(buf, self.z.first().copied().unwrap_or(0.0));
        }
        if self.write_m_block() {
            put_f64(buf, self.m.first().copied().unwrap_or(0.0));
        }
    }

    /// Parses record content, reusing this object's allocations.
    ///
    /// `at` is the file offset of the record content, used in corruption
    /// reports.
    pub(crate) fn decode_into(
        &mut self,
        index: usize,
        content: &[u8],
        at: u64,
    ) -> Result<()> {
        if content.len() < 4 {
            return Err(Error::corrupt(at, "record content shorter than type code"));
        }
        let shape_type = shape_type_from_code(i32_at(content, 0), at)?;

        self.shape_type = shape_type;
        self.ordinal = Some(index);
        self.part_starts.clear();
        self.part_types.clear();
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.m.clear();
        self.has_measure = false;
        self.bounds = BoundingBox::default();

        if shape_type.has_parts() {
            self.decode_part_family(content, at)?;
        } else if shape_type.is_multipoint() {
            self.decode_multipoint(content, at)?;
        } else if shape_type.is_point() {
            self.decode_point(content, at)?;
        }
        Ok(())
    }

    /// Parses record content into a fresh object.
    pub(crate) fn decode(index: usize, content: &[u8], at: u64) -> Result<Self> {
        let mut shape = ShapeObject::null();
        shape.decode_into(index, content, at)?;
        Ok(shape)
    }

    fn decode_part_family(&mut self, content: &[u8], at: u64) -> Result<()> {
        if content.len() < 44 {
            return Err(Error::corrupt(
                at,
                format!("part record content too small: {} bytes", content.len()),
            ));
        }
        let n_parts = i32_at(content, 36);
        let n_points = i32_at(content, 40);
        validate_counts(n_points, n_parts, at)?;
        let (n_parts, n_points) = (n_parts as usize, n_points as usize);

        let mut required = 44 + 4 * n_parts + 16 * n_points;
        if self.shape_type == ShapeType::MultiPatch {
            required += 4 * n_parts;
        }
        if self.shape_type.has_z() {
            required += 16 + 8 * n_points;
        }
        if required > content.len() {
            return Err(Error::corrupt(
                at,
                format!(
                    "record declares {} bytes but holds {}",
                    required,
                    content.len()
                ),
            ));
        }

        self.read_xy_bounds(content);

        let mut offset = 44;
        for i in 0..n_parts {
            let start = i32_at(content, offset + 4 * i);
            let prev = self.part_starts.last().copied();
            let out_of_range = start < 0 || (n_points > 0 && start as usize >= n_points);
            let not_increasing = (i == 0 && start != 0)
                || prev.is_some_and(|p| start <= p);
            if out_of_range || not_increasing {
                return Err(Error::corrupt(
                    at,
                    format!("part start {start} invalid at part {i} of {n_parts}"),
                ));
            }
            self.part_starts.push(start);
        }
        offset += 4 * n_parts;

        if self.shape_type == ShapeType::MultiPatch {
            for i in 0..n_parts {
                let code = i32_at(content, offset + 4 * i);
                let ty = PartType::from_code(code).ok_or_else(|| {
                    Error::corrupt(at, format!("unknown part type code {code}"))
                })?;
                self.part_types.push(ty);
            }
            offset += 4 * n_parts;
        } else {
            self.part_types
                .extend(std::iter::repeat(PartType::Ring).take(n_parts));
        }

        offset = self.read_xy_pairs(content, offset, n_points);
        offset = self.maybe_read_z_block(content, offset, n_points);
        self.maybe_read_m_block(content, offset, n_points);
        Ok(())
    }

    fn decode_multipoint(&mut self, content: &[u8], at: u64) -> Result<()> {
        if content.len() < 40 {
            return Err(Error::corrupt(
                at,
                format!("multipoint content too small: {} bytes", content.len()),
            ));
        }
        let n_points = i32_at(content, 36);
        validate_counts(n_points, 0, at)?;
        let n_points = n_points as usize;

        let mut required = 40 + 16 * n_points;
        if self.shape_type.has_z() {
            required += 16 + 8 * n_points;
        }
        if required > content.len() {
            return Err(Error::corrupt(
                at,
                format!(
                    "record declares {} bytes but holds {}",
                    required,
                    content.len()
                ),
            ));
        }

        self.read_xy_bounds(content);
        let offset = self.read_xy_pairs(content, 40, n_points);
        let offset = self.maybe_read_z_block(content, offset, n_points);
        self.maybe_read_m_block(content, offset, n_points);
        Ok(())
    }

    fn decode_point(&mut self, content: &[u8], at: u64) -> Result<()> {
        let mut required = 20;
        if self.shape_type.has_z() {
            required += 8;
        }
        if content.len() < required {
            return Err(Error::corrupt(
                at,
                format!("point content too small: {} bytes", content.len()),
            ));
        }

        self.x.push(f64_at(content, 4));
        self.y.push(f64_at(content, 12));
        let mut offset = 20;
        if self.shape_type.has_z() {
            self.z.push(f64_at(content, offset));
            offset += 8;
        }
        if self.shape_type.supports_m() && content.len() >= offset + 8 {
            self.m.push(f64_at(content, offset));
            self.has_measure = true;
        } else if self.shape_type.supports_m() {
            self.m.push(0.0);
        }

        // a one-vertex shape's bounds are its vertex
        self.compute_extents();
        Ok(())
    }

    fn read_xy_bounds(&mut self, content: &[u8]) {
        self.bounds.x_min = f64_at(content, 4);
        self.bounds.y_min = f64_at(content, 12);
        self.bounds.x_max = f64_at(content, 20);
        self.bounds.y_max = f64_at(content, 28);
    }

    fn read_xy_pairs(&mut self, content: &[u8], offset: usize, n: usize) -> usize {
        self.x.reserve(n);
        self.y.reserve(n);
        for i in 0..n {
            self.x.push(f64_at(content, offset + 16 * i));
            self.y.push(f64_at(content, offset + 16 * i + 8));
        }
        offset + 16 * n
    }

    fn maybe_read_z_block(&mut self, content: &[u8], offset: usize, n: usize) -> usize {
        if !self.shape_type.has_z() {
            return offset;
        }
        self.bounds.z_min = f64_at(content, offset);
        self.bounds.z_max = f64_at(content, offset + 8);
        self.z.reserve(n);
        for i in 0..n {
            self.z.push(f64_at(content, offset + 16 + 8 * i));
        }
        offset + 16 + 8 * n
    }

    /// Measure presence is inferred from the bytes left after the Z block.
    fn maybe_read_m_block(&mut self, content: &[u8], offset: usize, n: usize) {
        if !self.shape_type.supports_m() {
            return;
        }
        if content.len() >= offset + 16 + 8 * n {
            self.bounds.m_min = f64_at(content, offset);
            self.bounds.m_max = f64_at(content, offset + 8);
            self.m.reserve(n);
            for i in 0..n {
                self.m.push(f64_at(content, offset + 16 + 8 * i));
            }
            self.has_measure = true;
        } else {
            self.m = vec![0.0; n];
        }
    }

    /// Worst-case encoded content size, used to size the scratch buffer.
    pub(crate) fn max_encoded_size(&self) -> usize {
        self.x.len() * 4 * 8 + self.part_starts.len() * 8 + 128
    }
}

fn validate_counts(n_points: i32, n_parts: i32, at: u64) -> Result<()> {
    if !(0..=MAX_POINTS).contains(&n_points) {
        return Err(Error::corrupt(
            at,
            format!("implausible point count {n_points}"),
        ));
    }
    if !(0..=MAX_PARTS).contains(&n_parts) {
        return Err(Error::corrupt(
            at,
            format!("implausible part count {n_parts}"),
        ));
    }
    Ok(())
}

// Offset readers assume the caller has already validated the content size.

fn i32_at(bytes: &[u8], off: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[off..off + 4]);
    i32::from_le_bytes(b)
}

fn f64_at(bytes: &[u8], off: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[off..off + 8]);
    f64::from_le_bytes(b)
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_xy_bounds(buf: &mut Vec<u8>, b: &BoundingBox) {
    put_f64(buf, b.x_min);
    put_f64(buf, b.y_min);
    put_f64(buf, b.x_max);
    put_f64(buf, b.y_max);
}

fn put_xy_pairs(buf: &mut Vec<u8>, x: &[f64], y: &[f64]) {
    for i in 0..x.len() {
        put_f64(buf, x[i]);
        put_f64(buf, y[i]);
    }
}

fn put_range_and_values(buf: &mut Vec<u8>, min: f64, max: f64, values: &[f64]) {
    put_f64(buf, min);
    put_f64(buf, max);
    for &v in values {
        put_f64(buf, v);
    }
}
