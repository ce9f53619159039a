//! # Geometry Store
//!
//! The geometry side of the codec: a primary `.shp` file of variable-length
//! coordinate records and a companion `.shx` index of (offset, length)
//! pairs. [`ShapeStore`] owns the file pair and the in-memory slot table;
//! [`ShapeObject`] is one decoded feature. [`restore_index`] rebuilds a
//! lost index by scanning the primary file.
//!
//! Record `i` of a geometry store and record `i` of the attribute store
//! sharing its basename describe the same feature. The two engines never
//! reference each other in process.

mod object;
mod restore;
mod store;

pub use object::{ShapeObject, ShapeRead};
pub use restore::restore_index;
pub use store::{Access, ShapeStore};

use crate::error::{Error, Result};

/// Geometry kind tag, homogeneous across all records of one store.
///
/// The numeric codes are fixed by the on-disk format. `Z` variants carry an
/// elevation channel and may carry measures; `M` variants carry measures
/// only; [`ShapeType::MultiPatch`] behaves like a `Z` polygon with typed
/// parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ShapeType {
    Null = 0,
    Point = 1,
    Arc = 3,
    Polygon = 5,
    MultiPoint = 8,
    PointZ = 11,
    ArcZ = 13,
    PolygonZ = 15,
    MultiPointZ = 18,
    PointM = 21,
    ArcM = 23,
    PolygonM = 25,
    MultiPointM = 28,
    MultiPatch = 31,
}

impl ShapeType {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::Arc,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::ArcZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::ArcM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            31 => ShapeType::MultiPatch,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeType::Null => "NullShape",
            ShapeType::Point => "Point",
            ShapeType::Arc => "Arc",
            ShapeType::Polygon => "Polygon",
            ShapeType::MultiPoint => "MultiPoint",
            ShapeType::PointZ => "PointZ",
            ShapeType::ArcZ => "ArcZ",
            ShapeType::PolygonZ => "PolygonZ",
            ShapeType::MultiPointZ => "MultiPointZ",
            ShapeType::PointM => "PointM",
            ShapeType::ArcM => "ArcM",
            ShapeType::MultiPointM => "MultiPointM",
            ShapeType::PolygonM => "PolygonM",
            ShapeType::MultiPatch => "MultiPatch",
        }
    }

    /// Carries an elevation channel.
    pub fn has_z(self) -> bool {
        matches!(
            self,
            ShapeType::PointZ
                | ShapeType::ArcZ
                | ShapeType::PolygonZ
                | ShapeType::MultiPointZ
                | ShapeType::MultiPatch
        )
    }

    /// May carry a measure channel. Whether a given record actually does is
    /// inferred from its size on read and from the measure flag on write.
    pub fn supports_m(self) -> bool {
        self.has_z()
            || matches!(
                self,
                ShapeType::PointM
                    | ShapeType::ArcM
                    | ShapeType::PolygonM
                    | ShapeType::MultiPointM
            )
    }

    /// Single-vertex family.
    pub fn is_point(self) -> bool {
        matches!(self, ShapeType::Point | ShapeType::PointZ | ShapeType::PointM)
    }

    /// Unconnected vertex-set family.
    pub fn is_multipoint(self) -> bool {
        matches!(
            self,
            ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM
        )
    }

    /// Part-structured family: polylines, polygons and multipatches.
    pub fn has_parts(self) -> bool {
        matches!(
            self,
            ShapeType::Arc
                | ShapeType::ArcZ
                | ShapeType::ArcM
                | ShapeType::Polygon
                | ShapeType::PolygonZ
                | ShapeType::PolygonM
                | ShapeType::MultiPatch
        )
    }
}

/// Part kind within a [`ShapeType::MultiPatch`] record. Every other shape
/// family implicitly uses [`PartType::Ring`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PartType {
    TriangleStrip = 0,
    TriangleFan = 1,
    OuterRing = 2,
    InnerRing = 3,
    FirstRing = 4,
    Ring = 5,
}

impl PartType {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => PartType::TriangleStrip,
            1 => PartType::TriangleFan,
            2 => PartType::OuterRing,
            3 => PartType::InnerRing,
            4 => PartType::FirstRing,
            5 => PartType::Ring,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            PartType::TriangleStrip => "TriangleStrip",
            PartType::TriangleFan => "TriangleFan",
            PartType::OuterRing => "OuterRing",
            PartType::InnerRing => "InnerRing",
            PartType::FirstRing => "FirstRing",
            PartType::Ring => "Ring",
        }
    }
}

/// Axis-aligned extent over X, Y and the optional Z and M channels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub m_min: f64,
    pub m_max: f64,
}

impl BoundingBox {
    /// Elementwise min/max over parallel vertex arrays. Zero vertices leave
    /// the box at its default.
    pub fn of_vertices(x: &[f64], y: &[f64], z: &[f64], m: &[f64]) -> Self {
        let mut b = BoundingBox::default();
        for i in 0..x.len() {
            let (xv, yv) = (x[i], y[i]);
            let zv = z.get(i).copied().unwrap_or(0.0);
            let mv = m.get(i).copied().unwrap_or(0.0);
            if i == 0 {
                b = BoundingBox {
                    x_min: xv,
                    y_min: yv,
                    x_max: xv,
                    y_max: yv,
                    z_min: zv,
                    z_max: zv,
                    m_min: mv,
                    m_max: mv,
                };
            } else {
                b.x_min = b.x_min.min(xv);
                b.y_min = b.y_min.min(yv);
                b.x_max = b.x_max.max(xv);
                b.y_max = b.y_max.max(yv);
                b.z_min = b.z_min.min(zv);
                b.z_max = b.z_max.max(zv);
                b.m_min = b.m_min.min(mv);
                b.m_max = b.m_max.max(mv);
            }
        }
        b
    }
}

pub(crate) fn shape_type_from_code(code: i32, at: u64) -> Result<ShapeType> {
    ShapeType::from_code(code)
        .ok_or_else(|| Error::corrupt(at, format!("unknown shape type code {code}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for code in [0, 1, 3, 5, 8, 11, 13, 15, 18, 21, 23, 25, 28, 31] {
            assert_eq!(ShapeType::from_code(code).unwrap().code(), code);
        }
        assert!(ShapeType::from_code(2).is_none());
        assert!(ShapeType::from_code(32).is_none());
    }

    #[test]
    fn channel_presence_by_family() {
        assert!(ShapeType::PolygonZ.has_z());
        assert!(ShapeType::PolygonZ.supports_m());
        assert!(ShapeType::MultiPatch.has_z());
        assert!(!ShapeType::ArcM.has_z());
        assert!(ShapeType::ArcM.supports_m());
        assert!(!ShapeType::Point.supports_m());
    }

    #[test]
    fn vertex_bounds_cover_all_channels() {
        let b = BoundingBox::of_vertices(
            &[1.0, -2.0, 3.0],
            &[4.0, 5.0, -6.0],
            &[0.5, 0.0, 1.5],
            &[9.0, 7.0, 8.0],
        );
        assert_eq!(b.x_min, -2.0);
        assert_eq!(b.x_max, 3.0);
        assert_eq!(b.y_min, -6.0);
        assert_eq!(b.y_max, 5.0);
        assert_eq!(b.z_min, 0.0);
        assert_eq!(b.z_max, 1.5);
        assert_eq!(b.m_min, 7.0);
        assert_eq!(b.m_max, 9.0);
    }

    #[test]
    fn empty_vertex_set_leaves_default_bounds() {
        assert_eq!(
            BoundingBox::of_vertices(&[], &[], &[], &[]),
            BoundingBox::default()
        );
    }
}
