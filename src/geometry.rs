use kurbo::{ParamCurveNearest, Shape};

use crate::foundation::core::{BezPath, Point, Rect};

const NEAREST_ACCURACY: f64 = 1e-4;

/// Fill rule used for geometry containment and rasterization.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// Resolved geometry snapshot: an immutable bezier path plus its fill rule.
///
/// Equality is value-based over the path elements, so two geometries built
/// from the same source compare equal and allow node reuse.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    path: BezPath,
    fill_rule: FillRule,
}

impl Geometry {
    pub fn new(path: BezPath, fill_rule: FillRule) -> Self {
        Self { path, fill_rule }
    }

    pub fn path(&self) -> &BezPath {
        &self.path
    }

    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    /// Tight bounding box of the path.
    pub fn bounds(&self) -> Rect {
        self.path.bounding_box()
    }

    /// Native fill containment test honoring the fill rule.
    pub fn fill_contains(&self, point: Point) -> bool {
        let winding = self.path.winding(point);
        match self.fill_rule {
            FillRule::NonZero => winding != 0,
            FillRule::EvenOdd => winding % 2 != 0,
        }
    }

    /// Native stroke containment test: true when `point` lies within half
    /// the stroke `thickness` of the path outline.
    pub fn stroke_contains(&self, point: Point, thickness: f64) -> bool {
        if !thickness.is_finite() || thickness <= 0.0 {
            return false;
        }
        let half = thickness / 2.0;
        let half_sq = half * half;
        self.path
            .segments()
            .any(|seg| seg.nearest(point, NEAREST_ACCURACY).distance_sq <= half_sq)
    }
}
