//! Polyline curve with arc-length normalized domain.

use nalgebra::{Point3, Translation3, Vector3};
use serde::{Deserialize, Serialize};

use super::types::GeomError;

/// Ordered 3D vertices joined by straight segments.
///
/// Invariants:
/// - Immutable once built; every operation returns a new `Polyline`.
/// - A curve is closed when it has at least four points and its last point
///   repeats its first (within tolerance).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polyline {
    points: Vec<Point3<f64>>,
}

impl Polyline {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Two-point curve from `a` to `b`.
    pub fn line(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self { points: vec![a, b] }
    }

    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn first(&self) -> Option<Point3<f64>> {
        self.points.first().copied()
    }

    #[inline]
    pub fn last(&self) -> Option<Point3<f64>> {
        self.points.last().copied()
    }

    pub fn is_closed(&self, tol: f64) -> bool {
        match (self.first(), self.last()) {
            (Some(a), Some(b)) if self.points.len() >= 4 => (b - a).norm() <= tol,
            _ => false,
        }
    }

    /// Total arc length.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }

    /// Vertex list when this curve is a usable polyline (at least two points).
    pub fn try_get_polyline(&self) -> Option<&[Point3<f64>]> {
        if self.points.len() >= 2 {
            Some(&self.points)
        } else {
            None
        }
    }

    /// Point at arc length `s` from the start (`s` within `[0, length]`).
    fn point_at_distance(&self, s: f64) -> Point3<f64> {
        let mut walked = 0.0;
        for w in self.points.windows(2) {
            let seg = (w[1] - w[0]).norm();
            if seg > 0.0 && walked + seg >= s {
                let u = ((s - walked) / seg).clamp(0.0, 1.0);
                return w[0] + (w[1] - w[0]) * u;
            }
            walked += seg;
        }
        // s beyond the end only through rounding
        self.points[self.points.len() - 1]
    }

    /// Sub-curve between normalized parameters `t0 < t1`.
    ///
    /// Fails on a zero-length curve, a non-finite or out-of-range parameter,
    /// or an empty/decreasing interval.
    pub fn trim(&self, t0: f64, t1: f64) -> Result<Polyline, GeomError> {
        let total = self.length();
        if self.points.len() < 2 || !total.is_finite() || total <= 0.0 {
            return Err(GeomError::trim("curve has no length"));
        }
        if !(t0.is_finite() && t1.is_finite()) {
            return Err(GeomError::trim("non-finite trim parameter"));
        }
        if t0 < 0.0 || t1 > 1.0 {
            return Err(GeomError::trim(format!(
                "interval [{t0}, {t1}] outside the domain [0, 1]"
            )));
        }
        if t0 >= t1 {
            return Err(GeomError::trim(format!("empty interval [{t0}, {t1}]")));
        }
        let s0 = t0 * total;
        let s1 = t1 * total;
        let mut out = Vec::with_capacity(self.points.len());
        out.push(self.point_at_distance(s0));
        // interior vertices strictly inside (s0, s1), by cumulative distance
        let mut walked = 0.0;
        for w in self.points.windows(2).take(self.points.len() - 2) {
            walked += (w[1] - w[0]).norm();
            if walked > s0 && walked < s1 {
                out.push(w[1]);
            }
        }
        out.push(self.point_at_distance(s1));
        Ok(Polyline::new(out))
    }

    /// Same points, opposite direction.
    pub fn reversed(&self) -> Polyline {
        let mut points = self.points.clone();
        points.reverse();
        Polyline::new(points)
    }

    /// Rigid translation by `delta`.
    pub fn translated(&self, delta: &Vector3<f64>) -> Polyline {
        Polyline::new(translate_points(&self.points, delta))
    }
}

/// Apply the translation `delta` to every point.
pub fn translate_points(points: &[Point3<f64>], delta: &Vector3<f64>) -> Vec<Point3<f64>> {
    let t = Translation3::from(*delta);
    points.iter().map(|p| t.transform_point(p)).collect()
}
