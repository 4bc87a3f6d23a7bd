//! Planar (world XY) offset of open and closed polylines.
//!
//! Model
//! - Each segment is shifted by `distance` along its left normal.
//! - Neighbouring shifted segments meet at a corner built per `CornerStyle`;
//!   near-reversals always get two points (a flat cap) instead of a miter
//!   running off to infinity.
//! - Segments whose shifted image shrinks below tolerance or flips direction
//!   are removed and self-intersection loops cut (see `cleanup`). The offset
//!   fails only when too few vertices survive: two for open curves, three for
//!   rings. An inward ring offset that inverts the ring fails too.

use nalgebra::{Point3, Vector2, Vector3};

use super::cleanup::{signed_area, RawOffset};
use super::polyline::Polyline;
use super::types::{CornerStyle, GeomError};

/// Below this cosine between consecutive directions the corner is a flat cap.
const FLAT_CAP_COS: f64 = -0.98;
/// Consecutive segments with |sin| under this (and same heading) are collinear.
const COLLINEAR_SIN: f64 = 1e-9;

#[derive(Clone, Copy, Debug)]
struct Segment {
    dir: Vector2<f64>,
    normal: Vector2<f64>,
}

/// Where the incoming shifted segment ends and the outgoing one starts.
#[derive(Clone, Copy, Debug)]
struct Corner {
    entry: Point3<f64>,
    exit: Point3<f64>,
}

impl Corner {
    fn single(p: Point3<f64>) -> Self {
        Self { entry: p, exit: p }
    }
}

/// Offset `curve` in the XY plane by `distance` (positive = left of travel).
///
/// Closed curves are offset as rings and stay closed; open curves are offset
/// on one side with their end points shifted along the end segment normals.
pub fn offset_curve(
    curve: &Polyline,
    distance: f64,
    tol: f64,
    style: CornerStyle,
) -> Result<Polyline, GeomError> {
    if !distance.is_finite() {
        return Err(GeomError::offset(format!(
            "distance must be finite: {distance}"
        )));
    }
    let tol = tol.max(1e-12);
    let closed = curve.is_closed(tol);
    let mut pts = dedup_xy(curve.points(), tol);
    if closed {
        pts.pop();
    }
    let min_points = if closed { 3 } else { 2 };
    if pts.len() < min_points {
        return Err(GeomError::offset(format!(
            "need {min_points} distinct vertices, got {}",
            pts.len()
        )));
    }
    if distance.abs() < tol {
        return Ok(curve.clone());
    }

    let n = pts.len();
    let seg_count = if closed { n } else { n - 1 };
    let segs: Vec<Segment> = (0..seg_count)
        .map(|i| segment(pts[i], pts[(i + 1) % n]))
        .collect();

    let corners: Vec<Corner> = (0..n)
        .map(|i| {
            if closed {
                let prev = &segs[(i + seg_count - 1) % seg_count];
                corner(pts[i], prev, &segs[i], distance, style)
            } else if i == 0 {
                Corner::single(pts[0] + lift(segs[0].normal * distance))
            } else if i == n - 1 {
                Corner::single(pts[i] + lift(segs[seg_count - 1].normal * distance))
            } else {
                corner(pts[i], &segs[i - 1], &segs[i], distance, style)
            }
        })
        .collect();

    let mut raw = RawOffset {
        points: Vec::with_capacity(n * 2),
        dirs: Vec::with_capacity(n * 2),
        closed,
    };
    for (i, c) in corners.iter().enumerate() {
        raw.points.push(c.entry);
        if (c.exit - c.entry).norm() > 1e-12 {
            raw.dirs.push(None);
            raw.points.push(c.exit);
        }
        if let Some(seg) = segs.get(i) {
            raw.dirs.push(Some(seg.dir));
        }
    }

    raw.drop_collapsed(tol)?;
    let source_area = if closed { signed_area(&pts) } else { 0.0 };
    let winding = if source_area < 0.0 { -1.0 } else { 1.0 };
    let mut out = raw.into_points(winding, tol);
    if out.len() < min_points {
        return Err(GeomError::offset(format!(
            "collapsed to {} point(s) at distance {distance}",
            out.len()
        )));
    }
    if closed {
        // an inward offset that grew the ring went through the middle
        let area = signed_area(&out);
        if source_area * distance > 0.0 && area.abs() > source_area.abs() {
            return Err(GeomError::offset(format!(
                "ring inverted at distance {distance}"
            )));
        }
        out.push(out[0]);
    }
    Ok(Polyline::new(out))
}

fn segment(a: Point3<f64>, b: Point3<f64>) -> Segment {
    // dedup_xy guarantees a non-zero planar length
    let dir = Vector2::new(b.x - a.x, b.y - a.y).normalize();
    Segment {
        dir,
        normal: Vector2::new(-dir.y, dir.x),
    }
}

fn corner(
    vertex: Point3<f64>,
    a: &Segment,
    b: &Segment,
    distance: f64,
    style: CornerStyle,
) -> Corner {
    let cos = a.dir.dot(&b.dir);
    let sin = a.dir.perp(&b.dir);
    let along_a = vertex + lift(a.normal * distance);
    let along_b = vertex + lift(b.normal * distance);
    if sin.abs() < COLLINEAR_SIN && cos > 0.0 {
        return Corner::single(along_a);
    }
    if cos < FLAT_CAP_COS {
        return Corner {
            entry: along_a,
            exit: along_b,
        };
    }
    let outer = sin * distance < 0.0;
    match style {
        CornerStyle::Chamfer if outer => Corner {
            entry: along_a,
            exit: along_b,
        },
        _ => {
            let miter = (a.normal + b.normal) * (distance / (1.0 + cos));
            Corner::single(vertex + lift(miter))
        }
    }
}

#[inline]
fn lift(v: Vector2<f64>) -> Vector3<f64> {
    Vector3::new(v.x, v.y, 0.0)
}

/// Drop consecutive vertices that coincide in the XY plane.
fn dedup_xy(points: &[Point3<f64>], tol: f64) -> Vec<Point3<f64>> {
    let mut out: Vec<Point3<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if let Some(last) = out.last() {
            if Vector2::new(p.x - last.x, p.y - last.y).norm() <= tol {
                continue;
            }
        }
        out.push(*p);
    }
    out
}
