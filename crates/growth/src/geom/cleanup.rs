//! Clean-up of raw offset polylines.
//!
//! Steps, in order
//! - Collapsed edges (an edge whose image vanished or now runs against its
//!   source segment) are removed; the neighbouring edges are extended to meet.
//!   On open curves a collapsed edge between two opposing neighbours closes a
//!   pocket: the pocket is cut out and the curve continues on the longer side.
//! - Self-intersection loops are cut: open curves keep the path around the
//!   loop, closed rings keep the sub-ring winding like the source.
//! - Duplicate and backtracking vertices are dropped.
//!
//! The caller decides whether what survives is still a curve.

use nalgebra::{Point3, Vector2};

use super::types::GeomError;

/// Below this cosine two consecutive edges run against each other.
const REVERSAL_COS: f64 = -0.98;
/// Intersection parameters this close to 0 or 1 count as endpoint touches.
const TOUCH_EPS: f64 = 1e-9;

/// Offset vertices before clean-up.
///
/// `dirs[k]` is the source segment direction of edge `points[k] → points[k + 1]`
/// (wrapping when closed); `None` marks cap and chamfer edges, which have no
/// source segment to compare against.
#[derive(Clone, Debug)]
pub(super) struct RawOffset {
    pub points: Vec<Point3<f64>>,
    pub dirs: Vec<Option<Vector2<f64>>>,
    pub closed: bool,
}

impl RawOffset {
    #[inline]
    fn min_points(&self) -> usize {
        if self.closed {
            3
        } else {
            2
        }
    }

    /// First edge whose image is shorter than `tol` along its source direction.
    fn first_collapsed(&self, tol: f64) -> Option<usize> {
        let m = self.points.len();
        self.dirs.iter().enumerate().find_map(|(k, dir)| {
            let dir = (*dir)?;
            let edge = xy(self.points[(k + 1) % m] - self.points[k]);
            (edge.dot(&dir) < tol).then_some(k)
        })
    }

    /// Remove collapsed edges until none is left.
    pub fn drop_collapsed(&mut self, tol: f64) -> Result<(), GeomError> {
        while let Some(mut k) = self.first_collapsed(tol) {
            if self.points.len() <= self.min_points() {
                return Err(GeomError::offset("every edge collapsed"));
            }
            let last = self.dirs.len() - 1;
            if !self.closed && k == 0 {
                self.points.remove(0);
                self.dirs.remove(0);
                continue;
            }
            if !self.closed && k == last {
                self.points.pop();
                self.dirs.pop();
                continue;
            }
            if self.closed && k == 0 {
                self.points.rotate_right(1);
                self.dirs.rotate_right(1);
                k = 1;
            } else if self.closed && k == last {
                self.points.rotate_left(1);
                self.dirs.rotate_left(1);
                k -= 1;
            }

            let m = self.points.len();
            let (prev, a, b, next) = (
                self.points[k - 1],
                self.points[k],
                self.points[k + 1],
                self.points[(k + 2) % m],
            );
            if !self.closed && opposed(xy(a - prev), xy(next - b)) {
                self.cut_pocket(k, tol);
                if self.points.len() < 2 {
                    return Err(GeomError::offset("pocket closed with nothing left"));
                }
                continue;
            }
            let z = 0.5 * (a.z + b.z);
            let merged = match line_meet(prev, a, b, next) {
                Some(p) => Point3::new(p.x, p.y, z),
                None => Point3::new(0.5 * (a.x + b.x), 0.5 * (a.y + b.y), z),
            };
            self.points[k] = merged;
            self.points.remove(k + 1);
            self.dirs.remove(k);
        }
        Ok(())
    }

    /// Drop edges `k - 1 ..= k + 1` of an open curve. The two sides are rejoined
    /// when they touch, otherwise the longer side is kept.
    fn cut_pocket(&mut self, k: usize, tol: f64) {
        let right_points = self.points.split_off(k + 2);
        let right_dirs = self.dirs.split_off(k + 2);
        self.points.truncate(k);
        self.dirs.truncate(k - 1);

        let touching = match (self.points.last(), right_points.first()) {
            (Some(l), Some(r)) => xy(r - l).norm() <= tol,
            _ => false,
        };
        if touching {
            self.points.extend_from_slice(&right_points[1..]);
            self.dirs.extend(right_dirs);
        } else if path_length(&right_points) > path_length(&self.points) {
            self.points = right_points;
            self.dirs = right_dirs;
        }
    }

    /// Cut self-intersection loops and tidy the vertex list.
    pub fn into_points(self, winding: f64, tol: f64) -> Vec<Point3<f64>> {
        let cut = if self.closed {
            cut_ring_loops(&self.points, winding)
        } else {
            cut_open_loops(self.points)
        };
        drop_backtracks(cut, self.closed, tol)
    }
}

#[inline]
fn xy(v: nalgebra::Vector3<f64>) -> Vector2<f64> {
    Vector2::new(v.x, v.y)
}

fn opposed(u: Vector2<f64>, v: Vector2<f64>) -> bool {
    let (nu, nv) = (u.norm(), v.norm());
    nu > 0.0 && nv > 0.0 && u.dot(&v) / (nu * nv) < REVERSAL_COS
}

fn path_length(points: &[Point3<f64>]) -> f64 {
    points.windows(2).map(|w| xy(w[1] - w[0]).norm()).sum()
}

/// Intersection of the lines through `p0 p1` and `q0 q1` (XY); `None` when parallel.
fn line_meet(
    p0: Point3<f64>,
    p1: Point3<f64>,
    q0: Point3<f64>,
    q1: Point3<f64>,
) -> Option<Vector2<f64>> {
    let r = xy(p1 - p0);
    let s = xy(q1 - q0);
    let den = r.perp(&s);
    if den.abs() <= 1e-12 * r.norm() * s.norm() {
        return None;
    }
    let t = xy(q0 - p0).perp(&s) / den;
    Some(Vector2::new(p0.x, p0.y) + r * t)
}

/// Parameters `(t, u)` where segments `a0 a1` and `b0 b1` cross in XY.
fn segment_hit(
    a0: Point3<f64>,
    a1: Point3<f64>,
    b0: Point3<f64>,
    b1: Point3<f64>,
) -> Option<(f64, f64)> {
    let r = xy(a1 - a0);
    let s = xy(b1 - b0);
    let den = r.perp(&s);
    if den.abs() < 1e-15 {
        return None;
    }
    let qp = xy(b0 - a0);
    let t = qp.perp(&s) / den;
    let u = qp.perp(&r) / den;
    let inside = |x: f64| (-1e-12..=1.0 + 1e-12).contains(&x);
    if !(inside(t) && inside(u)) {
        return None;
    }
    let at_end = |x: f64| x < TOUCH_EPS || x > 1.0 - TOUCH_EPS;
    if at_end(t) && at_end(u) {
        return None;
    }
    Some((t, u))
}

#[inline]
fn lerp(a: Point3<f64>, b: Point3<f64>, t: f64) -> Point3<f64> {
    a + (b - a) * t
}

/// Repeatedly cut the widest loop starting at the earliest crossing edge.
fn cut_open_loops(mut points: Vec<Point3<f64>>) -> Vec<Point3<f64>> {
    loop {
        let n = points.len();
        let hit = (0..n.saturating_sub(1)).find_map(|i| {
            (i + 2..n - 1).rev().find_map(|j| {
                segment_hit(points[i], points[i + 1], points[j], points[j + 1])
                    .map(|(t, _)| (i, j, t))
            })
        });
        let Some((i, j, t)) = hit else {
            return points;
        };
        let crossing = lerp(points[i], points[i + 1], t);
        let tail = points.split_off(j + 1);
        points.truncate(i + 1);
        points.push(crossing);
        points.extend(tail);
    }
}

/// Signed XY area of a ring (positive = counterclockwise).
pub(super) fn signed_area(points: &[Point3<f64>]) -> f64 {
    let n = points.len();
    0.5 * (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
}

fn first_ring_crossing(points: &[Point3<f64>]) -> Option<(usize, usize, Point3<f64>)> {
    let n = points.len();
    if n < 4 {
        return None;
    }
    for i in 0..n {
        for j in i + 2..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (a0, a1) = (points[i], points[(i + 1) % n]);
            if let Some((t, _)) = segment_hit(a0, a1, points[j], points[(j + 1) % n]) {
                return Some((i, j, lerp(a0, a1, t)));
            }
        }
    }
    None
}

/// Split a ring at each crossing and keep the part winding like `winding`
/// (the larger one when both or neither do). Each split drops a vertex, so
/// the recursion ends.
fn cut_ring_loops(points: &[Point3<f64>], winding: f64) -> Vec<Point3<f64>> {
    let Some((i, j, crossing)) = first_ring_crossing(points) else {
        return points.to_vec();
    };
    let mut a = vec![crossing];
    a.extend_from_slice(&points[i + 1..=j]);
    let mut b = vec![crossing];
    b.extend_from_slice(&points[j + 1..]);
    b.extend_from_slice(&points[..=i]);

    let a = cut_ring_loops(&a, winding);
    let b = cut_ring_loops(&b, winding);
    let (area_a, area_b) = (signed_area(&a), signed_area(&b));
    match (area_a * winding > 0.0, area_b * winding > 0.0) {
        (true, false) => a,
        (false, true) => b,
        _ if area_a.abs() >= area_b.abs() => a,
        _ => b,
    }
}

/// Drop repeated vertices and vertices where the path doubles back on itself.
fn drop_backtracks(mut points: Vec<Point3<f64>>, closed: bool, tol: f64) -> Vec<Point3<f64>> {
    loop {
        points.dedup_by(|b, a| xy(*b - *a).norm() <= tol);
        if closed && points.len() > 1 {
            if let (Some(first), Some(last)) = (points.first(), points.last()) {
                if xy(*last - *first).norm() <= tol {
                    points.pop();
                }
            }
        }
        let n = points.len();
        if n < 3 {
            return points;
        }
        let interior = if closed { 0..n } else { 1..n - 1 };
        let doubled = interior.into_iter().find(|&i| {
            let prev = points[(i + n - 1) % n];
            let u = xy(points[i] - prev);
            let v = xy(points[(i + 1) % n] - points[i]);
            u.perp(&v).abs() <= 1e-9 * u.norm() * v.norm() && u.dot(&v) < 0.0
        });
        match doubled {
            Some(i) => {
                points.remove(i);
            }
            None => return points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::point;

    #[test]
    fn open_loop_is_cut_at_the_crossing() {
        let pts = vec![
            point![0.0, 1.0, 0.0],
            point![5.0, 1.0, 0.0],
            point![5.0, 2.0, 0.0],
            point![3.0, 2.0, 0.0],
            point![3.0, 0.5, 0.0],
        ];
        let cut = cut_open_loops(pts);
        assert_eq!(cut.len(), 3);
        assert!((cut[1] - point![3.0, 1.0, 0.0]).norm() < 1e-12);
    }

    #[test]
    fn backtracks_and_duplicates_are_dropped() {
        let pts = vec![
            point![0.0, 0.0, 0.0],
            point![2.0, 0.0, 0.0],
            point![2.0, 0.0, 0.0],
            point![1.0, 0.0, 0.0],
            point![1.0, 3.0, 0.0],
        ];
        let out = drop_backtracks(pts, false, 1e-6);
        assert_eq!(
            out,
            vec![
                point![0.0, 0.0, 0.0],
                point![1.0, 0.0, 0.0],
                point![1.0, 3.0, 0.0]
            ]
        );
    }

    #[test]
    fn ring_keeps_the_part_winding_like_the_source() {
        // counterclockwise square with a small clockwise bow-tie lobe
        let ring = vec![
            point![0.0, 0.0, 0.0],
            point![4.0, 0.0, 0.0],
            point![4.0, 4.0, 0.0],
            point![5.0, 5.0, 0.0],
            point![5.0, 4.0, 0.0],
            point![4.0, 5.0, 0.0],
            point![0.0, 4.0, 0.0],
        ];
        let kept = cut_ring_loops(&ring, 1.0);
        assert_eq!(kept.len(), 6);
        assert!(signed_area(&kept) > 0.0);
        assert!(kept.iter().all(|p| p.x <= 4.5 + 1e-9));
    }
}
