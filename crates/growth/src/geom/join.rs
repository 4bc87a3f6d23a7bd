use nalgebra::Point3;

use super::polyline::Polyline;
use super::types::GeomError;

/// Join curves whose endpoints meet within `tol` into as few chains as possible.
///
/// Chains are seeded in input order, so a list that is already laid out head to
/// tail comes back as a single curve starting at the first input's start.
/// Candidates may be reversed to connect. Fails on empty input or when no
/// input has two points.
pub fn join_curves(curves: &[Polyline], tol: f64) -> Result<Vec<Polyline>, GeomError> {
    if curves.is_empty() {
        return Err(GeomError::join("nothing to join"));
    }
    let tol = tol.max(1e-12);
    let mut remaining: Vec<Vec<Point3<f64>>> = curves
        .iter()
        .filter(|c| c.point_count() >= 2)
        .map(|c| c.points().to_vec())
        .collect();
    if remaining.is_empty() {
        return Err(GeomError::join("no input curve has two points"));
    }
    remaining.reverse(); // pop() then yields input order

    let mut out = Vec::new();
    while let Some(mut current) = remaining.pop() {
        let mut changed = true;
        while changed {
            changed = false;
            // walk candidates in input order (the stack is reversed)
            let mut idx = remaining.len();
            while idx > 0 {
                idx -= 1;
                if let Some(merged) = try_merge(&current, &remaining[idx], tol) {
                    current = merged;
                    remaining.remove(idx);
                    changed = true;
                }
            }
        }
        out.push(Polyline::new(current));
    }
    Ok(out)
}

fn try_merge(
    target: &[Point3<f64>],
    candidate: &[Point3<f64>],
    tol: f64,
) -> Option<Vec<Point3<f64>>> {
    let start = *target.first()?;
    let end = *target.last()?;
    let c_start = *candidate.first()?;
    let c_end = *candidate.last()?;
    if target.len() >= 4 && (end - start).norm() <= tol {
        return None; // already closed
    }

    if (c_start - end).norm() <= tol {
        let mut merged = target.to_vec();
        merged.extend_from_slice(&candidate[1..]);
        return Some(merged);
    }
    if (c_end - end).norm() <= tol {
        let mut merged = target.to_vec();
        merged.extend(candidate.iter().rev().skip(1));
        return Some(merged);
    }
    if (c_end - start).norm() <= tol {
        let mut merged = candidate[..candidate.len() - 1].to_vec();
        merged.extend_from_slice(target);
        return Some(merged);
    }
    if (c_start - start).norm() <= tol {
        let mut merged: Vec<_> = candidate.iter().rev().copied().collect();
        merged.pop();
        merged.extend_from_slice(target);
        return Some(merged);
    }
    None
}
