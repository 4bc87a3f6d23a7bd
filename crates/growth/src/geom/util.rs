use nalgebra::{Rotation3, Unit, Vector3};

/// Below this norm a vector counts as zero.
const EPS_UNIT: f64 = 1e-12;

/// World up axis; all lifting and in-plane rotation happens about it.
#[inline]
pub fn up_axis() -> Unit<Vector3<f64>> {
    Vector3::z_axis()
}

/// Unit vector in the direction of `v`, or `None` when `v` is (numerically) zero.
#[inline]
pub fn unitize(v: Vector3<f64>) -> Option<Vector3<f64>> {
    let norm = v.norm();
    if !norm.is_finite() || norm <= EPS_UNIT {
        return None;
    }
    Some(v / norm)
}

/// Rotate `v` by `angle` radians about the up axis (counterclockwise seen from +Z).
#[inline]
pub fn rotate_about_z(v: Vector3<f64>, angle: f64) -> Vector3<f64> {
    Rotation3::from_axis_angle(&up_axis(), angle) * v
}

/// `tangent × up`: the in-plane vector 90° clockwise of `tangent`.
#[inline]
pub fn perpendicular(tangent: Vector3<f64>) -> Vector3<f64> {
    tangent.cross(&up_axis().into_inner())
}
