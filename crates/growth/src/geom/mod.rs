//! Polyline kernel (trim, join, offset, translate) for the growth engines.
//!
//! Purpose
//! - Provide the handful of curve primitives the growth loops need: trim by
//!   normalized parameter, join within tolerance, planar offset with a corner
//!   style, polyline extraction and rigid translation.
//! - Every curve is a `Polyline`; trimming, joining and offsetting line-work
//!   never leaves that representation.
//!
//! Conventions
//! - The normalized domain `[0, 1]` is arc length over total length.
//! - Offsets happen in the world XY plane. Positive distance moves to the left
//!   of the walking direction; each output vertex keeps the Z of its source.
//! - Failures are values (`GeomError`); callers decide whether to abort.
//!
//! Code cross-refs: `Polyline`, `join_curves`, `offset_curve`, `CornerStyle`

mod cleanup;
mod join;
mod offset;
mod polyline;
mod types;
mod util;

pub use join::join_curves;
pub use offset::offset_curve;
pub use polyline::{translate_points, Polyline};
pub use types::{CornerStyle, GeomError, JOIN_TOLERANCE, OFFSET_TOLERANCE};
pub use util::{perpendicular, rotate_about_z, unitize, up_axis};
