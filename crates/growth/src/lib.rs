//! Iterative growth engines for procedural line-art.
//!
//! Three variants share one loop shape (iterate → perturb → accumulate):
//! - `branches`: trimmed curves sprouting flat square-spiral branches, offset
//!   and lifted layer by layer.
//! - `terrace`: inward-offset U outlines stacked into a ziggurat, with
//!   optional protrusions that grow their own downward mini-ziggurats.
//! - `attractor`: independent jittered walks from seed points toward a center.
//!
//! The `geom` module is the polyline kernel all three run on. Runs are
//! single-threaded, deterministic for a fixed seed, and never fail once
//! constructed: degenerate geometry ends a run early with a partial history.

pub mod attractor;
pub mod branches;
pub mod engine;
pub mod geom;
pub mod terrace;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::attractor::{AttractorGrowth, AttractorParams, Paths};
    pub use crate::branches::{grow_branch, BranchGrowth, BranchLayer, BranchParams, BranchSpec};
    pub use crate::engine::{Growth, GrowthEngine, GrowthError, ReplayToken, StopReason};
    pub use crate::geom::{
        join_curves, offset_curve, CornerStyle, GeomError, Polyline, JOIN_TOLERANCE,
        OFFSET_TOLERANCE,
    };
    pub use crate::terrace::{mini_ziggurat, TerraceGrowth, TerraceLayer, TerraceParams};
    pub use nalgebra::{Point3, Vector3};
}
