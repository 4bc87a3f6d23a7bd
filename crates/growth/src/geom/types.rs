//! Kernel tolerances, corner styles and the failure type.

use std::fmt;

/// Endpoint-matching tolerance used when joining branch segments to the trunk.
pub const JOIN_TOLERANCE: f64 = 0.01;
/// Tolerance passed to every offset call by the growth loops.
pub const OFFSET_TOLERANCE: f64 = 0.01;

/// How offset segments meet at a vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CornerStyle {
    /// Extend neighbouring offset segments until they intersect (miter).
    #[default]
    Sharp,
    /// Cut outer corners with a straight segment; inner corners still meet.
    Chamfer,
}

/// Kernel operation failure. Each variant means "degenerate geometry".
#[derive(Clone, Debug, PartialEq)]
pub enum GeomError {
    TrimFailed { reason: String },
    JoinFailed { reason: String },
    OffsetFailed { reason: String },
    NotAPolyline { points: usize },
}

impl GeomError {
    pub(crate) fn trim(reason: impl Into<String>) -> Self {
        Self::TrimFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn join(reason: impl Into<String>) -> Self {
        Self::JoinFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn offset(reason: impl Into<String>) -> Self {
        Self::OffsetFailed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GeomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrimFailed { reason } => write!(f, "trim failed: {reason}"),
            Self::JoinFailed { reason } => write!(f, "join failed: {reason}"),
            Self::OffsetFailed { reason } => write!(f, "offset failed: {reason}"),
            Self::NotAPolyline { points } => {
                write!(f, "curve with {points} point(s) is not a polyline")
            }
        }
    }
}

impl std::error::Error for GeomError {}
