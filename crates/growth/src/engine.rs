//! Shared shape of the growth engines: iterate → perturb → accumulate.
//!
//! Why this design
//! - Each engine is built from a validated params snapshot and consumed by
//!   `grow`, so exactly one live state exists per run.
//! - Kernel failures never surface as `Err`: the run stops and returns the
//!   history accumulated so far together with the reason (`StopReason`).
//! - Randomness is always an explicit, seeded `StdRng`; replay tokens make a
//!   single path or run reproducible without replaying its neighbours.
//!
//! Code cross-refs: `branches::BranchGrowth`, `terrace::TerraceGrowth`,
//! `attractor::AttractorGrowth`, `geom::GeomError`

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{GeomError, Polyline};

/// Common trait for growth runs.
pub trait GrowthEngine {
    type Params: Clone;
    type Output;

    fn params(&self) -> &Self::Params;

    /// Run the loop to completion (or first abort) and return the result.
    fn grow(self) -> Self::Output;
}

/// Why a run stopped.
#[derive(Clone, Debug, PartialEq)]
pub enum StopReason {
    Completed,
    Aborted { iteration: usize, error: GeomError },
}

/// Ordered layer history of a run plus the stop reason.
#[derive(Clone, Debug)]
pub struct Growth {
    pub history: Vec<Polyline>,
    pub stop: StopReason,
}

impl Growth {
    #[inline]
    pub fn completed(&self) -> bool {
        self.stop == StopReason::Completed
    }
}

/// Parameter validation failure, reported by engine constructors.
#[derive(Debug, Clone, PartialEq)]
pub enum GrowthError {
    InvalidParams { reason: String },
}

impl GrowthError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GrowthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParams { reason } => write!(f, "invalid growth params: {reason}"),
        }
    }
}

impl std::error::Error for GrowthError {}

/// Replay token for one independently seeded stream (a run or a single path).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayToken {
    pub seed: u64,
    pub index: u64,
}

impl ReplayToken {
    /// Per-index offset into the mixed seed.
    pub const INDEX_MULTIPLIER: u64 = 9973;

    /// Generator for this token: mixed global seed plus `index × 9973`.
    ///
    /// Depends only on `(seed, index)`, never on other streams.
    pub fn to_std_rng(self) -> StdRng {
        let base = mix(self.seed);
        StdRng::seed_from_u64(base.wrapping_add(self.index.wrapping_mul(Self::INDEX_MULTIPLIER)))
    }
}

/// SplitMix64 finalizer.
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

/// Run generator from an optional seed (`None` draws from OS entropy).
pub fn run_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Uniform draw between `a` and `b`; either order is fine and `a == b` returns `a`.
#[inline]
pub fn uniform<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> f64 {
    a + (b - a) * rng.gen::<f64>()
}

pub(crate) fn check_finite(name: &str, v: f64) -> Result<(), GrowthError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(GrowthError::invalid(format!("{name} must be finite")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn replay_streams_are_independent_of_order() {
        let a = ReplayToken { seed: 1, index: 0 };
        let b = ReplayToken { seed: 1, index: 3 };
        let first_b = b.to_std_rng().next_u64();
        let _ = a.to_std_rng().next_u64();
        assert_eq!(b.to_std_rng().next_u64(), first_b);
        assert_ne!(a.to_std_rng().next_u64(), first_b);
        let other_seed = ReplayToken { seed: 2, index: 3 };
        assert_ne!(other_seed.to_std_rng().next_u64(), first_b);
    }

    #[test]
    fn uniform_accepts_reversed_and_empty_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let v = uniform(&mut rng, 1.1, 0.7);
            assert!((0.7..=1.1).contains(&v));
        }
        assert_eq!(uniform(&mut rng, 2.0, 2.0), 2.0);
    }
}
