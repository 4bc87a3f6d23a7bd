//! Attractor path growth: jittered walks from seed points toward a center.
//!
//! Model
//! - Every seed grows its own path. A step combines the unit pull toward the
//!   center (strength varies deterministically with the seed index) and a
//!   flattened random jitter, then advances by `step` along the normalized sum.
//! - A path stops when it is within `starve` of the center, when the combined
//!   direction vanishes, or after `steps` steps.
//! - Each path draws from its own stream `ReplayToken { seed, index }`, so a
//!   path can be regrown alone and paths never depend on each other.

use nalgebra::{Point3, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::{check_finite, uniform, GrowthEngine, GrowthError, ReplayToken};
use crate::geom::{unitize, Polyline};

/// Vertical jitter is drawn from a band this wide (horizontal is ±1).
const JITTER_Z_BAND: f64 = 0.35;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttractorParams {
    pub center: Point3<f64>,
    pub seeds: Vec<Point3<f64>>,
    /// Maximum steps per path.
    pub steps: usize,
    pub step: f64,
    pub attract: f64,
    pub jitter: f64,
    /// Paths stop once within this distance of `center`.
    pub starve: f64,
    pub seed: u64,
}

impl Default for AttractorParams {
    fn default() -> Self {
        Self {
            center: Point3::origin(),
            seeds: vec![
                Point3::new(20.0, 0.0, 0.0),
                Point3::new(-20.0, 0.0, 0.0),
                Point3::new(0.0, 20.0, 0.0),
                Point3::new(0.0, -20.0, 0.0),
            ],
            steps: 120,
            step: 1.0,
            attract: 1.0,
            jitter: 0.35,
            starve: 6.0,
            seed: 1,
        }
    }
}

impl AttractorParams {
    pub fn validate(&self) -> Result<(), GrowthError> {
        for (name, v) in [
            ("step", self.step),
            ("attract", self.attract),
            ("jitter", self.jitter),
            ("starve", self.starve),
        ] {
            check_finite(name, v)?;
        }
        if self
            .seeds
            .iter()
            .chain(std::iter::once(&self.center))
            .any(|p| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(GrowthError::invalid("center and seeds must be finite"));
        }
        Ok(())
    }

    /// Attraction strength for the path grown from seed `index`
    /// (cycles through 0.75×, 0.875×, …, 1.25× of `attract`).
    #[inline]
    pub fn attraction_for(&self, index: usize) -> f64 {
        self.attract * (0.75 + 0.5 * (index % 5) as f64 / 4.0)
    }
}

/// Random direction scaled to `scale`; zero when the raw draw is exactly zero.
pub fn jitter_vector<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> Vector3<f64> {
    let raw = Vector3::new(
        uniform(rng, -1.0, 1.0),
        uniform(rng, -1.0, 1.0),
        uniform(rng, -JITTER_Z_BAND, JITTER_Z_BAND),
    );
    scaled_direction(raw, scale)
}

fn scaled_direction(raw: Vector3<f64>, scale: f64) -> Vector3<f64> {
    if raw == Vector3::zeros() {
        return Vector3::zeros();
    }
    raw * (scale / raw.norm())
}

/// Per-seed point lists in seed order.
#[derive(Clone, Debug, PartialEq)]
pub struct Paths {
    pub points: Vec<Vec<Point3<f64>>>,
}

impl Paths {
    /// One curve per path; a path that never moved is a single-point curve.
    pub fn curves(&self) -> Vec<Polyline> {
        self.points.iter().cloned().map(Polyline::new).collect()
    }
}

/// Attractor growth run over all seeds.
pub struct AttractorGrowth {
    params: AttractorParams,
}

impl AttractorGrowth {
    pub fn new(params: AttractorParams) -> Result<Self, GrowthError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Grow the path for seed `index` alone. `None` if there is no such seed.
    pub fn regrow_path(&self, index: usize) -> Option<Vec<Point3<f64>>> {
        let start = *self.params.seeds.get(index)?;
        Some(grow_path(&self.params, start, index))
    }
}

fn grow_path(params: &AttractorParams, start: Point3<f64>, index: usize) -> Vec<Point3<f64>> {
    let mut rng = ReplayToken {
        seed: params.seed,
        index: index as u64,
    }
    .to_std_rng();
    let strength = params.attraction_for(index);
    let mut pts = vec![start];
    let mut last = start;
    for _ in 0..params.steps {
        let to_center = params.center - last;
        if to_center.norm() <= params.starve {
            break;
        }
        let pull = unitize(to_center).unwrap_or(to_center);
        let direction = pull * strength + jitter_vector(params.jitter, &mut rng);
        let Some(direction) = unitize(direction) else {
            break;
        };
        last += direction * params.step;
        pts.push(last);
    }
    tracing::trace!(index, len = pts.len(), "attractor path");
    pts
}

impl GrowthEngine for AttractorGrowth {
    type Params = AttractorParams;
    type Output = Paths;

    fn params(&self) -> &Self::Params {
        &self.params
    }

    fn grow(self) -> Paths {
        let points = self
            .params
            .seeds
            .iter()
            .enumerate()
            .map(|(index, &start)| grow_path(&self.params, start, index))
            .collect();
        Paths { points }
    }
}
