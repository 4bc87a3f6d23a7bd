//! Tree-branch growth: trim, sprout flat branches, join, offset, lift.
//!
//! Model
//! - Each iteration trims the current curve symmetrically (the trim grows by
//!   `decay_rate × length` per step but never leaves less than 35% of the
//!   start length), grows square-spiral branches at either end with
//!   probability `min(1.3 × prob, 0.9)`, joins everything into one curve,
//!   offsets it in plan by a tapering jittered distance and lifts it by
//!   `z_dist`.
//! - A failed trim or join ends the run; a failed offset keeps the joined
//!   curve for that layer.
//!
//! Code cross-refs: `engine::{GrowthEngine, Growth}`, `geom::{offset_curve, join_curves}`

use std::f64::consts::FRAC_PI_2;

use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::{
    check_finite, run_rng, uniform, Growth, GrowthEngine, GrowthError, StopReason,
};
use crate::geom::{
    join_curves, offset_curve, rotate_about_z, unitize, CornerStyle, GeomError, Polyline,
    JOIN_TOLERANCE, OFFSET_TOLERANCE,
};

/// Trimmed length never drops below this fraction of the start curve length.
pub const MIN_LENGTH_FRACTION: f64 = 0.35;
/// Branch probability multiplier and cap.
const BRANCH_PROB_BOOST: f64 = 1.3;
const BRANCH_PROB_CAP: f64 = 0.9;

/// Knobs for one tree-branch run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchParams {
    pub iterations: usize,
    /// Initial trim removed from each end.
    pub step_base: f64,
    /// Base in-plane offset distance (before taper and jitter).
    pub xy_off: f64,
    pub z_dist: f64,
    pub prob: f64,
    /// Per-iteration shrink applied to offsets and first branch lengths.
    pub taper_factor: f64,
    /// Fraction of the current length added to the trim each iteration.
    pub decay_rate: f64,
    pub min_l1: f64,
    pub max_l1: f64,
    /// Relative jitter on the first branch segment length.
    pub jitter: f64,
    pub branch_scale_min: f64,
    pub branch_scale_max: f64,
    pub branch_segment_min: usize,
    pub branch_segment_max: usize,
    pub seed: u64,
}

impl Default for BranchParams {
    fn default() -> Self {
        Self {
            iterations: 10,
            step_base: 0.1,
            xy_off: 1.0,
            z_dist: 1.0,
            prob: 0.5,
            taper_factor: 0.98,
            decay_rate: 0.01,
            min_l1: 2.5,
            max_l1: 6.0,
            jitter: 0.35,
            branch_scale_min: 0.65,
            branch_scale_max: 0.95,
            branch_segment_min: 3,
            branch_segment_max: 6,
            seed: 1,
        }
    }
}

impl BranchParams {
    pub fn validate(&self) -> Result<(), GrowthError> {
        for (name, v) in [
            ("step_base", self.step_base),
            ("xy_off", self.xy_off),
            ("z_dist", self.z_dist),
            ("prob", self.prob),
            ("taper_factor", self.taper_factor),
            ("decay_rate", self.decay_rate),
            ("min_l1", self.min_l1),
            ("max_l1", self.max_l1),
            ("jitter", self.jitter),
            ("branch_scale_min", self.branch_scale_min),
            ("branch_scale_max", self.branch_scale_max),
        ] {
            check_finite(name, v)?;
        }
        if self.step_base < 0.0 || self.decay_rate < 0.0 {
            return Err(GrowthError::invalid("step_base and decay_rate must be >= 0"));
        }
        if self.prob < 0.0 || self.jitter < 0.0 {
            return Err(GrowthError::invalid("prob and jitter must be >= 0"));
        }
        if self.taper_factor <= 0.0 {
            return Err(GrowthError::invalid("taper_factor must be > 0"));
        }
        if self.min_l1 < 0.0 || self.min_l1 > self.max_l1 {
            return Err(GrowthError::invalid("0 <= min_l1 <= max_l1 required"));
        }
        if self.branch_scale_min > self.branch_scale_max {
            return Err(GrowthError::invalid(
                "branch_scale_min <= branch_scale_max required",
            ));
        }
        if self.branch_segment_min > self.branch_segment_max {
            return Err(GrowthError::invalid(
                "branch_segment_min <= branch_segment_max required",
            ));
        }
        Ok(())
    }

    #[inline]
    fn taper(&self, iteration: usize) -> f64 {
        self.taper_factor.powf(iteration as f64)
    }
}

/// Where and how a branch sprouts.
#[derive(Clone, Copy, Debug)]
pub struct BranchSpec {
    pub start: Point3<f64>,
    pub direction: Vector3<f64>,
    /// Turn right (clockwise) at every segment instead of left.
    pub clockwise: bool,
    pub iteration: usize,
}

/// Grow one flat branch: connected line segments at the start point's height,
/// each turned 90° from the previous heading.
///
/// Returns no segments when `spec.direction` cannot be unitized.
pub fn grow_branch<R: Rng + ?Sized>(
    spec: &BranchSpec,
    params: &BranchParams,
    rng: &mut R,
) -> Vec<Polyline> {
    let Some(mut dir) = unitize(spec.direction) else {
        return Vec::new();
    };
    let count = rng.gen_range(params.branch_segment_min..=params.branch_segment_max);
    let mut current = first_segment_length(params, spec.iteration, rng);
    let scale = uniform(rng, params.branch_scale_min, params.branch_scale_max);
    let angle = if spec.clockwise { -FRAC_PI_2 } else { FRAC_PI_2 };

    let mut pos = spec.start;
    let mut lines = Vec::with_capacity(count);
    for j in 0..count {
        dir = rotate_about_z(dir, angle);
        let len = if j == 0 {
            current
        } else {
            current * uniform(rng, 0.7, 1.1)
        };
        let next = Point3::new(pos.x + dir.x * len, pos.y + dir.y * len, pos.z);
        lines.push(Polyline::line(pos, next));
        pos = next;
        current *= scale;
    }
    lines
}

fn first_segment_length<R: Rng + ?Sized>(
    params: &BranchParams,
    iteration: usize,
    rng: &mut R,
) -> f64 {
    let base = uniform(rng, params.min_l1, params.max_l1) * params.taper(iteration);
    let jitter = base * params.jitter;
    base + uniform(rng, -jitter, jitter)
}

/// One accepted iteration with its diagnostics.
#[derive(Clone, Debug)]
pub struct BranchLayer {
    pub curve: Polyline,
    /// Length of the incoming curve before trimming.
    pub source_length: f64,
    pub trimmed_length: f64,
    pub start_segments: usize,
    pub end_segments: usize,
    /// False when the offset failed and the joined curve was kept.
    pub offset_applied: bool,
}

/// Tree-branch growth run (owns the current curve, trim and RNG).
pub struct BranchGrowth {
    params: BranchParams,
    current: Polyline,
    current_trim: f64,
    min_length: f64,
    iteration: usize,
    rng: StdRng,
}

impl BranchGrowth {
    pub fn new(start: Polyline, params: BranchParams) -> Result<Self, GrowthError> {
        params.validate()?;
        if start.try_get_polyline().is_none() {
            return Err(GrowthError::invalid("start curve needs at least two points"));
        }
        let min_length = start.length() * MIN_LENGTH_FRACTION;
        Ok(Self {
            current_trim: params.step_base,
            rng: run_rng(Some(params.seed)),
            params,
            current: start,
            min_length,
            iteration: 0,
        })
    }

    /// Length floor for trimmed curves (35% of the start length).
    #[inline]
    pub fn min_length(&self) -> f64 {
        self.min_length
    }

    /// Advance one iteration. `Ok(None)` once `iterations` layers were produced.
    pub fn next_layer(&mut self) -> Result<Option<BranchLayer>, GeomError> {
        if self.iteration >= self.params.iterations {
            return Ok(None);
        }
        let i = self.iteration;
        self.iteration += 1;

        let total = self.current.length();
        let potential = self.current_trim + total * self.params.decay_rate;
        self.current_trim = if total - 2.0 * potential > self.min_length {
            potential
        } else {
            (total - self.min_length) / 2.0
        }
        .max(0.0);
        let t0 = self.current_trim / total;
        let shrunk = self.current.trim(t0, 1.0 - t0)?;
        let trimmed_length = shrunk.length();

        let ends = shrunk
            .try_get_polyline()
            .map(|pts| (pts[0], pts[1], pts[pts.len() - 1], pts[pts.len() - 2]));
        let mut pieces = vec![shrunk];
        let (mut start_segments, mut end_segments) = (0, 0);
        if let Some((p0, p1, pn, pm)) = ends {
            let prob = (self.params.prob * BRANCH_PROB_BOOST).min(BRANCH_PROB_CAP);

            if self.rng.gen::<f64>() < prob {
                let spec = BranchSpec {
                    start: p0,
                    direction: p0 - p1,
                    clockwise: true,
                    iteration: i,
                };
                let branch = grow_branch(&spec, &self.params, &mut self.rng);
                start_segments = branch.len();
                // runs outward from p0; flip so the joined path ends at p0
                let mut head: Vec<Polyline> = branch.iter().rev().map(Polyline::reversed).collect();
                head.append(&mut pieces);
                pieces = head;
            }
            if self.rng.gen::<f64>() < prob {
                let spec = BranchSpec {
                    start: pn,
                    direction: pn - pm,
                    clockwise: false,
                    iteration: i,
                };
                let branch = grow_branch(&spec, &self.params, &mut self.rng);
                end_segments = branch.len();
                pieces.extend(branch);
            }
        }

        let joined = join_curves(&pieces, JOIN_TOLERANCE)?
            .into_iter()
            .next()
            .ok_or_else(|| GeomError::JoinFailed {
                reason: "join produced no curve".to_string(),
            })?;

        let distance = self.params.xy_off * self.params.taper(i) * uniform(&mut self.rng, 0.8, 1.2);
        let (curve, offset_applied) =
            match offset_curve(&joined, distance, OFFSET_TOLERANCE, CornerStyle::Sharp) {
                Ok(c) => (c, true),
                Err(err) => {
                    tracing::debug!(iteration = i, distance, %err, "offset failed; keeping joined curve");
                    (joined, false)
                }
            };

        let lifted = curve.translated(&Vector3::new(0.0, 0.0, self.params.z_dist));
        self.current = lifted.clone();
        tracing::trace!(
            iteration = i,
            trim = self.current_trim,
            trimmed_length,
            start_segments,
            end_segments,
            "branch layer"
        );
        Ok(Some(BranchLayer {
            curve: lifted,
            source_length: total,
            trimmed_length,
            start_segments,
            end_segments,
            offset_applied,
        }))
    }
}

impl GrowthEngine for BranchGrowth {
    type Params = BranchParams;
    type Output = Growth;

    fn params(&self) -> &Self::Params {
        &self.params
    }

    fn grow(mut self) -> Growth {
        let mut history = Vec::with_capacity(self.params.iterations.min(1024));
        loop {
            let iteration = self.iteration;
            match self.next_layer() {
                Ok(Some(layer)) => history.push(layer.curve),
                Ok(None) => {
                    return Growth {
                        history,
                        stop: StopReason::Completed,
                    }
                }
                Err(error) => {
                    tracing::debug!(iteration, %error, "branch growth aborted");
                    return Growth {
                        history,
                        stop: StopReason::Aborted { iteration, error },
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{point, vector};
    use rand::SeedableRng;

    fn straight(len: f64) -> Polyline {
        Polyline::line(point![0.0, 0.0, 0.0], point![len, 0.0, 0.0])
    }

    #[test]
    fn history_bounded_by_iterations() {
        for n in [0usize, 1, 5, 12] {
            let params = BranchParams {
                iterations: n,
                ..BranchParams::default()
            };
            let out = BranchGrowth::new(straight(30.0), params).unwrap().grow();
            assert!(out.history.len() <= n);
        }
    }

    #[test]
    fn layers_stack_rigidly_along_z() {
        let params = BranchParams {
            z_dist: 0.5,
            ..BranchParams::default()
        };
        let out = BranchGrowth::new(straight(30.0), params).unwrap().grow();
        assert!(!out.history.is_empty());
        for (k, layer) in out.history.iter().enumerate() {
            let z = 0.5 * (k + 1) as f64;
            assert!(layer.points().iter().all(|p| (p.z - z).abs() < 1e-9));
        }
    }

    #[test]
    fn fixed_seed_reproduces_history() {
        let params = BranchParams {
            iterations: 8,
            seed: 99,
            ..BranchParams::default()
        };
        let a = BranchGrowth::new(straight(25.0), params.clone()).unwrap().grow();
        let b = BranchGrowth::new(straight(25.0), params).unwrap().grow();
        assert_eq!(a.history, b.history);
        assert_eq!(a.stop, b.stop);
    }

    #[test]
    fn branch_with_fixed_count_is_connected() {
        let params = BranchParams {
            branch_segment_min: 4,
            branch_segment_max: 4,
            ..BranchParams::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        for clockwise in [true, false] {
            let spec = BranchSpec {
                start: point![1.0, 2.0, 3.0],
                direction: vector![1.0, 1.0, 0.0],
                clockwise,
                iteration: 2,
            };
            let lines = grow_branch(&spec, &params, &mut rng);
            assert_eq!(lines.len(), 4);
            assert_eq!(lines[0].first(), Some(spec.start));
            for w in lines.windows(2) {
                assert_eq!(w[0].last(), w[1].first());
                let a = w[0].last().unwrap() - w[0].first().unwrap();
                let b = w[1].last().unwrap() - w[1].first().unwrap();
                assert!(a.dot(&b).abs() < 1e-9 * a.norm() * b.norm());
            }
            assert!(lines
                .iter()
                .flat_map(|l| l.points().iter())
                .all(|p| p.z == 3.0));
        }
    }

    #[test]
    fn zero_direction_yields_no_branch() {
        let mut rng = StdRng::seed_from_u64(0);
        let spec = BranchSpec {
            start: point![0.0, 0.0, 0.0],
            direction: vector![0.0, 0.0, 0.0],
            clockwise: true,
            iteration: 0,
        };
        assert!(grow_branch(&spec, &BranchParams::default(), &mut rng).is_empty());
    }

    #[test]
    fn trimmed_length_respects_floor() {
        let params = BranchParams {
            iterations: 40,
            decay_rate: 0.08,
            ..BranchParams::default()
        };
        let mut run = BranchGrowth::new(straight(20.0), params).unwrap();
        let floor = run.min_length();
        while let Ok(Some(layer)) = run.next_layer() {
            if layer.source_length >= floor {
                assert!(layer.trimmed_length > floor - 1e-9);
            }
        }
    }

    #[test]
    fn no_branches_when_prob_is_zero() {
        let params = BranchParams {
            prob: 0.0,
            iterations: 6,
            ..BranchParams::default()
        };
        let mut run = BranchGrowth::new(straight(20.0), params).unwrap();
        let mut last_len = f64::INFINITY;
        while let Ok(Some(layer)) = run.next_layer() {
            assert_eq!(layer.start_segments + layer.end_segments, 0);
            assert_eq!(layer.curve.point_count(), 2);
            assert!(layer.trimmed_length < last_len);
            last_len = layer.trimmed_length;
        }
    }

    #[test]
    fn branched_layers_are_offset() {
        let start = Polyline::new(vec![
            point![0.0, 0.0, 0.0],
            point![15.0, 5.0, 0.0],
            point![30.0, 0.0, 0.0],
        ]);
        let (mut branched, mut offset) = (0usize, 0usize);
        for seed in 1..=10 {
            let params = BranchParams {
                seed,
                ..BranchParams::default()
            };
            let mut run = BranchGrowth::new(start.clone(), params).unwrap();
            while let Some(layer) = run.next_layer().unwrap() {
                if layer.start_segments + layer.end_segments > 0 {
                    branched += 1;
                    offset += usize::from(layer.offset_applied);
                }
            }
        }
        assert!(branched > 40);
        // only truly degenerate curves keep the joined fallback
        assert!(offset * 10 >= branched * 9, "{offset} of {branched} offset");
    }

    #[test]
    fn untrimmed_unbranched_layers_are_rigid_copies() {
        let start = Polyline::new(vec![
            point![0.0, 0.0, 0.0],
            point![4.0, 3.0, 0.0],
            point![9.0, -1.0, 0.0],
            point![12.0, 2.0, 0.0],
        ]);
        let params = BranchParams {
            step_base: 0.0,
            decay_rate: 0.0,
            xy_off: 0.0,
            prob: 0.0,
            z_dist: 1.5,
            ..BranchParams::default()
        };
        let out = BranchGrowth::new(start.clone(), params).unwrap().grow();
        assert!(out.completed());
        let lift = vector![0.0, 0.0, 1.5];
        let mut below = start;
        for layer in &out.history {
            let expected = below.translated(&lift);
            assert_eq!(layer.point_count(), expected.point_count());
            for (a, b) in layer.points().iter().zip(expected.points()) {
                assert!((a - b).norm() < 1e-9, "{a} vs {b}");
            }
            below = layer.clone();
        }
    }

    #[test]
    fn degenerate_start_aborts_immediately() {
        let dot = Polyline::line(point![1.0, 1.0, 0.0], point![1.0, 1.0, 0.0]);
        let out = BranchGrowth::new(dot, BranchParams::default()).unwrap().grow();
        assert!(out.history.is_empty());
        assert!(matches!(
            out.stop,
            StopReason::Aborted {
                iteration: 0,
                error: GeomError::TrimFailed { .. }
            }
        ));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let bad = BranchParams {
            branch_segment_min: 7,
            branch_segment_max: 3,
            ..BranchParams::default()
        };
        assert!(BranchGrowth::new(straight(5.0), bad).is_err());
        let bad = BranchParams {
            taper_factor: f64::NAN,
            ..BranchParams::default()
        };
        assert!(BranchGrowth::new(straight(5.0), bad).is_err());
        let single = Polyline::new(vec![point![0.0, 0.0, 0.0]]);
        assert!(BranchGrowth::new(single, BranchParams::default()).is_err());
    }
}
