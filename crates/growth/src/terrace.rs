//! Terrace (ziggurat) growth: stacked inward offsets of an open U outline.
//!
//! Model
//! - Start from the U `(0,h) → (0,0) → (w,0) → (w,h)`. Each iteration emits the
//!   current outline, offsets it inward, and lifts the result by `step_height`.
//! - While fewer than `branch_limit` sprouts happened, an iteration sprouts
//!   with probability `prob_selection`: both tips get a rectangular elbow
//!   protrusion sized from the tip segment, and each protrusion emits its own
//!   mini-ziggurat that steps down and offsets outward.
//! - An offset failure ends the run after the current outline was emitted.

use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::{check_finite, run_rng, Growth, GrowthEngine, GrowthError, StopReason};
use crate::geom::{
    offset_curve, perpendicular, translate_points, CornerStyle, GeomError, Polyline,
    OFFSET_TOLERANCE,
};

/// Tip segments shorter than this do not sprout.
const MIN_TIP_LENGTH: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraceParams {
    pub base_w: f64,
    pub base_h: f64,
    pub iterations: usize,
    /// Inward offset per terrace (positive = left of travel = inside the U).
    pub offset_dist: f64,
    pub step_height: f64,
    pub prob_selection: f64,
    /// Protrusion depth and width as fractions of the tip segment length.
    pub prop_depth: f64,
    pub prop_width: f64,
    pub branch_limit: usize,
    pub branch_steps: usize,
    pub branch_offset: f64,
    pub branch_step_height: f64,
    /// `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for TerraceParams {
    fn default() -> Self {
        Self {
            base_w: 18.0,
            base_h: 12.0,
            iterations: 14,
            offset_dist: 1.0,
            step_height: 0.6,
            prob_selection: 0.2,
            prop_depth: 0.3,
            prop_width: 0.3,
            branch_limit: 3,
            branch_steps: 5,
            branch_offset: -0.5,
            branch_step_height: 0.6,
            seed: None,
        }
    }
}

impl TerraceParams {
    pub fn validate(&self) -> Result<(), GrowthError> {
        for (name, v) in [
            ("base_w", self.base_w),
            ("base_h", self.base_h),
            ("offset_dist", self.offset_dist),
            ("step_height", self.step_height),
            ("prob_selection", self.prob_selection),
            ("prop_depth", self.prop_depth),
            ("prop_width", self.prop_width),
            ("branch_offset", self.branch_offset),
            ("branch_step_height", self.branch_step_height),
        ] {
            check_finite(name, v)?;
        }
        if self.base_w <= 0.0 || self.base_h <= 0.0 {
            return Err(GrowthError::invalid("base_w and base_h must be > 0"));
        }
        Ok(())
    }

    /// The starting U outline at height zero.
    pub fn base_outline(&self) -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, self.base_h, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(self.base_w, 0.0, 0.0),
            Point3::new(self.base_w, self.base_h, 0.0),
        ]
    }
}

/// Which tip of the outline a protrusion grows from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tip {
    Head,
    Tail,
}

/// Three protrusion points `[p1, p2, p3]` for the tip at `tip` whose
/// neighbouring vertex is `elbow`; `None` for a degenerate tip segment.
///
/// `p1` steps sideways from the tip by `depth × L`, `p2` steps back along the
/// segment by `width × L`, `p3` returns to the segment line.
pub fn protrusion(
    tip: Point3<f64>,
    elbow: Point3<f64>,
    side: Tip,
    depth: f64,
    width: f64,
) -> Option<[Point3<f64>; 3]> {
    let tan = tip - elbow;
    let len = tan.norm();
    if len <= MIN_TIP_LENGTH {
        return None;
    }
    let tan = tan / len;
    let perp = match side {
        Tip::Head => perpendicular(tan),
        Tip::Tail => -perpendicular(tan),
    };
    let p1 = tip + perp * (len * depth);
    let p2 = p1 - tan * (len * width);
    let p3 = p2 - perp * (len * depth);
    Some([p1, p2, p3])
}

/// Mini-ziggurat under a protrusion: `steps` outlines, each one
/// `step_height` below the previous and offset by `offset`.
///
/// The first outline sits at the protrusion's own height. Stops early on an
/// offset failure (the failing outline is still included).
pub fn mini_ziggurat(
    start: Vec<Point3<f64>>,
    steps: usize,
    offset: f64,
    step_height: f64,
) -> Vec<Polyline> {
    let mut out = Vec::with_capacity(steps);
    let mut current = Polyline::new(start);
    for s in 0..steps {
        let dz = if s == 0 { 0.0 } else { -step_height };
        let moved = current.translated(&Vector3::new(0.0, 0.0, dz));
        out.push(moved.clone());
        match offset_curve(&moved, offset, OFFSET_TOLERANCE, CornerStyle::Sharp) {
            Ok(next) => current = next,
            Err(err) => {
                tracing::debug!(step = s, %err, "mini-ziggurat stopped");
                break;
            }
        }
    }
    out
}

/// One main terrace and the mini-ziggurats sprouted from its offset.
#[derive(Clone, Debug)]
pub struct TerraceLayer {
    pub terrace: Polyline,
    pub ziggurats: Vec<Polyline>,
    pub sprouted: bool,
}

/// Terrace growth run (owns the point list, sprout counter and RNG).
pub struct TerraceGrowth {
    params: TerraceParams,
    points: Vec<Point3<f64>>,
    branch_count: usize,
    iteration: usize,
    halted: Option<GeomError>,
    done: bool,
    rng: StdRng,
}

impl TerraceGrowth {
    pub fn new(params: TerraceParams) -> Result<Self, GrowthError> {
        params.validate()?;
        Ok(Self {
            points: params.base_outline(),
            rng: run_rng(params.seed),
            params,
            branch_count: 0,
            iteration: 0,
            halted: None,
            done: false,
        })
    }

    /// Number of sprouting iterations so far.
    #[inline]
    pub fn branch_count(&self) -> usize {
        self.branch_count
    }

    /// Emit the next terrace.
    ///
    /// When the offset of that terrace fails the terrace is still returned; the
    /// following call reports the failure.
    pub fn next_layer(&mut self) -> Result<Option<TerraceLayer>, GeomError> {
        if let Some(err) = self.halted.take() {
            self.done = true;
            return Err(err);
        }
        if self.done || self.iteration >= self.params.iterations {
            return Ok(None);
        }
        self.iteration += 1;

        let terrace = Polyline::new(self.points.clone());
        let layer = match self.advance(&terrace) {
            Ok((ziggurats, sprouted)) => TerraceLayer {
                terrace,
                ziggurats,
                sprouted,
            },
            Err(err) => {
                self.halted = Some(err);
                TerraceLayer {
                    terrace,
                    ziggurats: Vec::new(),
                    sprouted: false,
                }
            }
        };
        Ok(Some(layer))
    }

    /// Offset `terrace`, maybe sprout, lift; the lifted points become the next outline.
    fn advance(&mut self, terrace: &Polyline) -> Result<(Vec<Polyline>, bool), GeomError> {
        let p = &self.params;
        let offset = offset_curve(terrace, p.offset_dist, OFFSET_TOLERANCE, CornerStyle::Sharp)?;
        let mut next = offset
            .try_get_polyline()
            .ok_or(GeomError::NotAPolyline {
                points: offset.point_count(),
            })?
            .to_vec();

        let mut ziggurats = Vec::new();
        let sprouted =
            self.branch_count < p.branch_limit && self.rng.gen::<f64>() < p.prob_selection;
        if sprouted {
            let (depth, width) = (p.prop_depth, p.prop_width);
            let (tip, elbow) = (next[0], next[1]);
            if let Some([p1, p2, p3]) = protrusion(tip, elbow, Tip::Head, depth, width) {
                next.splice(0..0, [p3, p2, p1]);
                ziggurats.extend(mini_ziggurat(
                    vec![p3, p2, p1, tip],
                    p.branch_steps,
                    p.branch_offset,
                    p.branch_step_height,
                ));
            }
            let n = next.len();
            let (tip, elbow) = (next[n - 1], next[n - 2]);
            if let Some([p1, p2, p3]) = protrusion(tip, elbow, Tip::Tail, depth, width) {
                next.extend([p1, p2, p3]);
                ziggurats.extend(mini_ziggurat(
                    vec![tip, p1, p2, p3],
                    p.branch_steps,
                    p.branch_offset,
                    p.branch_step_height,
                ));
            }
            self.branch_count += 1;
        }

        self.points = translate_points(&next, &Vector3::new(0.0, 0.0, p.step_height));
        Ok((ziggurats, sprouted))
    }
}

impl GrowthEngine for TerraceGrowth {
    type Params = TerraceParams;
    type Output = Growth;

    fn params(&self) -> &Self::Params {
        &self.params
    }

    fn grow(mut self) -> Growth {
        let mut history = Vec::new();
        loop {
            match self.next_layer() {
                Ok(Some(layer)) => {
                    history.push(layer.terrace);
                    history.extend(layer.ziggurats);
                }
                Ok(None) => {
                    return Growth {
                        history,
                        stop: StopReason::Completed,
                    }
                }
                Err(error) => {
                    // the failing terrace was the last one started
                    let iteration = self.iteration.saturating_sub(1);
                    tracing::debug!(iteration, %error, "terrace growth aborted");
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
    use nalgebra::point;

    fn seeded(seed: u64) -> TerraceParams {
        TerraceParams {
            seed: Some(seed),
            ..TerraceParams::default()
        }
    }

    #[test]
    fn seed_one_is_reproducible() {
        let a = TerraceGrowth::new(seeded(1)).unwrap().grow();
        let b = TerraceGrowth::new(seeded(1)).unwrap().grow();
        assert_eq!(a.history.len(), b.history.len());
        assert_eq!(a.history[0], b.history[0]);
        assert_eq!(a.history, b.history);
        assert_eq!(a.history[0].points(), seeded(1).base_outline().as_slice());
    }

    #[test]
    fn plain_stack_collapses_after_nine_terraces() {
        let params = TerraceParams {
            prob_selection: 0.0,
            ..seeded(5)
        };
        let out = TerraceGrowth::new(params).unwrap().grow();
        // width 18 shrinks by 2 per terrace; the 9th (width 2) cannot be offset
        assert_eq!(out.history.len(), 9);
        assert!(matches!(
            out.stop,
            StopReason::Aborted {
                iteration: 8,
                error: GeomError::OffsetFailed { .. }
            }
        ));
        for (k, t) in out.history.iter().enumerate() {
            let z = 0.6 * k as f64;
            assert!(t.points().iter().all(|p| (p.z - z).abs() < 1e-9));
            let k = k as f64;
            assert!((t.points()[1] - point![k, k, z]).norm() < 1e-9);
        }
    }

    #[test]
    fn history_bounded_when_nothing_sprouts() {
        for n in [0usize, 1, 3, 8] {
            let params = TerraceParams {
                iterations: n,
                prob_selection: 0.0,
                ..seeded(2)
            };
            let out = TerraceGrowth::new(params).unwrap().grow();
            assert!(out.history.len() <= n);
            assert_eq!(out.completed(), n <= 8);
        }
    }

    #[test]
    fn sprouts_respect_branch_limit() {
        let params = TerraceParams {
            prob_selection: 1.0,
            branch_limit: 1,
            ..seeded(3)
        };
        let mut run = TerraceGrowth::new(params).unwrap();
        let mut layers = Vec::new();
        while let Some(layer) = run.next_layer().unwrap() {
            layers.push(layer);
        }
        assert_eq!(run.branch_count(), 1);
        assert!(layers[0].sprouted);
        assert!(layers.iter().skip(1).all(|l| !l.sprouted));
        // two protrusions, five steps each
        assert_eq!(layers[0].ziggurats.len(), 10);
        // the next outline carries three extra points per side
        assert_eq!(layers[1].terrace.point_count(), 10);
    }

    #[test]
    fn sprouted_stack_outgrows_the_plain_one() {
        for branch_limit in [1usize, 3] {
            let params = TerraceParams {
                prob_selection: 1.0,
                branch_limit,
                ..seeded(4)
            };
            let mut run = TerraceGrowth::new(params.clone()).unwrap();
            let mut terraces = 0;
            while run.next_layer().unwrap().is_some() {
                terraces += 1;
            }
            // a plain stack stops after nine; protrusions must not cut it short
            assert_eq!(terraces, params.iterations);
            assert_eq!(run.branch_count(), branch_limit);
            assert!(TerraceGrowth::new(params).unwrap().grow().completed());
        }
    }

    #[test]
    fn zero_offset_stacks_rigid_copies() {
        let params = TerraceParams {
            offset_dist: 0.0,
            prob_selection: 0.0,
            step_height: 0.75,
            ..seeded(6)
        };
        let out = TerraceGrowth::new(params).unwrap().grow();
        assert!(out.completed());
        assert_eq!(out.history.len(), 14);
        let lift = Vector3::new(0.0, 0.0, 0.75);
        for w in out.history.windows(2) {
            let expected = w[0].translated(&lift);
            assert_eq!(w[1].point_count(), expected.point_count());
            for (a, b) in w[1].points().iter().zip(expected.points()) {
                assert!((a - b).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn mini_ziggurat_steps_down_and_outward() {
        let start = vec![
            point![0.0, 0.0, 2.0],
            point![1.0, 0.0, 2.0],
            point![1.0, 1.0, 2.0],
            point![0.0, 1.0, 2.0],
        ];
        let zig = mini_ziggurat(start.clone(), 4, -0.5, 0.6);
        assert_eq!(zig.len(), 4);
        assert_eq!(zig[0].points(), start.as_slice());
        for (s, c) in zig.iter().enumerate() {
            let z = 2.0 - 0.6 * s as f64;
            assert!(c.points().iter().all(|p| (p.z - z).abs() < 1e-9));
        }
        assert!(zig[3].length() > zig[0].length());
    }

    #[test]
    fn protrusion_shapes() {
        let tip = point![1.0, 12.0, 0.0];
        let elbow = point![1.0, 1.0, 0.0];
        let [p1, p2, p3] = protrusion(tip, elbow, Tip::Head, 0.3, 0.3).unwrap();
        assert!((p1 - point![4.3, 12.0, 0.0]).norm() < 1e-9);
        assert!((p2 - point![4.3, 8.7, 0.0]).norm() < 1e-9);
        assert!((p3 - point![1.0, 8.7, 0.0]).norm() < 1e-9);
        let [q1, _, _] = protrusion(tip, elbow, Tip::Tail, 0.3, 0.3).unwrap();
        assert!((q1 - point![-2.3, 12.0, 0.0]).norm() < 1e-9);
        assert!(protrusion(tip, tip, Tip::Head, 0.3, 0.3).is_none());
    }

    #[test]
    fn rejects_bad_base() {
        let params = TerraceParams {
            base_w: 0.0,
            ..TerraceParams::default()
        };
        assert!(TerraceGrowth::new(params).is_err());
    }
}
