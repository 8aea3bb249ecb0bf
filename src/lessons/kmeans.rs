//! Lloyd's k-means, one assign + update iteration per step.
//!
//! Assignment picks the nearest centroid by squared Euclidean distance; ties
//! go to the lowest centroid index. Update moves each centroid to the mean
//! of its points; a centroid with no points stays where it is.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dataset::{gaussian_blobs, Point, MAX_CLASSES};
use crate::driver::{Metric, ParamEffect, Simulation, StepOutcome};
use crate::params::{ParamSet, ParamSpec};
use crate::prng::Prng;
use crate::render::{series_color, Scene, Style, INK, UNLABELED};

/// A centroid moving less than this counts as settled.
pub const EPSILON: f64 = 1e-3;

pub fn param_specs() -> Vec<ParamSpec> {
    vec![
        ParamSpec {
            key: "k",
            label: "K",
            description: "Number of centroids.",
            units: None,
            min: 1.0,
            max: MAX_CLASSES as f64,
            step: 1.0,
            default: 3.0,
        },
        ParamSpec {
            key: "clusters",
            label: "True clusters",
            description: "Blobs in the generated data.",
            units: None,
            min: 1.0,
            max: MAX_CLASSES as f64,
            step: 1.0,
            default: 3.0,
        },
        ParamSpec {
            key: "per_cluster",
            label: "Points per cluster",
            description: "Samples drawn around each blob center.",
            units: None,
            min: 5.0,
            max: 100.0,
            step: 1.0,
            default: 40.0,
        },
        ParamSpec {
            key: "spread",
            label: "Spread",
            description: "Standard deviation of each blob.",
            units: None,
            min: 0.2,
            max: 3.0,
            step: 0.1,
            default: 0.8,
        },
    ]
}

/// Index of the nearest centroid; first minimum wins ties.
pub fn nearest(p: &Point, centroids: &[(f64, f64)]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, c) in centroids.iter().enumerate() {
        let d = (p.x - c.0).powi(2) + (p.y - c.1).powi(2);
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

pub fn assign(points: &[Point], centroids: &[(f64, f64)]) -> Vec<Option<usize>> {
    points.iter().map(|p| nearest(p, centroids)).collect()
}

/// Mean of each cluster; empty clusters keep their previous centroid.
pub fn update(points: &[Point], assignment: &[Option<usize>], centroids: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let k = centroids.len();
    let mut sums = vec![(0.0, 0.0, 0usize); k];
    for (p, a) in points.iter().zip(assignment) {
        if let Some(c) = *a {
            if c < k {
                sums[c].0 += p.x;
                sums[c].1 += p.y;
                sums[c].2 += 1;
            }
        }
    }
    sums.iter()
        .zip(centroids)
        .map(|(&(sx, sy, n), &prev)| {
            if n == 0 {
                prev
            } else {
                (sx / n as f64, sy / n as f64)
            }
        })
        .collect()
}

/// Within-cluster sum of squares.
pub fn inertia(points: &[Point], assignment: &[Option<usize>], centroids: &[(f64, f64)]) -> f64 {
    points
        .iter()
        .zip(assignment)
        .filter_map(|(p, a)| a.and_then(|c| centroids.get(c)).map(|c| (p, c)))
        .map(|(p, c)| (p.x - c.0).powi(2) + (p.y - c.1).powi(2))
        .sum()
}

fn max_shift(a: &[(f64, f64)], b: &[(f64, f64)]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(p, q)| (p.0 - q.0).hypot(p.1 - q.1))
        .fold(0.0, f64::max)
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KmeansLesson {
    pub points: Vec<Point>,
    pub centroids: Vec<(f64, f64)>,
    pub assignment: Vec<Option<usize>>,
    /// Centroid positions after every iteration, starting with the seeds.
    pub centroid_trails: Vec<Vec<(f64, f64)>>,
    pub inertia_history: Vec<f64>,
    pub last_shift: f64,
    iteration: u32,
    converged: bool,
}

impl KmeansLesson {
    pub fn new(points: Vec<Point>, centroids: Vec<(f64, f64)>) -> Self {
        Self {
            assignment: vec![None; points.len()],
            centroid_trails: centroids.iter().map(|c| vec![*c]).collect(),
            points,
            centroids,
            inertia_history: Vec::new(),
            last_shift: 0.0,
            iteration: 0,
            converged: false,
        }
    }
}

impl Simulation for KmeansLesson {
    fn regenerate(&mut self, params: &ParamSet, rng: &mut Prng) {
        let clusters = params.get_usize("clusters").clamp(1, MAX_CLASSES);
        let centers: Vec<(f64, f64)> = (0..clusters)
            .map(|_| (rng.gen_range_f64(-5.0, 5.0), rng.gen_range_f64(-5.0, 5.0)))
            .collect();
        let points = gaussian_blobs(rng, &centers, params.get_usize("per_cluster"), params.get("spread"));
        let seeds = rng
            .sample_indices(points.len(), params.get_usize("k").clamp(1, MAX_CLASSES))
            .into_iter()
            .map(|i| (points[i].x, points[i].y))
            .collect();
        *self = Self::new(points, seeds);
    }

    fn step(&mut self, _params: &ParamSet) -> StepOutcome {
        if self.converged {
            return StepOutcome::Converged;
        }
        self.assignment = assign(&self.points, &self.centroids);
        let next = update(&self.points, &self.assignment, &self.centroids);
        self.last_shift = max_shift(&self.centroids, &next);
        self.centroids = next;
        for (trail, c) in self.centroid_trails.iter_mut().zip(&self.centroids) {
            trail.push(*c);
        }
        self.inertia_history
            .push(inertia(&self.points, &self.assignment, &self.centroids));
        self.iteration += 1;

        if self.last_shift < EPSILON {
            self.converged = true;
            StepOutcome::Converged
        } else {
            StepOutcome::Advanced
        }
    }

    fn iteration(&self) -> u32 {
        self.iteration
    }

    fn is_converged(&self) -> bool {
        self.converged
    }

    fn param_changed(&mut self, _key: &str, _params: &ParamSet) -> ParamEffect {
        // Every knob changes the data or the seeds.
        ParamEffect::Regenerate
    }

    fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("inertia", self.inertia_history.last().copied().unwrap_or(0.0)),
            Metric::new("max_shift", self.last_shift),
        ]
    }

    fn render(&self, scene: &mut Scene) {
        scene.fit(&self.points, 0.08);
        scene.axes();

        for (p, a) in self.points.iter().zip(&self.assignment) {
            let color = a.map(series_color).unwrap_or(UNLABELED);
            scene.circle("points", (p.x, p.y), 3.5, Style::fill(color).with_opacity(0.85));
        }
        for (i, trail) in self.centroid_trails.iter().enumerate() {
            scene.polyline("trails", trail.clone(), Style::stroke(series_color(i), 1.5).with_opacity(0.6));
        }
        for (i, c) in self.centroids.iter().enumerate() {
            scene.circle(
                "centroids",
                *c,
                8.0,
                Style::fill(series_color(i)).with_stroke(INK, 2.0),
            );
        }
    }

    fn reveal(&self) -> crate::timeline::Timeline {
        crate::timeline::Timeline::new()
            .fade_in("points", 400.0, 0.0)
            .fade_in("centroids", 300.0, 300.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 11.0),
            Point::new(11.0, 10.0),
        ]
    }

    #[test]
    fn ties_go_to_first_centroid() {
        let p = Point::new(0.0, 0.0);
        assert_eq!(nearest(&p, &[(1.0, 0.0), (-1.0, 0.0)]), Some(0));
        assert_eq!(nearest(&p, &[]), None);
    }

    #[test]
    fn empty_cluster_keeps_centroid() {
        let pts = two_groups();
        let centroids = [(0.0, 0.0), (100.0, 100.0), (10.0, 10.0)];
        let a = assign(&pts, &centroids);
        assert!(a.iter().all(|c| *c != Some(1)));
        let next = update(&pts, &a, &centroids);
        assert_eq!(next[1], (100.0, 100.0));
    }

    #[test]
    fn converges_on_fixed_seeds() {
        let mut lesson = KmeansLesson::new(two_groups(), vec![(0.0, 0.0), (1.0, 0.0)]);
        let params = ParamSet::new("kmeans", param_specs());
        let mut steps = 0;
        while lesson.step(&params) != StepOutcome::Converged {
            steps += 1;
            assert!(steps < 50);
        }
        let c0 = lesson.centroids[0];
        let c1 = lesson.centroids[1];
        let (low, high) = if c0.0 < c1.0 { (c0, c1) } else { (c1, c0) };
        assert!((low.0 - 1.0 / 3.0).abs() < 1e-9 && (low.1 - 1.0 / 3.0).abs() < 1e-9);
        assert!((high.0 - 31.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn idempotent_at_convergence() {
        let params = ParamSet::new("kmeans", param_specs());
        let mut lesson = KmeansLesson::default();
        lesson.regenerate(&params, &mut Prng::new(42));
        for _ in 0..200 {
            if lesson.step(&params) == StepOutcome::Converged {
                break;
            }
        }
        assert!(lesson.is_converged());

        let a = assign(&lesson.points, &lesson.centroids);
        let again = update(&lesson.points, &a, &lesson.centroids);
        assert!(max_shift(&lesson.centroids, &again) < EPSILON);
    }

    #[test]
    fn inertia_never_increases() {
        let params = ParamSet::new("kmeans", param_specs());
        let mut lesson = KmeansLesson::default();
        lesson.regenerate(&params, &mut Prng::new(7));
        for _ in 0..50 {
            lesson.step(&params);
        }
        for pair in lesson.inertia_history.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9);
        }
    }

    #[test]
    fn regenerate_resets_iteration() {
        let params = ParamSet::new("kmeans", param_specs());
        let mut lesson = KmeansLesson::default();
        let mut rng = Prng::new(9);
        lesson.regenerate(&params, &mut rng);
        lesson.step(&params);
        assert_eq!(lesson.iteration(), 1);
        lesson.regenerate(&params, &mut rng);
        assert_eq!(lesson.iteration(), 0);
        assert_eq!(lesson.centroids.len(), 3);
        assert!(lesson.assignment.iter().all(Option::is_none));
    }
}
