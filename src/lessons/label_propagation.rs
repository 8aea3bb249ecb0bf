//! Semi-supervised label propagation and label spreading on a kNN graph.
//!
//! The graph is built once per dataset: every point links to its `k` nearest
//! neighbours (symmetrized) with Gaussian-kernel weights
//! `exp(-d² / 2σ²)`. Each step is a synchronous sweep in which a node takes
//! the weighted average of its neighbours' class distributions.
//!
//! - **Propagation**: labeled nodes are clamped to their one-hot label.
//! - **Spreading**: labeled nodes are softly anchored,
//!   `α·average + (1 - α)·one_hot`.
//!
//! Distributions stay normalised because every update is a convex
//! combination of distributions.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dataset::{gaussian_blobs, partially_labeled, Point, MAX_CLASSES};
use crate::driver::{Metric, ParamEffect, Simulation, StepOutcome};
use crate::params::{ParamSet, ParamSpec};
use crate::prng::Prng;
use crate::render::{series_color, Scene, Style, GRID, INK};

/// Largest per-entry probability change that still counts as settled.
pub const TOLERANCE: f64 = 1e-4;

pub fn param_specs() -> Vec<ParamSpec> {
    vec![
        ParamSpec {
            key: "classes",
            label: "Classes",
            description: "Number of classes (blobs).",
            units: None,
            min: 2.0,
            max: MAX_CLASSES as f64,
            step: 1.0,
            default: 3.0,
        },
        ParamSpec {
            key: "per_class",
            label: "Points per class",
            description: "Samples per class, most of them unlabeled.",
            units: None,
            min: 5.0,
            max: 100.0,
            step: 1.0,
            default: 40.0,
        },
        ParamSpec {
            key: "labeled_per_class",
            label: "Labeled per class",
            description: "How many points of each class keep their label.",
            units: None,
            min: 1.0,
            max: 10.0,
            step: 1.0,
            default: 2.0,
        },
        ParamSpec {
            key: "neighbors",
            label: "Neighbours (k)",
            description: "Edges per node in the kNN graph.",
            units: None,
            min: 1.0,
            max: 15.0,
            step: 1.0,
            default: 6.0,
        },
        ParamSpec {
            key: "bandwidth",
            label: "Kernel bandwidth σ",
            description: "Width of the Gaussian edge weights.",
            units: None,
            min: 0.1,
            max: 3.0,
            step: 0.1,
            default: 1.0,
        },
        ParamSpec {
            key: "spreading",
            label: "Spreading",
            description: "Off: labeled nodes are fixed. On: softly anchored by α.",
            units: None,
            min: 0.0,
            max: 1.0,
            step: 1.0,
            default: 0.0,
        },
        ParamSpec {
            key: "alpha",
            label: "α",
            description: "Weight of the neighbour average for labeled nodes when spreading.",
            units: None,
            min: 0.0,
            max: 0.99,
            step: 0.01,
            default: 0.8,
        },
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    Propagation,
    Spreading,
}

/// Weighted adjacency lists.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KnnGraph {
    pub neighbors: Vec<Vec<(usize, f64)>>,
}

impl KnnGraph {
    /// Symmetrized kNN graph with Gaussian-kernel weights.
    pub fn build(points: &[Point], k: usize, bandwidth: f64) -> Self {
        let n = points.len();
        let two_sigma2 = 2.0 * bandwidth.max(1e-6).powi(2);

        let nearest = |i: usize| -> Vec<(usize, f64)> {
            let mut d: Vec<(usize, f64)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, points[i].dist2(&points[j])))
                .collect();
            d.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            d.truncate(k);
            d
        };

        #[cfg(feature = "parallel")]
        let knn: Vec<Vec<(usize, f64)>> = (0..n).into_par_iter().map(nearest).collect();
        #[cfg(not(feature = "parallel"))]
        let knn: Vec<Vec<(usize, f64)>> = (0..n).map(nearest).collect();

        let mut neighbors: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for (i, list) in knn.iter().enumerate() {
            for &(j, d2) in list {
                let w = (-d2 / two_sigma2).exp();
                if !neighbors[i].iter().any(|&(x, _)| x == j) {
                    neighbors[i].push((j, w));
                }
                if !neighbors[j].iter().any(|&(x, _)| x == i) {
                    neighbors[j].push((i, w));
                }
            }
        }
        for list in &mut neighbors {
            list.sort_by_key(|&(j, _)| j);
        }
        Self { neighbors }
    }

    pub fn edge_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }
}

fn one_hot(class: usize, classes: usize) -> Vec<f64> {
    let mut v = vec![0.0; classes];
    if class < classes {
        v[class] = 1.0;
    }
    v
}

/// Index of the largest entry; first wins ties.
pub fn argmax(p: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in p.iter().enumerate() {
        match best {
            Some((_, bv)) if v <= bv => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// One synchronous sweep. Returns the new distributions and the largest
/// absolute change.
pub fn sweep(
    graph: &KnnGraph,
    seeds: &[Option<usize>],
    probs: &[Vec<f64>],
    mode: Mode,
    alpha: f64,
) -> (Vec<Vec<f64>>, f64) {
    let classes = probs.first().map(Vec::len).unwrap_or(0);
    let mut next = Vec::with_capacity(probs.len());
    let mut change: f64 = 0.0;

    for (i, old) in probs.iter().enumerate() {
        let mut avg = vec![0.0; classes];
        let mut total = 0.0;
        for &(j, w) in &graph.neighbors[i] {
            total += w;
            for (a, pj) in avg.iter_mut().zip(&probs[j]) {
                *a += w * pj;
            }
        }
        let avg = if total > 0.0 {
            avg.into_iter().map(|a| a / total).collect()
        } else {
            old.clone()
        };

        let new = match (seeds[i], mode) {
            (Some(c), Mode::Propagation) => one_hot(c, classes),
            (Some(c), Mode::Spreading) => avg
                .iter()
                .zip(one_hot(c, classes))
                .map(|(a, y)| alpha * a + (1.0 - alpha) * y)
                .collect(),
            (None, _) => avg,
        };
        for (a, b) in new.iter().zip(old) {
            change = change.max((a - b).abs());
        }
        next.push(new);
    }
    (next, change)
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabelPropagationLesson {
    pub points: Vec<Point>,
    /// Ground-truth class of every point, for scoring.
    pub truth: Vec<Option<usize>>,
    /// Visible label, `None` for unlabeled nodes.
    pub seeds: Vec<Option<usize>>,
    pub probs: Vec<Vec<f64>>,
    pub graph: KnnGraph,
    pub classes: usize,
    pub last_change: f64,
    iteration: u32,
    converged: bool,
}

impl LabelPropagationLesson {
    /// Build from points whose `label` marks the labeled nodes.
    pub fn new(points: Vec<Point>, classes: usize, k: usize, bandwidth: f64) -> Self {
        let classes = classes.max(1);
        let seeds: Vec<Option<usize>> = points.iter().map(|p| p.label.filter(|&c| c < classes)).collect();
        let probs = seeds
            .iter()
            .map(|s| match s {
                Some(c) => one_hot(*c, classes),
                None => vec![1.0 / classes as f64; classes],
            })
            .collect();
        Self {
            graph: KnnGraph::build(&points, k, bandwidth),
            truth: seeds.clone(),
            seeds,
            probs,
            points,
            classes,
            last_change: 0.0,
            iteration: 0,
            converged: false,
        }
    }

    pub fn predictions(&self) -> Vec<Option<usize>> {
        self.probs.iter().map(|p| argmax(p)).collect()
    }

    /// Accuracy over the nodes whose label was hidden.
    pub fn unlabeled_accuracy(&self) -> f64 {
        let mut total = 0usize;
        let mut correct = 0usize;
        for ((seed, truth), p) in self.seeds.iter().zip(&self.truth).zip(&self.probs) {
            if seed.is_some() {
                continue;
            }
            if let Some(t) = truth {
                total += 1;
                if argmax(p) == Some(*t) {
                    correct += 1;
                }
            }
        }
        if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        }
    }

    fn mode(params: &ParamSet) -> Mode {
        if params.get("spreading") >= 0.5 {
            Mode::Spreading
        } else {
            Mode::Propagation
        }
    }
}

impl Simulation for LabelPropagationLesson {
    fn regenerate(&mut self, params: &ParamSet, rng: &mut Prng) {
        let classes = params.get_usize("classes").clamp(2, MAX_CLASSES);
        // Centers evenly spaced on a circle so the classes are visible.
        let centers: Vec<(f64, f64)> = (0..classes)
            .map(|c| {
                let t = c as f64 / classes as f64 * std::f64::consts::TAU + rng.gen_range_f64(-0.2, 0.2);
                (3.0 * t.cos(), 3.0 * t.sin())
            })
            .collect();
        let mut points = gaussian_blobs(rng, &centers, params.get_usize("per_class"), 0.9);
        rng.shuffle(&mut points);
        let (visible, truth) = partially_labeled(&points, params.get_usize("labeled_per_class"));
        *self = Self::new(
            visible,
            classes,
            params.get_usize("neighbors"),
            params.get("bandwidth"),
        );
        self.truth = truth;
    }

    fn step(&mut self, params: &ParamSet) -> StepOutcome {
        if self.converged {
            return StepOutcome::Converged;
        }
        let (next, change) = sweep(
            &self.graph,
            &self.seeds,
            &self.probs,
            Self::mode(params),
            params.get("alpha"),
        );
        self.probs = next;
        self.last_change = change;
        self.iteration += 1;
        if change < TOLERANCE {
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

    fn param_changed(&mut self, key: &str, _params: &ParamSet) -> ParamEffect {
        match key {
            "spreading" | "alpha" => {
                // New fixed point; continue from the current distributions.
                self.converged = false;
                ParamEffect::Recomputed
            }
            _ => ParamEffect::Regenerate,
        }
    }

    fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("max_change", self.last_change),
            Metric::new("unlabeled_accuracy", self.unlabeled_accuracy()),
            Metric::new("edges", self.graph.edge_count() as f64),
        ]
    }

    fn render(&self, scene: &mut Scene) {
        scene.fit(&self.points, 0.08);

        let edge = Style::stroke(GRID, 1.0).with_opacity(0.12);
        for (i, list) in self.graph.neighbors.iter().enumerate() {
            for &(j, _) in list.iter().filter(|(j, _)| *j > i) {
                let (a, b) = (&self.points[i], &self.points[j]);
                scene.line("edges", (a.x, a.y), (b.x, b.y), edge);
            }
        }

        let uniform = 1.0 / self.classes.max(1) as f64;
        for ((p, probs), seed) in self.points.iter().zip(&self.probs).zip(&self.seeds) {
            let Some(c) = argmax(probs) else { continue };
            let confidence = if uniform < 1.0 {
                ((probs[c] - uniform) / (1.0 - uniform)).clamp(0.0, 1.0)
            } else {
                1.0
            };
            match seed {
                Some(label) => scene.circle(
                    "labeled",
                    (p.x, p.y),
                    6.0,
                    Style::fill(series_color(*label)).with_stroke(INK, 2.0),
                ),
                None => scene.circle(
                    "points",
                    (p.x, p.y),
                    4.0,
                    Style::fill(series_color(c)).with_opacity(0.25 + 0.75 * confidence),
                ),
            }
        }
    }

    fn reveal(&self) -> crate::timeline::Timeline {
        crate::timeline::Timeline::new()
            .fade_in("points", 300.0, 0.0)
            .fade_in("edges", 400.0, 200.0)
            .fade_in("labeled", 300.0, 400.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two labeled ends of a chain with unlabeled points between.
    fn chain() -> Vec<Point> {
        vec![
            Point::labeled(0.0, 0.0, 0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(8.0, 0.0),
            Point::new(9.0, 0.0),
            Point::labeled(10.0, 0.0, 1),
        ]
    }

    fn params(spreading: bool) -> ParamSet {
        let mut p = ParamSet::new("label_propagation", param_specs());
        p.set("spreading", if spreading { 1.0 } else { 0.0 }).unwrap();
        p
    }

    fn run(lesson: &mut LabelPropagationLesson, params: &ParamSet) {
        for _ in 0..2000 {
            if lesson.step(params) == StepOutcome::Converged {
                return;
            }
        }
        panic!("did not converge");
    }

    #[test]
    fn graph_is_symmetric() {
        let g = KnnGraph::build(&chain(), 2, 1.0);
        for (i, list) in g.neighbors.iter().enumerate() {
            for &(j, w) in list {
                assert!(g.neighbors[j].iter().any(|&(x, wx)| x == i && (wx - w).abs() < 1e-12));
                assert!(w > 0.0 && w <= 1.0);
            }
        }
    }

    #[test]
    fn propagation_keeps_seeds_fixed() {
        let mut lesson = LabelPropagationLesson::new(chain(), 2, 2, 2.0);
        run(&mut lesson, &params(false));
        assert_eq!(lesson.probs[0], vec![1.0, 0.0]);
        assert_eq!(lesson.probs[5], vec![0.0, 1.0]);
        assert_eq!(
            lesson.predictions(),
            vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1)]
        );
    }

    #[test]
    fn spreading_softens_seeds() {
        let mut lesson = LabelPropagationLesson::new(chain(), 2, 5, 2.0);
        let mut p = params(true);
        p.set("alpha", 0.5).unwrap();
        run(&mut lesson, &p);
        assert!(lesson.probs[0][0] < 1.0);
        assert_eq!(argmax(&lesson.probs[0]), Some(0));
    }

    #[test]
    fn distributions_stay_normalised() {
        let p = params(true);
        let mut lesson = LabelPropagationLesson::default();
        lesson.regenerate(&p, &mut Prng::new(12));
        for _ in 0..20 {
            lesson.step(&p);
        }
        for probs in &lesson.probs {
            assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn isolated_node_keeps_prior() {
        let g = KnnGraph {
            neighbors: vec![Vec::new()],
        };
        let (next, change) = sweep(&g, &[None], &[vec![0.5, 0.5]], Mode::Propagation, 0.8);
        assert_eq!(next[0], vec![0.5, 0.5]);
        assert_eq!(change, 0.0);
    }

    #[test]
    fn recovers_well_separated_blobs() {
        let p = params(false);
        let mut lesson = LabelPropagationLesson::default();
        lesson.regenerate(&p, &mut Prng::new(5));
        run(&mut lesson, &p);
        assert!(lesson.unlabeled_accuracy() > 0.8, "{}", lesson.unlabeled_accuracy());
    }
}
