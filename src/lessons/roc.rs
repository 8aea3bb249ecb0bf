//! ROC curve of a fixed set of classifier scores.
//!
//! Thresholds run over `t_i = i / 100` for `i = 0..=100`; a sample is
//! predicted positive when `score ≥ t`. Each step reveals the operating
//! point of one more threshold. The finished curve is sorted by FPR,
//! anchored at `(0, 0)` and `(1, 1)`, and integrated with trapezoids.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dataset::{two_class_scores, Scored};
use crate::driver::{Metric, ParamEffect, Simulation, StepOutcome};
use crate::params::{ParamSet, ParamSpec};
use crate::prng::Prng;
use crate::render::{Scene, Style, HIGHLIGHT, INK, SERIES_COLORS};

pub const THRESHOLDS: usize = 101;

pub fn param_specs() -> Vec<ParamSpec> {
    vec![
        ParamSpec {
            key: "per_class",
            label: "Samples per class",
            description: "Positives and negatives drawn.",
            units: None,
            min: 5.0,
            max: 100.0,
            step: 1.0,
            default: 60.0,
        },
        ParamSpec {
            key: "separation",
            label: "Separation",
            description: "Distance between the class score distributions.",
            units: None,
            min: 0.0,
            max: 6.0,
            step: 0.1,
            default: 2.0,
        },
        ParamSpec {
            key: "spread",
            label: "Spread",
            description: "Width of each score distribution.",
            units: None,
            min: 0.3,
            max: 3.0,
            step: 0.1,
            default: 1.0,
        },
        ParamSpec {
            key: "threshold",
            label: "Threshold",
            description: "Operating point for the confusion matrix.",
            units: None,
            min: 0.0,
            max: 1.0,
            step: 0.01,
            default: 0.5,
        },
    ]
}

#[inline]
pub fn threshold(i: usize) -> f64 {
    i as f64 / (THRESHOLDS - 1) as f64
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl Confusion {
    pub fn at(scores: &[Scored], t: f64) -> Self {
        let mut c = Self::default();
        for s in scores {
            match (s.score >= t, s.positive) {
                (true, true) => c.tp += 1,
                (true, false) => c.fp += 1,
                (false, false) => c.tn += 1,
                (false, true) => c.fn_ += 1,
            }
        }
        c
    }

    pub fn tpr(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn fpr(&self) -> f64 {
        ratio(self.fp, self.fp + self.tn)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        self.tpr()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.tp + self.fp + self.tn + self.fn_)
    }
}

/// `(FPR, TPR)` at threshold index `i`.
pub fn operating_point(scores: &[Scored], i: usize) -> (f64, f64) {
    let c = Confusion::at(scores, threshold(i));
    (c.fpr(), c.tpr())
}

/// Sort ascending by FPR (ties by TPR) and anchor both ends.
pub fn finish_curve(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    points.push((0.0, 0.0));
    points.push((1.0, 1.0));
    points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    points
}

/// Trapezoidal area under a sorted curve.
pub fn auc(curve: &[(f64, f64)]) -> f64 {
    curve
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
        .sum()
}

pub fn roc_curve(scores: &[Scored]) -> Vec<(f64, f64)> {
    finish_curve((0..THRESHOLDS).map(|i| operating_point(scores, i)).collect())
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RocLesson {
    pub scores: Vec<Scored>,
    /// Operating points revealed so far, in threshold order.
    pub revealed: Vec<(f64, f64)>,
    pub threshold: f64,
    auc: f64,
    iteration: u32,
}

impl RocLesson {
    pub fn new(scores: Vec<Scored>, threshold: f64) -> Self {
        Self {
            auc: auc(&roc_curve(&scores)),
            scores,
            revealed: Vec::with_capacity(THRESHOLDS),
            threshold,
            iteration: 0,
        }
    }

    /// Area under the full curve, available before the sweep completes.
    pub fn auc(&self) -> f64 {
        self.auc
    }

    pub fn confusion(&self) -> Confusion {
        Confusion::at(&self.scores, self.threshold)
    }
}

impl Simulation for RocLesson {
    fn regenerate(&mut self, params: &ParamSet, rng: &mut Prng) {
        let n = params.get_usize("per_class");
        let scores = two_class_scores(rng, n, n, params.get("separation"), params.get("spread"));
        *self = Self::new(scores, params.get("threshold"));
    }

    fn step(&mut self, _params: &ParamSet) -> StepOutcome {
        if self.revealed.len() < THRESHOLDS {
            let i = self.revealed.len();
            self.revealed.push(operating_point(&self.scores, i));
            self.iteration += 1;
        }
        if self.revealed.len() >= THRESHOLDS {
            StepOutcome::Converged
        } else {
            StepOutcome::Advanced
        }
    }

    fn iteration(&self) -> u32 {
        self.iteration
    }

    fn is_converged(&self) -> bool {
        self.revealed.len() >= THRESHOLDS
    }

    fn param_changed(&mut self, key: &str, params: &ParamSet) -> ParamEffect {
        if key == "threshold" {
            self.threshold = params.get("threshold");
            ParamEffect::Recomputed
        } else {
            ParamEffect::Regenerate
        }
    }

    fn metrics(&self) -> Vec<Metric> {
        let c = self.confusion();
        vec![
            Metric::new("auc", self.auc),
            Metric::new("tp", c.tp as f64),
            Metric::new("fp", c.fp as f64),
            Metric::new("tn", c.tn as f64),
            Metric::new("fn", c.fn_ as f64),
            Metric::new("precision", c.precision()),
            Metric::new("recall", c.recall()),
            Metric::new("accuracy", c.accuracy()),
        ]
    }

    fn render(&self, scene: &mut Scene) {
        scene.set_range((0.0, 1.0), (0.0, 1.0));
        scene.axes();
        scene.line(
            "diagonal",
            (0.0, 0.0),
            (1.0, 1.0),
            Style::stroke(INK, 1.0).with_opacity(0.35),
        );

        if !self.revealed.is_empty() {
            let curve = if self.is_converged() {
                finish_curve(self.revealed.clone())
            } else {
                // Thresholds run high-FPR first; draw in sweep order.
                self.revealed.clone()
            };
            for p in &self.revealed {
                scene.circle("curve", *p, 2.5, Style::fill(SERIES_COLORS[0]));
            }
            scene.polyline("curve", curve, Style::stroke(SERIES_COLORS[0], 2.0));
        }

        let c = self.confusion();
        scene.circle(
            "operating_point",
            (c.fpr(), c.tpr()),
            6.0,
            Style::fill(HIGHLIGHT).with_stroke(INK, 1.5),
        );
        if self.is_converged() {
            scene.text("labels", (0.7, 0.1), format!("AUC {:.3}", self.auc));
        }
    }

    fn reveal(&self) -> crate::timeline::Timeline {
        crate::timeline::Timeline::new()
            .fade_in("diagonal", 300.0, 0.0)
            .fade_in("operating_point", 300.0, 200.0)
    }
}
