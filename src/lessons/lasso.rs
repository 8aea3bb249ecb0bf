//! LASSO shrinkage path.
//!
//! The lesson starts from a set of "true" coefficients and applies the
//! soft-threshold operator `S(β, s) = sign(β)·max(|β| - s, 0)` with
//! `s = λ·shrink_scale`. Each step raises `λ` by `lambda_step` and records
//! the coefficients, tracing the path as features drop to exactly zero.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::driver::{Metric, ParamEffect, Simulation, StepOutcome};
use crate::params::{ParamSet, ParamSpec};
use crate::prng::Prng;
use crate::render::{series_color, Scene, Style, HIGHLIGHT};

pub fn param_specs() -> Vec<ParamSpec> {
    vec![
        ParamSpec {
            key: "features",
            label: "Features",
            description: "Number of coefficients.",
            units: None,
            min: 1.0,
            max: 12.0,
            step: 1.0,
            default: 8.0,
        },
        ParamSpec {
            key: "lambda",
            label: "λ",
            description: "Current penalty strength.",
            units: None,
            min: 0.0,
            max: 5.0,
            step: 0.01,
            default: 0.0,
        },
        ParamSpec {
            key: "lambda_step",
            label: "λ step",
            description: "Increase of λ per step of the sweep.",
            units: None,
            min: 0.01,
            max: 1.0,
            step: 0.01,
            default: 0.05,
        },
        ParamSpec {
            key: "lambda_max",
            label: "λ max",
            description: "End of the sweep.",
            units: None,
            min: 0.1,
            max: 5.0,
            step: 0.1,
            default: 3.0,
        },
        ParamSpec {
            key: "shrink_scale",
            label: "Shrink scale",
            description: "Threshold per unit of λ.",
            units: None,
            min: 0.0,
            max: 2.0,
            step: 0.05,
            default: 1.0,
        },
    ]
}

/// `sign(β)·max(|β| - s, 0)`. Exactly zero once `s ≥ |β|`.
#[inline]
pub fn soft_threshold(beta: f64, s: f64) -> f64 {
    let m = beta.abs() - s.max(0.0);
    if m <= 0.0 {
        0.0
    } else {
        m.copysign(beta)
    }
}

/// Shrink every coefficient at penalty `lambda`.
pub fn shrink(coefficients: &[f64], lambda: f64, shrink_scale: f64) -> Vec<f64> {
    let s = lambda * shrink_scale;
    coefficients.iter().map(|&b| soft_threshold(b, s)).collect()
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LassoLesson {
    pub true_coefficients: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub lambda: f64,
    /// `(λ, coefficients)` after every step, starting with the initial λ.
    pub path: Vec<(f64, Vec<f64>)>,
    iteration: u32,
    converged: bool,
}

impl LassoLesson {
    pub fn new(true_coefficients: Vec<f64>, lambda: f64, shrink_scale: f64) -> Self {
        let coefficients = shrink(&true_coefficients, lambda, shrink_scale);
        Self {
            path: vec![(lambda, coefficients.clone())],
            true_coefficients,
            coefficients,
            lambda,
            iteration: 0,
            converged: false,
        }
    }

    pub fn non_zero(&self) -> usize {
        self.coefficients.iter().filter(|&&b| b != 0.0).count()
    }

    pub fn l1_norm(&self) -> f64 {
        self.coefficients.iter().map(|b| b.abs()).sum()
    }

    fn reshrink(&mut self, params: &ParamSet) {
        self.coefficients = shrink(&self.true_coefficients, self.lambda, params.get("shrink_scale"));
    }
}

impl Simulation for LassoLesson {
    fn regenerate(&mut self, params: &ParamSet, rng: &mut Prng) {
        // A few strong features and a tail of weak ones.
        let features = params.get_usize("features").max(1);
        let truth = (0..features)
            .map(|i| {
                let magnitude = if i % 3 == 0 {
                    rng.gen_range_f64(1.5, 3.0)
                } else {
                    rng.gen_range_f64(0.1, 1.2)
                };
                if rng.next_u32() & 1 == 0 {
                    magnitude
                } else {
                    -magnitude
                }
            })
            .collect();
        *self = Self::new(truth, params.get("lambda"), params.get("shrink_scale"));
    }

    fn step(&mut self, params: &ParamSet) -> StepOutcome {
        if self.converged {
            return StepOutcome::Converged;
        }
        let lambda_max = params.get("lambda_max");
        if self.lambda >= lambda_max || self.non_zero() == 0 {
            self.converged = true;
            return StepOutcome::Converged;
        }
        self.lambda = (self.lambda + params.get("lambda_step")).min(lambda_max);
        self.reshrink(params);
        self.path.push((self.lambda, self.coefficients.clone()));
        self.iteration += 1;

        if self.lambda >= lambda_max || self.non_zero() == 0 {
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

    fn param_changed(&mut self, key: &str, params: &ParamSet) -> ParamEffect {
        match key {
            "features" => ParamEffect::Regenerate,
            "lambda" => {
                // Scrubbing λ restarts the path from the new value. The
                // iteration count keeps growing until the next regeneration.
                let iteration = self.iteration;
                *self = Self::new(
                    std::mem::take(&mut self.true_coefficients),
                    params.get("lambda"),
                    params.get("shrink_scale"),
                );
                self.iteration = iteration;
                ParamEffect::Recomputed
            }
            "shrink_scale" => {
                self.reshrink(params);
                if let Some(last) = self.path.last_mut() {
                    last.1 = self.coefficients.clone();
                }
                ParamEffect::Recomputed
            }
            _ => {
                self.converged = false;
                ParamEffect::Recomputed
            }
        }
    }

    fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("lambda", self.lambda),
            Metric::new("non_zero", self.non_zero() as f64),
            Metric::new("l1_norm", self.l1_norm()),
        ]
    }

    fn render(&self, scene: &mut Scene) {
        let span = self
            .true_coefficients
            .iter()
            .fold(1.0_f64, |m, b| m.max(b.abs()))
            * 1.1;
        let lambda_end = self.path.last().map(|(l, _)| *l).unwrap_or(0.0).max(1.0);
        scene.set_range((0.0, lambda_end), (-span, span));
        scene.axes();

        for j in 0..self.true_coefficients.len() {
            let trace: Vec<(f64, f64)> = self
                .path
                .iter()
                .filter_map(|(l, c)| c.get(j).map(|b| (*l, *b)))
                .collect();
            scene.polyline("path", trace, Style::stroke(series_color(j), 1.5));
            if let Some(b) = self.coefficients.get(j) {
                scene.circle("path", (self.lambda, *b), 3.0, Style::fill(series_color(j)));
            }
        }
        scene.line(
            "cursor",
            (self.lambda, -span),
            (self.lambda, span),
            Style::stroke(HIGHLIGHT, 1.5).with_opacity(0.8),
        );
        scene.text(
            "labels",
            (lambda_end * 0.5, span * 0.92),
            format!("λ = {:.2}   non-zero {}", self.lambda, self.non_zero()),
        );
    }

    fn reveal(&self) -> crate::timeline::Timeline {
        crate::timeline::Timeline::new()
            .fade_in("path", 400.0, 0.0)
            .fade_in("cursor", 300.0, 250.0)
    }
}
