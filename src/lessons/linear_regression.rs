//! Least-squares line fitting by full-batch gradient descent.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dataset::{noisy_line, Point};
use crate::driver::{Metric, ParamEffect, Simulation, StepOutcome};
use crate::params::{ParamSet, ParamSpec};
use crate::prng::Prng;
use crate::render::{Scene, Style, HIGHLIGHT, INK, SERIES_COLORS};

const LOSS_TOL: f64 = 1e-9;
const GRAD_TOL: f64 = 1e-6;

pub fn param_specs() -> Vec<ParamSpec> {
    vec![
        ParamSpec {
            key: "points",
            label: "Points",
            description: "Number of samples.",
            units: None,
            min: 5.0,
            max: 200.0,
            step: 1.0,
            default: 40.0,
        },
        ParamSpec {
            key: "noise",
            label: "Noise",
            description: "Standard deviation of the vertical noise.",
            units: None,
            min: 0.0,
            max: 3.0,
            step: 0.1,
            default: 0.8,
        },
        ParamSpec {
            key: "learning_rate",
            label: "Learning rate",
            description: "Step size α in w ← w - α∇L.",
            units: None,
            min: 0.001,
            max: 1.0,
            step: 0.001,
            default: 0.05,
        },
    ]
}

/// Mean squared error of `w·x + b`.
pub fn mse(points: &[Point], w: f64, b: f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points
        .iter()
        .map(|p| (w * p.x + b - p.y).powi(2))
        .sum::<f64>()
        / points.len() as f64
}

/// `(∂L/∂w, ∂L/∂b)` of the MSE over all points.
pub fn mse_gradient(points: &[Point], w: f64, b: f64) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let n = points.len() as f64;
    let (gw, gb) = points.iter().fold((0.0, 0.0), |(gw, gb), p| {
        let r = w * p.x + b - p.y;
        (gw + r * p.x, gb + r)
    });
    (2.0 * gw / n, 2.0 * gb / n)
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearRegressionLesson {
    pub points: Vec<Point>,
    pub w: f64,
    pub b: f64,
    pub loss_history: Vec<f64>,
    pub true_slope: f64,
    pub true_intercept: f64,
    iteration: u32,
    converged: bool,
}

impl LinearRegressionLesson {
    pub fn with_points(points: Vec<Point>) -> Self {
        let mut lesson = Self {
            points,
            ..Self::default()
        };
        lesson.loss_history.push(lesson.loss());
        lesson
    }

    pub fn loss(&self) -> f64 {
        mse(&self.points, self.w, self.b)
    }
}

impl Simulation for LinearRegressionLesson {
    fn regenerate(&mut self, params: &ParamSet, rng: &mut Prng) {
        self.true_slope = rng.gen_range_f64(-1.5, 1.5);
        self.true_intercept = rng.gen_range_f64(-1.0, 1.0);
        self.points = noisy_line(
            rng,
            params.get_usize("points"),
            self.true_slope,
            self.true_intercept,
            params.get("noise"),
            (-3.0, 3.0),
        );
        self.w = 0.0;
        self.b = 0.0;
        self.iteration = 0;
        self.converged = false;
        self.loss_history = vec![self.loss()];
    }

    fn step(&mut self, params: &ParamSet) -> StepOutcome {
        if self.converged {
            return StepOutcome::Converged;
        }
        let lr = params.get("learning_rate");
        let (gw, gb) = mse_gradient(&self.points, self.w, self.b);
        let prev = self.loss();
        self.w -= lr * gw;
        self.b -= lr * gb;
        self.iteration += 1;

        let loss = self.loss();
        self.loss_history.push(loss);
        if !(loss.is_finite() && self.w.is_finite() && self.b.is_finite()) {
            return StepOutcome::Diverged;
        }
        if (prev - loss).abs() < LOSS_TOL || gw.hypot(gb) < GRAD_TOL {
            self.converged = true;
            return StepOutcome::Converged;
        }
        StepOutcome::Advanced
    }

    fn iteration(&self) -> u32 {
        self.iteration
    }

    fn is_converged(&self) -> bool {
        self.converged
    }

    fn param_changed(&mut self, key: &str, _params: &ParamSet) -> ParamEffect {
        match key {
            "points" | "noise" => ParamEffect::Regenerate,
            _ => ParamEffect::Live,
        }
    }

    fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("loss", self.loss()),
            Metric::new("w", self.w),
            Metric::new("b", self.b),
        ]
    }

    fn render(&self, scene: &mut Scene) {
        scene.fit(&self.points, 0.1);
        scene.axes();
        let v = scene.viewport;

        for p in &self.points {
            let fit = (p.x, self.w * p.x + self.b);
            scene.line("residuals", (p.x, p.y), fit, Style::stroke(INK, 1.0).with_opacity(0.2));
        }
        for p in &self.points {
            scene.circle("points", (p.x, p.y), 3.5, Style::fill(SERIES_COLORS[0]));
        }
        if self.w.is_finite() && self.b.is_finite() {
            scene.line(
                "fit",
                (v.x_min, self.w * v.x_min + self.b),
                (v.x_max, self.w * v.x_max + self.b),
                Style::stroke(HIGHLIGHT, 2.0),
            );
        }
        scene.text(
            "labels",
            (v.x_min + 0.25 * (v.x_max - v.x_min), v.y_max - 0.05 * (v.y_max - v.y_min)),
            format!("MSE {:.4}  iter {}", self.loss(), self.iteration),
        );
    }

    fn reveal(&self) -> crate::timeline::Timeline {
        crate::timeline::Timeline::new()
            .fade_in("points", 400.0, 0.0)
            .fade_in("fit", 300.0, 300.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_params(lr: f64) -> ParamSet {
        let mut p = ParamSet::new("linear_regression", param_specs());
        p.set("learning_rate", lr).unwrap();
        p
    }

    #[test]
    fn loss_never_increases_for_small_rate() {
        let params = line_params(0.02);
        let mut lesson = LinearRegressionLesson::default();
        lesson.regenerate(&params, &mut Prng::new(17));
        for _ in 0..300 {
            lesson.step(&params);
        }
        for pair in lesson.loss_history.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12, "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn recovers_exact_line_without_noise() {
        let pts: Vec<Point> = (0..20)
            .map(|i| {
                let x = i as f64 / 5.0 - 2.0;
                Point::new(x, 0.7 * x - 0.3)
            })
            .collect();
        let params = line_params(0.1);
        let mut lesson = LinearRegressionLesson::with_points(pts);
        for _ in 0..2000 {
            if lesson.step(&params) == StepOutcome::Converged {
                break;
            }
        }
        assert!((lesson.w - 0.7).abs() < 1e-3);
        assert!((lesson.b + 0.3).abs() < 1e-3);
        assert!(lesson.is_converged());
    }

    #[test]
    fn large_rate_diverges() {
        let params = line_params(1.0);
        let mut lesson = LinearRegressionLesson::default();
        lesson.regenerate(&params, &mut Prng::new(3));
        let mut outcome = StepOutcome::Advanced;
        for _ in 0..2000 {
            outcome = lesson.step(&params);
            if outcome != StepOutcome::Advanced {
                break;
            }
        }
        assert_eq!(outcome, StepOutcome::Diverged);
    }

    #[test]
    fn empty_dataset_is_converged_and_renders() {
        let params = line_params(0.1);
        let mut lesson = LinearRegressionLesson::with_points(Vec::new());
        assert_eq!(lesson.step(&params), StepOutcome::Converged);
        let mut scene = Scene::new(crate::render::Viewport::new((0.0, 1.0), (0.0, 1.0), 100.0, 100.0));
        lesson.render(&mut scene);
        assert!(scene.to_svg().contains("<svg"));
    }
}
