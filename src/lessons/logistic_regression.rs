//! Two-feature logistic regression trained by full-batch gradient descent on
//! the mean log-loss.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dataset::{gaussian_blobs, Point};
use crate::driver::{Metric, ParamEffect, Simulation, StepOutcome};
use crate::params::{ParamSet, ParamSpec};
use crate::prng::Prng;
use crate::render::{series_color, Scene, Style, HIGHLIGHT, SERIES_COLORS};

const LOSS_TOL: f64 = 1e-9;
const GRAD_TOL: f64 = 1e-4;
const P_EPS: f64 = 1e-12;
const SHADE_CELLS: usize = 16;

pub fn param_specs() -> Vec<ParamSpec> {
    vec![
        ParamSpec {
            key: "per_class",
            label: "Points per class",
            description: "Samples drawn for each class.",
            units: None,
            min: 5.0,
            max: 100.0,
            step: 1.0,
            default: 30.0,
        },
        ParamSpec {
            key: "separation",
            label: "Separation",
            description: "Distance between the two class centers.",
            units: None,
            min: 0.0,
            max: 6.0,
            step: 0.1,
            default: 3.0,
        },
        ParamSpec {
            key: "learning_rate",
            label: "Learning rate",
            description: "Step size α in w ← w - α∇L.",
            units: None,
            min: 0.001,
            max: 5.0,
            step: 0.001,
            default: 0.1,
        },
    ]
}

#[inline]
pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn target(p: &Point) -> f64 {
    if p.label == Some(1) {
        1.0
    } else {
        0.0
    }
}

/// Mean binary cross-entropy of `σ(w·x + b)`.
pub fn log_loss(points: &[Point], w: [f64; 2], b: f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let total: f64 = points
        .iter()
        .map(|pt| {
            let p = sigmoid(w[0] * pt.x + w[1] * pt.y + b).clamp(P_EPS, 1.0 - P_EPS);
            let y = target(pt);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / points.len() as f64
}

/// `(∂L/∂w, ∂L/∂b)` of the mean log-loss.
pub fn log_loss_gradient(points: &[Point], w: [f64; 2], b: f64) -> ([f64; 2], f64) {
    if points.is_empty() {
        return ([0.0, 0.0], 0.0);
    }
    let n = points.len() as f64;
    let mut gw = [0.0, 0.0];
    let mut gb = 0.0;
    for pt in points {
        let r = sigmoid(w[0] * pt.x + w[1] * pt.y + b) - target(pt);
        gw[0] += r * pt.x;
        gw[1] += r * pt.y;
        gb += r;
    }
    ([gw[0] / n, gw[1] / n], gb / n)
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogisticRegressionLesson {
    pub points: Vec<Point>,
    pub w: [f64; 2],
    pub b: f64,
    pub loss_history: Vec<f64>,
    iteration: u32,
    converged: bool,
}

impl LogisticRegressionLesson {
    pub fn with_points(points: Vec<Point>) -> Self {
        let mut lesson = Self {
            points,
            ..Self::default()
        };
        lesson.loss_history.push(lesson.loss());
        lesson
    }

    pub fn loss(&self) -> f64 {
        log_loss(&self.points, self.w, self.b)
    }

    pub fn probability(&self, x: f64, y: f64) -> f64 {
        sigmoid(self.w[0] * x + self.w[1] * y + self.b)
    }

    pub fn accuracy(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let correct = self
            .points
            .iter()
            .filter(|p| (self.probability(p.x, p.y) >= 0.5) == (p.label == Some(1)))
            .count();
        correct as f64 / self.points.len() as f64
    }

    /// Two endpoints of `w·x + b = 0` inside the given window.
    fn boundary(&self, x: (f64, f64), y: (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
        let [w1, w2] = self.w;
        if w1.abs() < 1e-12 && w2.abs() < 1e-12 {
            return None;
        }
        if w2.abs() >= w1.abs() {
            let at = |x: f64| -(w1 * x + self.b) / w2;
            Some(((x.0, at(x.0)), (x.1, at(x.1))))
        } else {
            let at = |y: f64| -(w2 * y + self.b) / w1;
            Some(((at(y.0), y.0), (at(y.1), y.1)))
        }
    }
}

impl Simulation for LogisticRegressionLesson {
    fn regenerate(&mut self, params: &ParamSet, rng: &mut Prng) {
        let half = params.get("separation") / 2.0;
        self.points = gaussian_blobs(
            rng,
            &[(-half, -half * 0.5), (half, half * 0.5)],
            params.get_usize("per_class"),
            1.0,
        );
        self.w = [0.0, 0.0];
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
        let prev = self.loss();
        let (gw, gb) = log_loss_gradient(&self.points, self.w, self.b);
        self.w[0] -= lr * gw[0];
        self.w[1] -= lr * gw[1];
        self.b -= lr * gb;
        self.iteration += 1;

        let loss = self.loss();
        self.loss_history.push(loss);
        if !(loss.is_finite() && self.w.iter().all(|v| v.is_finite()) && self.b.is_finite()) {
            return StepOutcome::Diverged;
        }
        let grad_norm = (gw[0] * gw[0] + gw[1] * gw[1] + gb * gb).sqrt();
        if (prev - loss).abs() < LOSS_TOL || grad_norm < GRAD_TOL {
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
            "per_class" | "separation" => ParamEffect::Regenerate,
            _ => ParamEffect::Live,
        }
    }

    fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("log_loss", self.loss()),
            Metric::new("accuracy", self.accuracy()),
            Metric::new("w1", self.w[0]),
            Metric::new("w2", self.w[1]),
            Metric::new("b", self.b),
        ]
    }

    fn render(&self, scene: &mut Scene) {
        scene.fit(&self.points, 0.1);
        let v = scene.viewport;

        // Probability field.
        let cw = (v.x_max - v.x_min) / SHADE_CELLS as f64;
        let ch = (v.y_max - v.y_min) / SHADE_CELLS as f64;
        for i in 0..SHADE_CELLS {
            for j in 0..SHADE_CELLS {
                let x0 = v.x_min + i as f64 * cw;
                let y0 = v.y_min + j as f64 * ch;
                let p = self.probability(x0 + cw / 2.0, y0 + ch / 2.0);
                let color = SERIES_COLORS[0].mix(SERIES_COLORS[1], p);
                scene.rect("field", (x0, y0), (x0 + cw, y0 + ch), Style::fill(color).with_opacity(0.18));
            }
        }
        scene.axes();

        if let Some((a, b)) = self.boundary((v.x_min, v.x_max), (v.y_min, v.y_max)) {
            scene.line("boundary", a, b, Style::stroke(HIGHLIGHT, 2.0));
        }
        for p in &self.points {
            let color = series_color(p.label.unwrap_or(0));
            scene.circle("points", (p.x, p.y), 4.0, Style::fill(color));
        }
    }

    fn reveal(&self) -> crate::timeline::Timeline {
        crate::timeline::Timeline::new()
            .fade_in("points", 400.0, 0.0)
            .fade_in("field", 400.0, 200.0)
            .fade_in("boundary", 300.0, 400.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(lr: f64) -> ParamSet {
        let mut p = ParamSet::new("logistic_regression", param_specs());
        p.set("learning_rate", lr).unwrap();
        p
    }

    #[test]
    fn sigmoid_is_symmetric() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn loss_is_non_increasing_for_small_rate() {
        let p = params(0.1);
        let mut lesson = LogisticRegressionLesson::default();
        lesson.regenerate(&p, &mut Prng::new(21));
        for _ in 0..200 {
            lesson.step(&p);
        }
        for pair in lesson.loss_history.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
    }

    #[test]
    fn separates_distant_blobs() {
        let mut p = params(0.5);
        p.set("separation", 6.0).unwrap();
        let mut lesson = LogisticRegressionLesson::default();
        lesson.regenerate(&p, &mut Prng::new(4));
        for _ in 0..300 {
            lesson.step(&p);
        }
        assert!(lesson.accuracy() > 0.9, "accuracy {}", lesson.accuracy());
    }

    #[test]
    fn initial_loss_is_ln2() {
        let pts = vec![Point::labeled(1.0, 0.0, 1), Point::labeled(-1.0, 0.0, 0)];
        let lesson = LogisticRegressionLesson::with_points(pts);
        assert!((lesson.loss() - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn no_boundary_for_zero_weights() {
        let lesson = LogisticRegressionLesson::default();
        assert!(lesson.boundary((0.0, 1.0), (0.0, 1.0)).is_none());
    }
}
