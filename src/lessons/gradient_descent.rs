//! Gradient descent on the convex bowl `f(x, y) = a·x² + b·y²`.
//!
//! Each step moves the ball along `-α∇f`. Per axis the iterate scales by
//! `1 - 2αa`, so the path oscillates once `α > 1/(2a)` and blows up once
//! `α > 1/a`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::driver::{Metric, ParamEffect, Simulation, StepOutcome};
use crate::params::{ParamSet, ParamSpec};
use crate::prng::Prng;
use crate::render::{Scene, Style, GRID, HIGHLIGHT, SERIES_COLORS};

const GRAD_TOL: f64 = 1e-4;
const ESCAPE: f64 = 1e6;
const CONTOURS: [f64; 5] = [0.5, 2.0, 5.0, 10.0, 20.0];

pub fn param_specs() -> Vec<ParamSpec> {
    vec![
        ParamSpec {
            key: "curvature_x",
            label: "Curvature a",
            description: "Coefficient of x² in the bowl.",
            units: None,
            min: 0.1,
            max: 5.0,
            step: 0.1,
            default: 1.0,
        },
        ParamSpec {
            key: "curvature_y",
            label: "Curvature b",
            description: "Coefficient of y² in the bowl.",
            units: None,
            min: 0.1,
            max: 5.0,
            step: 0.1,
            default: 3.0,
        },
        ParamSpec {
            key: "learning_rate",
            label: "Learning rate",
            description: "Step size α. Stable while α < 1 / max(a, b).",
            units: None,
            min: 0.01,
            max: 1.0,
            step: 0.01,
            default: 0.1,
        },
    ]
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bowl {
    pub a: f64,
    pub b: f64,
}

impl Bowl {
    pub fn value(&self, (x, y): (f64, f64)) -> f64 {
        self.a * x * x + self.b * y * y
    }

    pub fn gradient(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (2.0 * self.a * x, 2.0 * self.b * y)
    }

    /// Largest learning rate that still converges.
    pub fn stability_bound(&self) -> f64 {
        1.0 / self.a.max(self.b)
    }

    /// One gradient step from `p`.
    pub fn step(&self, p: (f64, f64), lr: f64) -> (f64, f64) {
        let (gx, gy) = self.gradient(p);
        (p.0 - lr * gx, p.1 - lr * gy)
    }
}

impl Default for Bowl {
    fn default() -> Self {
        Self { a: 1.0, b: 3.0 }
    }
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GradientDescentLesson {
    pub bowl: Bowl,
    pub trail: Vec<(f64, f64)>,
    pub loss_history: Vec<f64>,
    iteration: u32,
    converged: bool,
}

impl GradientDescentLesson {
    pub fn starting_at(bowl: Bowl, start: (f64, f64)) -> Self {
        Self {
            bowl,
            trail: vec![start],
            loss_history: vec![bowl.value(start)],
            iteration: 0,
            converged: false,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        self.trail.last().copied().unwrap_or((0.0, 0.0))
    }
}

impl Simulation for GradientDescentLesson {
    fn regenerate(&mut self, params: &ParamSet, rng: &mut Prng) {
        let bowl = Bowl {
            a: params.get("curvature_x"),
            b: params.get("curvature_y"),
        };
        // Start on a ring so the walk is always visible.
        let angle = rng.gen_range_f64(0.0, std::f64::consts::TAU);
        let start = (3.5 * angle.cos(), 2.5 * angle.sin());
        *self = Self::starting_at(bowl, start);
    }

    fn step(&mut self, params: &ParamSet) -> StepOutcome {
        if self.converged {
            return StepOutcome::Converged;
        }
        let p = self.position();
        if !(p.0.is_finite() && p.1.is_finite()) || p.0.abs().max(p.1.abs()) > ESCAPE {
            return StepOutcome::Diverged;
        }
        let next = self.bowl.step(p, params.get("learning_rate"));
        self.trail.push(next);
        self.loss_history.push(self.bowl.value(next));
        self.iteration += 1;

        if !(next.0.is_finite() && next.1.is_finite()) || next.0.abs().max(next.1.abs()) > ESCAPE {
            return StepOutcome::Diverged;
        }
        let (gx, gy) = self.bowl.gradient(next);
        if gx.hypot(gy) < GRAD_TOL {
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
            "curvature_x" | "curvature_y" => ParamEffect::Regenerate,
            _ => ParamEffect::Live,
        }
    }

    fn metrics(&self) -> Vec<Metric> {
        let p = self.position();
        vec![
            Metric::new("loss", self.bowl.value(p)),
            Metric::new("x", p.0),
            Metric::new("y", p.1),
            Metric::new("stability_bound", self.bowl.stability_bound()),
        ]
    }

    fn render(&self, scene: &mut Scene) {
        scene.set_range((-5.0, 5.0), (-4.0, 4.0));
        scene.axes();

        for (i, level) in CONTOURS.iter().enumerate() {
            let rx = (level / self.bowl.a).sqrt();
            let ry = (level / self.bowl.b).sqrt();
            let ring: Vec<(f64, f64)> = (0..=64)
                .map(|k| {
                    let t = k as f64 / 64.0 * std::f64::consts::TAU;
                    (rx * t.cos(), ry * t.sin())
                })
                .collect();
            let opacity = 0.45 - 0.07 * i as f64;
            scene.polyline("contours", ring, Style::stroke(GRID, 1.0).with_opacity(opacity));
        }

        // Only draw the finite, on-screen prefix of a diverging walk.
        let trail: Vec<(f64, f64)> = self
            .trail
            .iter()
            .copied()
            .take_while(|p| p.0.abs() < 1e3 && p.1.abs() < 1e3)
            .collect();
        for p in &trail {
            scene.circle("trail", *p, 2.5, Style::fill(SERIES_COLORS[0]).with_opacity(0.7));
        }
        if let Some(&last) = trail.last() {
            scene.polyline("trail", trail, Style::stroke(SERIES_COLORS[0], 1.5));
            scene.circle("ball", last, 6.0, Style::fill(HIGHLIGHT));
        }
    }

    fn reveal(&self) -> crate::timeline::Timeline {
        crate::timeline::Timeline::new()
            .fade_in("contours", 500.0, 0.0)
            .fade_in("ball", 300.0, 300.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(lr: f64) -> ParamSet {
        let mut p = ParamSet::new("gradient_descent", param_specs());
        p.set("learning_rate", lr).unwrap();
        p
    }

    #[test]
    fn converges_below_stability_bound() {
        let p = params(0.1);
        let mut lesson = GradientDescentLesson::starting_at(Bowl::default(), (3.0, -2.0));
        let mut outcome = StepOutcome::Advanced;
        for _ in 0..500 {
            outcome = lesson.step(&p);
            if outcome != StepOutcome::Advanced {
                break;
            }
        }
        assert_eq!(outcome, StepOutcome::Converged);
        for pair in lesson.loss_history.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }

    #[test]
    fn diverges_above_stability_bound() {
        let p = params(0.5);
        let bowl = Bowl { a: 1.0, b: 3.0 };
        assert!(0.5 > bowl.stability_bound());
        let mut lesson = GradientDescentLesson::starting_at(bowl, (1.0, 1.0));
        let mut outcome = StepOutcome::Advanced;
        for _ in 0..500 {
            outcome = lesson.step(&p);
            if outcome != StepOutcome::Advanced {
                break;
            }
        }
        assert_eq!(outcome, StepOutcome::Diverged);
        assert!(lesson.loss_history.last().unwrap() > &lesson.loss_history[0]);
    }

    #[test]
    fn gradient_step_is_exact() {
        let bowl = Bowl { a: 2.0, b: 0.5 };
        assert_eq!(bowl.step((1.0, 2.0), 0.1), (1.0 - 0.4, 2.0 - 0.2));
    }

    #[test]
    fn diverged_render_stays_bounded() {
        let p = params(1.0);
        let mut lesson = GradientDescentLesson::starting_at(Bowl { a: 5.0, b: 5.0 }, (1.0, 1.0));
        for _ in 0..50 {
            lesson.step(&p);
        }
        let mut scene = Scene::new(crate::render::Viewport::new((0.0, 1.0), (0.0, 1.0), 100.0, 100.0));
        lesson.render(&mut scene);
        assert!(!scene.to_svg().contains("NaN"));
    }
}
