//! Margin intuition for a linear SVM.
//!
//! Not a solver: the boundary is the perpendicular bisector of the two class
//! means. The support vectors are the correctly classified points of each
//! class nearest that line, and the margin is the smaller of their
//! distances.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dataset::{gaussian_blobs, Point};
use crate::driver::{Metric, ParamEffect, Simulation, StepOutcome};
use crate::params::{ParamSet, ParamSpec};
use crate::prng::Prng;
use crate::render::{series_color, Scene, Style, HIGHLIGHT, INK};

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
            description: "Distance between the class centers.",
            units: None,
            min: 0.0,
            max: 6.0,
            step: 0.1,
            default: 3.5,
        },
        ParamSpec {
            key: "spread",
            label: "Spread",
            description: "Standard deviation of each class.",
            units: None,
            min: 0.2,
            max: 2.0,
            step: 0.1,
            default: 0.8,
        },
    ]
}

/// Line `normal · (p - anchor) = 0` with a unit normal pointing at class 1.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Boundary {
    pub normal: (f64, f64),
    pub anchor: (f64, f64),
}

impl Boundary {
    /// Bisector of the class means, `None` when a class is empty or the
    /// means coincide.
    pub fn bisector(points: &[Point]) -> Option<Self> {
        let m0 = class_mean(points, 0)?;
        let m1 = class_mean(points, 1)?;
        let (dx, dy) = (m1.0 - m0.0, m1.1 - m0.1);
        let len = dx.hypot(dy);
        if len < 1e-12 {
            return None;
        }
        Some(Self {
            normal: (dx / len, dy / len),
            anchor: ((m0.0 + m1.0) / 2.0, (m0.1 + m1.1) / 2.0),
        })
    }

    /// Positive on the class-1 side.
    pub fn signed_distance(&self, p: &Point) -> f64 {
        self.normal.0 * (p.x - self.anchor.0) + self.normal.1 * (p.y - self.anchor.1)
    }

    pub fn predict(&self, p: &Point) -> usize {
        usize::from(self.signed_distance(p) >= 0.0)
    }

    /// The boundary shifted by `offset` along the normal, clipped to a
    /// window of half-width `reach` around the anchor.
    fn segment(&self, offset: f64, reach: f64) -> ((f64, f64), (f64, f64)) {
        let (nx, ny) = self.normal;
        let c = (self.anchor.0 + nx * offset, self.anchor.1 + ny * offset);
        let t = (-ny, nx);
        (
            (c.0 - t.0 * reach, c.1 - t.1 * reach),
            (c.0 + t.0 * reach, c.1 + t.1 * reach),
        )
    }
}

fn class_mean(points: &[Point], class: usize) -> Option<(f64, f64)> {
    let (sx, sy, n) = points
        .iter()
        .filter(|p| p.label == Some(class))
        .fold((0.0, 0.0, 0usize), |(sx, sy, n), p| (sx + p.x, sy + p.y, n + 1));
    (n > 0).then(|| (sx / n as f64, sy / n as f64))
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SvmLesson {
    pub points: Vec<Point>,
    pub boundary: Option<Boundary>,
    /// Index of the support vector of class 0 and class 1.
    pub support: [Option<usize>; 2],
    pub margin: f64,
    pub misclassified: usize,
    iteration: u32,
    computed: bool,
}

impl SvmLesson {
    pub fn with_points(points: Vec<Point>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    fn compute(&mut self) {
        self.boundary = Boundary::bisector(&self.points);
        self.support = [None, None];
        self.margin = 0.0;
        self.misclassified = 0;

        let Some(boundary) = self.boundary else {
            self.computed = true;
            return;
        };
        let mut best = [f64::INFINITY; 2];
        for (i, p) in self.points.iter().enumerate() {
            let Some(label) = p.label.filter(|&l| l < 2) else {
                continue;
            };
            if boundary.predict(p) != label {
                self.misclassified += 1;
                continue;
            }
            let d = boundary.signed_distance(p).abs();
            if d < best[label] {
                best[label] = d;
                self.support[label] = Some(i);
            }
        }
        let margin = best[0].min(best[1]);
        self.margin = if margin.is_finite() { margin } else { 0.0 };
        self.computed = true;
    }
}

impl Simulation for SvmLesson {
    fn regenerate(&mut self, params: &ParamSet, rng: &mut Prng) {
        let half = params.get("separation") / 2.0;
        let angle = rng.gen_range_f64(0.0, std::f64::consts::PI);
        let (c, s) = (angle.cos() * half, angle.sin() * half);
        let points = gaussian_blobs(
            rng,
            &[(-c, -s), (c, s)],
            params.get_usize("per_class"),
            params.get("spread"),
        );
        *self = Self::with_points(points);
    }

    fn step(&mut self, _params: &ParamSet) -> StepOutcome {
        self.compute();
        self.iteration += 1;
        StepOutcome::Converged
    }

    fn iteration(&self) -> u32 {
        self.iteration
    }

    fn is_converged(&self) -> bool {
        self.computed
    }

    fn param_changed(&mut self, _key: &str, _params: &ParamSet) -> ParamEffect {
        ParamEffect::Regenerate
    }

    fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("margin", self.margin),
            Metric::new("misclassified", self.misclassified as f64),
        ]
    }

    fn render(&self, scene: &mut Scene) {
        scene.fit(&self.points, 0.1);
        scene.axes();
        let v = scene.viewport;
        let reach = (v.x_max - v.x_min).hypot(v.y_max - v.y_min);

        if let (true, Some(b)) = (self.computed, self.boundary) {
            let (a, z) = b.segment(0.0, reach);
            scene.line("boundary", a, z, Style::stroke(HIGHLIGHT, 2.0));
            for side in [-1.0, 1.0] {
                let (a, z) = b.segment(side * self.margin, reach);
                scene.line("margin", a, z, Style::stroke(HIGHLIGHT, 1.0).with_opacity(0.5));
            }
        }
        for p in &self.points {
            scene.circle(
                "points",
                (p.x, p.y),
                4.0,
                Style::fill(series_color(p.label.unwrap_or(0))),
            );
        }
        for &i in self.support.iter().flatten() {
            let p = &self.points[i];
            scene.circle("support", (p.x, p.y), 8.0, Style::stroke(INK, 2.0));
        }
    }

    fn reveal(&self) -> crate::timeline::Timeline {
        crate::timeline::Timeline::new()
            .fade_in("points", 300.0, 0.0)
            .fade_in("boundary", 300.0, 250.0)
            .fade_in("margin", 300.0, 450.0)
            .fade_in("support", 300.0, 650.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::labeled(-2.0, 0.0, 0),
            Point::labeled(-1.0, 1.0, 0),
            Point::labeled(-3.0, -1.0, 0),
            Point::labeled(2.0, 0.0, 1),
            Point::labeled(1.0, -1.0, 1),
            Point::labeled(3.0, 1.0, 1),
        ]
    }

    #[test]
    fn bisector_of_symmetric_classes_is_the_y_axis() {
        let b = Boundary::bisector(&square()).unwrap();
        assert!((b.normal.0 - 1.0).abs() < 1e-12 && b.normal.1.abs() < 1e-12);
        assert!(b.anchor.0.abs() < 1e-12 && b.anchor.1.abs() < 1e-12);
    }

    #[test]
    fn support_vectors_are_nearest_points() {
        let mut lesson = SvmLesson::with_points(square());
        assert_eq!(lesson.step(&ParamSet::new("svm", param_specs())), StepOutcome::Converged);
        assert_eq!(lesson.support, [Some(1), Some(4)]);
        assert!((lesson.margin - 1.0).abs() < 1e-12);
        assert_eq!(lesson.misclassified, 0);
    }

    #[test]
    fn counts_points_on_the_wrong_side() {
        let mut pts = square();
        pts.push(Point::labeled(0.5, 0.0, 0));
        let mut lesson = SvmLesson::with_points(pts);
        lesson.step(&ParamSet::new("svm", param_specs()));
        assert_eq!(lesson.misclassified, 1);
    }

    #[test]
    fn coincident_means_have_no_boundary() {
        let pts = vec![Point::labeled(1.0, 1.0, 0), Point::labeled(1.0, 1.0, 1)];
        let mut lesson = SvmLesson::with_points(pts);
        lesson.step(&ParamSet::new("svm", param_specs()));
        assert!(lesson.boundary.is_none());
        assert_eq!(lesson.margin, 0.0);
        assert!(lesson.is_converged());
    }
}
