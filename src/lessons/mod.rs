//! Lesson inventory and dispatch.
//!
//! Every lesson is a [`Simulation`]. [`ActiveLesson`] wraps them in one enum
//! so a driver, a runner or a UI widget can hold "whichever lesson is
//! selected" without boxing.

pub mod entropy;
pub mod gradient_descent;
pub mod kmeans;
pub mod label_propagation;
pub mod lasso;
pub mod linear_regression;
pub mod logistic_regression;
pub mod roc;
pub mod svm;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::driver::{Driver, Metric, ParamEffect, Simulation, StepOutcome};
use crate::error::{Error, Result};
use crate::params::{ParamSet, ParamSpec};
use crate::prng::Prng;
use crate::render::Scene;
use crate::timeline::Timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LessonKind {
    Entropy,
    LinearRegression,
    LogisticRegression,
    GradientDescent,
    Kmeans,
    LabelPropagation,
    Lasso,
    Roc,
    Svm,
}

impl LessonKind {
    pub fn label(self) -> &'static str {
        match self {
            LessonKind::Entropy => "entropy",
            LessonKind::LinearRegression => "linear_regression",
            LessonKind::LogisticRegression => "logistic_regression",
            LessonKind::GradientDescent => "gradient_descent",
            LessonKind::Kmeans => "kmeans",
            LessonKind::LabelPropagation => "label_propagation",
            LessonKind::Lasso => "lasso",
            LessonKind::Roc => "roc",
            LessonKind::Svm => "svm",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            LessonKind::Entropy => "Entropy",
            LessonKind::LinearRegression => "Linear Regression",
            LessonKind::LogisticRegression => "Logistic Regression",
            LessonKind::GradientDescent => "Gradient Descent",
            LessonKind::Kmeans => "K-Means",
            LessonKind::LabelPropagation => "Label Propagation",
            LessonKind::Lasso => "LASSO Path",
            LessonKind::Roc => "ROC Curve",
            LessonKind::Svm => "SVM Margin",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LessonKind::Entropy => "Shannon entropy of a class histogram. Move the counts and watch the impurity of the node change; two equal classes carry exactly one bit.",
            LessonKind::LinearRegression => "Fit a line to noisy samples by full-batch gradient descent on the mean squared error. Too large a learning rate and the loss explodes.",
            LessonKind::LogisticRegression => "Separate two classes with a sigmoid. Each step follows the gradient of the mean log-loss and the decision boundary w·x + b = 0 swings into place.",
            LessonKind::GradientDescent => "A ball rolling down a quadratic bowl. Below 1/max(a, b) the walk settles at the minimum; above it every step overshoots further.",
            LessonKind::Kmeans => "Lloyd's algorithm: assign every point to its nearest centroid, move every centroid to the mean of its points, repeat until nothing moves.",
            LessonKind::LabelPropagation => "A handful of labeled points spread their classes over a k-nearest-neighbour graph. Propagation clamps the seeds; spreading lets them soften.",
            LessonKind::Lasso => "Soft-thresholding shows how the L1 penalty pushes coefficients to exactly zero as λ grows, one feature at a time.",
            LessonKind::Roc => "Sweep the decision threshold from 0 to 1 and trace the true-positive rate against the false-positive rate. The area under the curve summarises the ranking.",
            LessonKind::Svm => "The widest street between two classes. This sketch places the boundary halfway between the class means and marks the points that hold up the margin.",
        }
    }

    /// Formula shown above the chart, in TeX.
    pub fn formula(self) -> &'static str {
        match self {
            LessonKind::Entropy => r"H = -\sum_k p_k \log_2 p_k",
            LessonKind::LinearRegression => r"L(w,b) = \frac{1}{n}\sum_i (w x_i + b - y_i)^2",
            LessonKind::LogisticRegression => {
                r"L = -\frac{1}{n}\sum_i y_i \log \sigma(z_i) + (1-y_i)\log(1-\sigma(z_i))"
            }
            LessonKind::GradientDescent => r"\theta \leftarrow \theta - \alpha \nabla f(\theta)",
            LessonKind::Kmeans => r"\mu_j = \frac{1}{|C_j|}\sum_{x \in C_j} x",
            LessonKind::LabelPropagation => r"F_i \leftarrow \frac{\sum_j w_{ij} F_j}{\sum_j w_{ij}},\; w_{ij} = e^{-d_{ij}^2 / 2\sigma^2}",
            LessonKind::Lasso => r"S(\beta, \lambda) = \operatorname{sign}(\beta)\max(|\beta| - \lambda, 0)",
            LessonKind::Roc => r"\mathrm{AUC} = \int_0^1 \mathrm{TPR}\, d\,\mathrm{FPR}",
            LessonKind::Svm => r"\text{margin} = \min_i \frac{|w \cdot x_i + b|}{\lVert w \rVert}",
        }
    }

    /// Auto-advance delay. Cheap one-shot lessons tick slower so each state
    /// is readable.
    pub fn default_tick_ms(self) -> u32 {
        match self {
            LessonKind::Entropy | LessonKind::Svm => 600,
            LessonKind::Kmeans | LessonKind::LabelPropagation => 400,
            LessonKind::Roc => 200,
            _ => 300,
        }
    }

    pub fn param_specs(self) -> Vec<ParamSpec> {
        match self {
            LessonKind::Entropy => entropy::param_specs(),
            LessonKind::LinearRegression => linear_regression::param_specs(),
            LessonKind::LogisticRegression => logistic_regression::param_specs(),
            LessonKind::GradientDescent => gradient_descent::param_specs(),
            LessonKind::Kmeans => kmeans::param_specs(),
            LessonKind::LabelPropagation => label_propagation::param_specs(),
            LessonKind::Lasso => lasso::param_specs(),
            LessonKind::Roc => roc::param_specs(),
            LessonKind::Svm => svm::param_specs(),
        }
    }

    pub fn default_params(self) -> ParamSet {
        ParamSet::new(self.label(), self.param_specs())
    }

    pub fn from_label(label: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.label() == label)
            .ok_or_else(|| Error::UnknownLesson(label.to_string()))
    }

    pub fn all() -> &'static [LessonKind] {
        &[
            LessonKind::Entropy,
            LessonKind::LinearRegression,
            LessonKind::LogisticRegression,
            LessonKind::GradientDescent,
            LessonKind::Kmeans,
            LessonKind::LabelPropagation,
            LessonKind::Lasso,
            LessonKind::Roc,
            LessonKind::Svm,
        ]
    }
}

impl std::str::FromStr for LessonKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(s)
    }
}

/// Any lesson, chosen at runtime.
#[derive(Clone, Debug)]
pub enum ActiveLesson {
    Entropy(entropy::EntropyLesson),
    LinearRegression(linear_regression::LinearRegressionLesson),
    LogisticRegression(logistic_regression::LogisticRegressionLesson),
    GradientDescent(gradient_descent::GradientDescentLesson),
    Kmeans(kmeans::KmeansLesson),
    LabelPropagation(label_propagation::LabelPropagationLesson),
    Lasso(lasso::LassoLesson),
    Roc(roc::RocLesson),
    Svm(svm::SvmLesson),
}

/// Forward a `Simulation` method to whichever lesson is active.
macro_rules! dispatch {
    ($self:expr, $lesson:ident => $body:expr) => {
        match $self {
            ActiveLesson::Entropy($lesson) => $body,
            ActiveLesson::LinearRegression($lesson) => $body,
            ActiveLesson::LogisticRegression($lesson) => $body,
            ActiveLesson::GradientDescent($lesson) => $body,
            ActiveLesson::Kmeans($lesson) => $body,
            ActiveLesson::LabelPropagation($lesson) => $body,
            ActiveLesson::Lasso($lesson) => $body,
            ActiveLesson::Roc($lesson) => $body,
            ActiveLesson::Svm($lesson) => $body,
        }
    };
}

impl ActiveLesson {
    /// Empty state for `kind`; populated by the first `regenerate`.
    pub fn new(kind: LessonKind) -> Self {
        match kind {
            LessonKind::Entropy => ActiveLesson::Entropy(Default::default()),
            LessonKind::LinearRegression => ActiveLesson::LinearRegression(Default::default()),
            LessonKind::LogisticRegression => ActiveLesson::LogisticRegression(Default::default()),
            LessonKind::GradientDescent => ActiveLesson::GradientDescent(Default::default()),
            LessonKind::Kmeans => ActiveLesson::Kmeans(Default::default()),
            LessonKind::LabelPropagation => ActiveLesson::LabelPropagation(Default::default()),
            LessonKind::Lasso => ActiveLesson::Lasso(Default::default()),
            LessonKind::Roc => ActiveLesson::Roc(Default::default()),
            LessonKind::Svm => ActiveLesson::Svm(Default::default()),
        }
    }

    pub fn kind(&self) -> LessonKind {
        match self {
            ActiveLesson::Entropy(_) => LessonKind::Entropy,
            ActiveLesson::LinearRegression(_) => LessonKind::LinearRegression,
            ActiveLesson::LogisticRegression(_) => LessonKind::LogisticRegression,
            ActiveLesson::GradientDescent(_) => LessonKind::GradientDescent,
            ActiveLesson::Kmeans(_) => LessonKind::Kmeans,
            ActiveLesson::LabelPropagation(_) => LessonKind::LabelPropagation,
            ActiveLesson::Lasso(_) => LessonKind::Lasso,
            ActiveLesson::Roc(_) => LessonKind::Roc,
            ActiveLesson::Svm(_) => LessonKind::Svm,
        }
    }

    /// Lesson state as JSON, for snapshots and debugging.
    #[cfg(feature = "serde")]
    pub fn state_json(&self) -> serde_json::Result<serde_json::Value> {
        dispatch!(self, l => serde_json::to_value(l))
    }
}

impl Simulation for ActiveLesson {
    fn regenerate(&mut self, params: &ParamSet, rng: &mut Prng) {
        dispatch!(self, l => l.regenerate(params, rng))
    }

    fn step(&mut self, params: &ParamSet) -> StepOutcome {
        dispatch!(self, l => l.step(params))
    }

    fn iteration(&self) -> u32 {
        dispatch!(self, l => l.iteration())
    }

    fn is_converged(&self) -> bool {
        dispatch!(self, l => l.is_converged())
    }

    fn render(&self, scene: &mut Scene) {
        dispatch!(self, l => l.render(scene))
    }

    fn metrics(&self) -> Vec<Metric> {
        dispatch!(self, l => l.metrics())
    }

    fn param_changed(&mut self, key: &str, params: &ParamSet) -> ParamEffect {
        dispatch!(self, l => l.param_changed(key, params))
    }

    fn reveal(&self) -> Timeline {
        dispatch!(self, l => l.reveal())
    }
}

/// Driver for `kind` with default parameters and a fresh dataset.
pub fn new_driver(kind: LessonKind, rng: Prng) -> Driver<ActiveLesson> {
    Driver::new(ActiveLesson::new(kind), kind.default_params(), rng)
}

/// One serialisable view of a driver: what a runner prints per tick.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Frame {
    pub lesson: LessonKind,
    pub iteration: u32,
    pub phase: crate::driver::DriverPhase,
    pub converged: bool,
    pub metrics: Vec<Metric>,
    pub params: Vec<crate::params::ParamEntry>,
}

impl Frame {
    pub fn capture(driver: &Driver<ActiveLesson>) -> Self {
        let sim = driver.sim();
        Self {
            lesson: sim.kind(),
            iteration: sim.iteration(),
            phase: driver.phase(),
            converged: sim.is_converged(),
            metrics: sim.metrics(),
            params: driver.params().entries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverPhase;

    #[test]
    fn lesson_inventory_is_stable() {
        let all = LessonKind::all();
        assert_eq!(all.len(), 9);

        let mut labels: Vec<&'static str> = all.iter().copied().map(LessonKind::label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 9);

        for k in all {
            assert!(!k.display_name().trim().is_empty());
            assert!(!k.description().trim().is_empty());
            assert!(!k.formula().trim().is_empty());
            assert_eq!(LessonKind::from_label(k.label()), Ok(*k));
            assert_eq!(ActiveLesson::new(*k).kind(), *k);
        }
    }

    #[test]
    fn unknown_label_is_an_error() {
        assert_eq!(
            LessonKind::from_label("tsne"),
            Err(Error::UnknownLesson("tsne".into()))
        );
    }

    #[test]
    fn param_keys_are_unique_per_lesson() {
        for k in LessonKind::all() {
            let params = k.default_params();
            let mut keys: Vec<&str> = params.specs().iter().map(|s| s.key).collect();
            let n = keys.len();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), n, "{}", k.label());
            for s in params.specs() {
                assert!(s.min <= s.default && s.default <= s.max, "{}.{}", k.label(), s.key);
            }
        }
    }

    #[test]
    fn every_lesson_steps_and_renders() {
        for (i, k) in LessonKind::all().iter().enumerate() {
            let mut driver = new_driver(*k, Prng::new(100 + i as u64));
            assert_eq!(driver.phase(), DriverPhase::Idle);
            assert_eq!(driver.sim().iteration(), 0);

            let empty = driver.scene(320.0, 240.0).to_svg();
            assert!(empty.starts_with("<svg"), "{}", k.label());

            for _ in 0..5 {
                driver.step_once();
            }
            assert!(driver.sim().iteration() >= 1, "{}", k.label());
            let svg = driver.scene(320.0, 240.0).to_svg();
            assert!(!svg.contains("NaN"), "{}", k.label());
        }
    }

    #[test]
    fn empty_lessons_render() {
        for k in LessonKind::all() {
            let lesson = ActiveLesson::new(*k);
            let mut scene = Scene::new(crate::render::Viewport::new((0.0, 1.0), (0.0, 1.0), 100.0, 80.0));
            lesson.render(&mut scene);
            assert!(scene.to_svg().contains("</svg>"));
        }
    }

    #[test]
    fn regeneration_resets_iteration() {
        let mut driver = new_driver(LessonKind::Kmeans, Prng::new(1));
        driver.step_once();
        driver.step_once();
        driver.reset();
        assert_eq!(driver.sim().iteration(), 0);
    }

    #[test]
    fn iteration_cap_edit_keeps_every_dataset() {
        for (i, k) in LessonKind::all().iter().enumerate() {
            let mut driver = new_driver(*k, Prng::new(40 + i as u64));
            driver.step_once();
            let iteration = driver.sim().iteration();
            let before = driver.scene(320.0, 240.0).to_svg();
            let phase = driver.phase();
            driver.set_param("max_iterations", 500.0).unwrap();
            assert_eq!(driver.sim().iteration(), iteration, "{}", k.label());
            assert_eq!(driver.generation(), 1, "{}", k.label());
            assert_eq!(driver.scene(320.0, 240.0).to_svg(), before, "{}", k.label());
            assert_eq!(driver.phase(), phase, "{}", k.label());
        }
    }

    #[test]
    fn iteration_cap_edit_leaves_the_seeded_data_alone() {
        let mut plain = new_driver(LessonKind::Kmeans, Prng::new(9));
        let mut capped = new_driver(LessonKind::Kmeans, Prng::new(9));
        capped.set_param("max_iterations", 50.0).unwrap();
        plain.reset();
        capped.reset();
        assert_eq!(plain.scene(320.0, 240.0).to_svg(), capped.scene(320.0, 240.0).to_svg());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn frame_serialises() {
        let mut driver = new_driver(LessonKind::Roc, Prng::new(2));
        driver.step_once();
        let frame = Frame::capture(&driver);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"lesson\":\"roc\""));
        assert!(json.contains("\"iteration\":1"));
        assert!(driver.sim().state_json().unwrap().is_object());
    }
}
