//! Shannon entropy of a class histogram.
//!
//! `H = -Σ p_k log2(p_k)` over the current class counts, recomputed in full
//! whenever a count changes. Gini impurity is shown alongside.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dataset::{MAX_CLASSES, MAX_PER_CLASS};
use crate::driver::{Metric, ParamEffect, Simulation, StepOutcome};
use crate::params::{ParamSet, ParamSpec};
use crate::prng::Prng;
use crate::render::{series_color, Scene, Style, HIGHLIGHT};

const COUNT_KEYS: [&str; MAX_CLASSES] = ["count_0", "count_1", "count_2", "count_3", "count_4"];
const COUNT_LABELS: [&str; MAX_CLASSES] = ["Class A", "Class B", "Class C", "Class D", "Class E"];

pub fn param_specs() -> Vec<ParamSpec> {
    let mut specs = vec![ParamSpec {
        key: "classes",
        label: "Classes",
        description: "Number of classes in the node.",
        units: None,
        min: 1.0,
        max: MAX_CLASSES as f64,
        step: 1.0,
        default: 2.0,
    }];
    for (i, &key) in COUNT_KEYS.iter().enumerate() {
        specs.push(ParamSpec {
            key,
            label: COUNT_LABELS[i],
            description: "Samples of this class.",
            units: Some("samples"),
            min: 0.0,
            max: MAX_PER_CLASS as f64,
            step: 1.0,
            default: if i < 2 { 10.0 } else { 0.0 },
        });
    }
    specs
}

/// Probabilities from counts. Empty total gives an empty distribution.
pub fn distribution(counts: &[u32]) -> Vec<f64> {
    let total: u64 = counts.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts
        .iter()
        .map(|&c| c as f64 / total as f64)
        .collect()
}

/// Entropy in bits. Zero-probability classes contribute nothing.
pub fn entropy_bits(counts: &[u32]) -> f64 {
    let h: f64 = distribution(counts)
        .into_iter()
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.log2())
        .sum();
    // -0.0 for a pure node reads oddly in the UI.
    h.max(0.0)
}

/// Gini impurity `1 - Σ p²`; 0 for an empty node.
pub fn gini(counts: &[u32]) -> f64 {
    let p = distribution(counts);
    if p.iter().all(|&x| x == 0.0) {
        return 0.0;
    }
    1.0 - p.iter().map(|x| x * x).sum::<f64>()
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntropyLesson {
    pub counts: Vec<u32>,
    pub probabilities: Vec<f64>,
    pub entropy: f64,
    pub gini: f64,
    iteration: u32,
    computed: bool,
}

impl EntropyLesson {
    fn read_counts(&mut self, params: &ParamSet) {
        let classes = params.get_usize("classes").clamp(1, MAX_CLASSES);
        self.counts = COUNT_KEYS[..classes]
            .iter()
            .map(|k| params.get_usize(k).min(MAX_PER_CLASS) as u32)
            .collect();
    }

    fn recompute(&mut self) {
        self.probabilities = distribution(&self.counts);
        self.entropy = entropy_bits(&self.counts);
        self.gini = gini(&self.counts);
        self.computed = true;
    }

    /// Largest possible entropy for the current class count.
    pub fn max_entropy(&self) -> f64 {
        (self.counts.len().max(1) as f64).log2()
    }
}

impl Simulation for EntropyLesson {
    fn regenerate(&mut self, params: &ParamSet, _rng: &mut Prng) {
        self.read_counts(params);
        self.probabilities = distribution(&self.counts);
        self.entropy = entropy_bits(&self.counts);
        self.gini = gini(&self.counts);
        self.iteration = 0;
        self.computed = false;
    }

    fn step(&mut self, params: &ParamSet) -> StepOutcome {
        self.read_counts(params);
        self.recompute();
        self.iteration += 1;
        StepOutcome::Converged
    }

    fn iteration(&self) -> u32 {
        self.iteration
    }

    fn is_converged(&self) -> bool {
        self.computed
    }

    fn param_changed(&mut self, key: &str, params: &ParamSet) -> ParamEffect {
        if key == "classes" || COUNT_KEYS.contains(&key) {
            self.read_counts(params);
            self.recompute();
            ParamEffect::Recomputed
        } else {
            ParamEffect::Live
        }
    }

    fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("entropy_bits", self.entropy),
            Metric::new("max_entropy_bits", self.max_entropy()),
            Metric::new("gini", self.gini),
        ]
    }

    fn render(&self, scene: &mut Scene) {
        let n = self.counts.len().max(1) as f64;
        scene.set_range((0.0, n), (0.0, 1.1));
        scene.axes();

        for (i, p) in self.probabilities.iter().enumerate() {
            let x0 = i as f64 + 0.15;
            let x1 = i as f64 + 0.85;
            scene.rect("bars", (x0, 0.0), (x1, *p), Style::fill(series_color(i)));
            scene.text("labels", (i as f64 + 0.5, p + 0.04), self.counts[i].to_string());
        }

        if self.computed {
            // Entropy normalised to the max for this class count.
            let max = self.max_entropy();
            let level = if max > 0.0 { self.entropy / max } else { 0.0 };
            scene.line("gauge", (0.0, level), (n, level), Style::stroke(HIGHLIGHT, 2.0));
            scene.text("gauge", (n * 0.5, 1.05), format!("H = {:.3} bits", self.entropy));
        }
    }

    fn reveal(&self) -> crate::timeline::Timeline {
        crate::timeline::Timeline::new()
            .fade_in("bars", 300.0, 0.0)
            .fade_in("gauge", 300.0, 200.0)
    }
}
