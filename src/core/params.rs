//! Bounded lesson parameters.
//!
//! Every knob a lesson exposes is described by a static [`ParamSpec`]. The
//! control layer (sliders in the browser, `--param` on the command line)
//! writes through [`ParamSet::set`], which clamps to the spec's range and
//! snaps to its step grid. Step functions read already-valid values.

use hashbrown::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub units: Option<&'static str>,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

impl ParamSpec {
    /// Clamp into `[min, max]` and snap onto the step grid anchored at `min`.
    pub fn constrain(&self, v: f64) -> f64 {
        let v = v.clamp(self.min, self.max);
        if self.step <= 0.0 {
            return v;
        }
        let steps = ((v - self.min) / self.step).round();
        // Trim float noise so 0.1-step values print cleanly.
        let snapped = ((self.min + steps * self.step) * 1e9).round() / 1e9;
        snapped.clamp(self.min, self.max)
    }

    /// Decimal places worth showing for this spec's step.
    pub fn decimals(&self) -> usize {
        let mut d = 0;
        let mut s = self.step;
        while d < 6 && s > 0.0 && (s - s.round()).abs() > 1e-9 {
            s *= 10.0;
            d += 1;
        }
        d
    }
}

/// Parameter shared by every lesson: auto-advance iteration cap.
pub const MAX_ITERATIONS: ParamSpec = ParamSpec {
    key: "max_iterations",
    label: "Max iterations",
    description: "Auto-advance stops after this many steps even if not converged.",
    units: None,
    min: 1.0,
    max: 2000.0,
    step: 1.0,
    default: 200.0,
};

/// Current values for one lesson's parameters.
#[derive(Clone, Debug)]
pub struct ParamSet {
    lesson: &'static str,
    specs: Vec<ParamSpec>,
    values: HashMap<&'static str, f64>,
}

impl ParamSet {
    pub fn new(lesson: &'static str, mut specs: Vec<ParamSpec>) -> Self {
        if !specs.iter().any(|s| s.key == MAX_ITERATIONS.key) {
            specs.push(MAX_ITERATIONS);
        }
        let values = specs.iter().map(|s| (s.key, s.default)).collect();
        Self {
            lesson,
            specs,
            values,
        }
    }

    pub fn lesson(&self) -> &'static str {
        self.lesson
    }

    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    pub fn spec(&self, key: &str) -> Option<&ParamSpec> {
        self.specs.iter().find(|s| s.key == key)
    }

    /// Current value, falling back to the spec default (or 0 for unknown keys).
    pub fn get(&self, key: &str) -> f64 {
        if let Some(v) = self.values.get(key) {
            return *v;
        }
        self.spec(key).map(|s| s.default).unwrap_or(0.0)
    }

    /// Convenience for count-like parameters.
    pub fn get_usize(&self, key: &str) -> usize {
        self.get(key).round().max(0.0) as usize
    }

    /// Store a value, clamped and snapped. Returns the stored value.
    pub fn set(&mut self, key: &str, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(Error::NonFinite {
                key: key.to_string(),
            });
        }
        let spec = self.spec(key).ok_or_else(|| Error::UnknownParam {
            lesson: self.lesson,
            key: key.to_string(),
        })?;
        let stored = spec.constrain(value);
        let key = spec.key;
        self.values.insert(key, stored);
        Ok(stored)
    }

    /// Parse and apply `key=value`.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<f64> {
        let (key, value) = parse_assignment(assignment)?;
        self.set(key, value)
    }

    pub fn reset_defaults(&mut self) {
        for s in &self.specs {
            self.values.insert(s.key, s.default);
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.get(MAX_ITERATIONS.key).round().max(1.0) as u32
    }

    /// Snapshot of the current values in spec order.
    pub fn entries(&self) -> Vec<ParamEntry> {
        self.specs
            .iter()
            .map(|s| ParamEntry {
                key: s.key.to_string(),
                value: self.get(s.key),
            })
            .collect()
    }
}

/// Split `key=value` into a trimmed key and a number.
pub fn parse_assignment(assignment: &str) -> Result<(&str, f64)> {
    let malformed = || Error::MalformedAssignment(assignment.to_string());
    let (key, raw) = assignment.split_once('=').ok_or_else(malformed)?;
    let value: f64 = raw.trim().parse().map_err(|_| malformed())?;
    Ok((key.trim(), value))
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParamEntry {
    pub key: String,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate() -> ParamSpec {
        ParamSpec {
            key: "rate",
            label: "Rate",
            description: "",
            units: None,
            min: 0.0,
            max: 1.0,
            step: 0.05,
            default: 0.1,
        }
    }

    #[test]
    fn set_clamps_and_snaps() {
        let mut p = ParamSet::new("test", vec![rate()]);
        assert_eq!(p.set("rate", 7.0).unwrap(), 1.0);
        assert_eq!(p.set("rate", -1.0).unwrap(), 0.0);
        assert_eq!(p.set("rate", 0.33).unwrap(), 0.35);
        assert_eq!(p.get("rate"), 0.35);
    }

    #[test]
    fn unknown_and_non_finite_are_rejected() {
        let mut p = ParamSet::new("test", vec![rate()]);
        assert!(matches!(
            p.set("nope", 1.0),
            Err(Error::UnknownParam { key, .. }) if key == "nope"
        ));
        assert!(matches!(p.set("rate", f64::NAN), Err(Error::NonFinite { .. })));
        assert_eq!(p.get("rate"), 0.1);
    }

    #[test]
    fn iteration_cap_is_always_present() {
        let mut p = ParamSet::new("test", vec![rate()]);
        assert_eq!(p.max_iterations(), 200);
        p.apply_assignment("max_iterations=12").unwrap();
        assert_eq!(p.max_iterations(), 12);
        p.reset_defaults();
        assert_eq!(p.max_iterations(), 200);
    }

    #[test]
    fn assignment_parsing() {
        let mut p = ParamSet::new("test", vec![rate()]);
        assert_eq!(p.apply_assignment(" rate = 0.5 ").unwrap(), 0.5);
        assert!(matches!(
            p.apply_assignment("rate"),
            Err(Error::MalformedAssignment(_))
        ));
        assert!(matches!(
            p.apply_assignment("rate=abc"),
            Err(Error::MalformedAssignment(_))
        ));
    }

    #[test]
    fn decimals_follow_step() {
        assert_eq!(rate().decimals(), 2);
        assert_eq!(MAX_ITERATIONS.decimals(), 0);
    }
}
