//! Stepping and auto-advance control for one lesson.
//!
//! A [`Driver`] exclusively owns a simulation, its parameters and its random
//! source. Auto-advance is ticket based: `start()` hands out a
//! [`TickTicket`] stamped with the current epoch, and every `stop`, `reset`
//! or regeneration bumps the epoch. A tick whose ticket is stale is ignored
//! without touching the simulation, so a timer that slips past cancellation
//! can never mutate state it no longer owns.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::params::{ParamSet, MAX_ITERATIONS};
use crate::prng::Prng;
use crate::render::Scene;
use crate::timeline::Timeline;

/// Result of one application of a lesson's step function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StepOutcome {
    Advanced,
    Converged,
    /// State left the finite range (e.g. learning rate past the stability bound).
    Diverged,
}

/// How a lesson reacts to a parameter edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamEffect {
    /// Read on the next step; nothing else to do.
    Live,
    /// The lesson recomputed its derived state in place.
    Recomputed,
    /// The dataset shape changed; regenerate from scratch.
    Regenerate,
}

/// A named scalar shown next to the chart.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Metric {
    pub name: &'static str,
    pub value: f64,
}

impl Metric {
    pub fn new(name: &'static str, value: f64) -> Self {
        Self { name, value }
    }
}

/// The contract every lesson implements.
pub trait Simulation {
    /// Rebuild the dataset and reset all evolving state (iteration 0).
    fn regenerate(&mut self, params: &ParamSet, rng: &mut Prng);

    /// Apply the step function once.
    fn step(&mut self, params: &ParamSet) -> StepOutcome;

    /// Steps applied since the last regeneration.
    fn iteration(&self) -> u32;

    fn is_converged(&self) -> bool;

    /// Add this lesson's geometry to `scene`. Must not fail on empty state.
    fn render(&self, scene: &mut Scene);

    fn metrics(&self) -> Vec<Metric> {
        Vec::new()
    }

    fn param_changed(&mut self, _key: &str, _params: &ParamSet) -> ParamEffect {
        ParamEffect::Live
    }

    /// Staged reveal played after regeneration.
    fn reveal(&self) -> Timeline {
        Timeline::new().fade_in("points", 400.0, 0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DriverPhase {
    /// Fresh dataset, no step taken yet.
    Idle,
    /// Advanced by explicit user steps (also where auto-advance halts).
    Stepping,
    /// Auto-advancing on a timer.
    Running,
    /// Terminal until reset.
    Converged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HaltReason {
    Converged,
    Diverged,
    IterationCap,
}

/// Permission to perform one auto-advance step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickTicket {
    epoch: u64,
}

impl TickTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickReply {
    /// Schedule the next tick with the same ticket.
    Continue,
    Halted(HaltReason),
    /// Ticket from a cancelled run; nothing happened.
    Stale,
}

pub struct Driver<S> {
    sim: S,
    params: ParamSet,
    rng: Prng,
    phase: DriverPhase,
    epoch: u64,
    halt: Option<HaltReason>,
    mutations: u64,
    generation: u64,
}

impl<S: Simulation> Driver<S> {
    pub fn new(mut sim: S, params: ParamSet, mut rng: Prng) -> Self {
        sim.regenerate(&params, &mut rng);
        Self {
            sim,
            params,
            rng,
            phase: DriverPhase::Idle,
            epoch: 0,
            halt: None,
            mutations: 1,
            generation: 1,
        }
    }

    pub fn sim(&self) -> &S {
        &self.sim
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Count of regenerations plus applied steps. Only grows.
    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    /// Datasets generated so far, the initial one included.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn set_phase(&mut self, phase: DriverPhase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, epoch = self.epoch, "driver phase");
            self.phase = phase;
        }
    }

    fn apply_step(&mut self) -> StepOutcome {
        let outcome = self.sim.step(&self.params);
        self.mutations += 1;
        outcome
    }

    /// One user-triggered step. Cancels auto-advance if it was running.
    pub fn step_once(&mut self) -> StepOutcome {
        if self.phase == DriverPhase::Converged {
            return StepOutcome::Converged;
        }
        if self.phase == DriverPhase::Running {
            self.epoch += 1;
        }
        let outcome = self.apply_step();
        match outcome {
            StepOutcome::Converged => {
                self.halt = Some(HaltReason::Converged);
                self.set_phase(DriverPhase::Converged);
            }
            StepOutcome::Diverged => {
                self.halt = Some(HaltReason::Diverged);
                self.set_phase(DriverPhase::Stepping);
            }
            StepOutcome::Advanced => self.set_phase(DriverPhase::Stepping),
        }
        outcome
    }

    /// Enter auto-advance. `None` when already running or converged.
    pub fn start(&mut self) -> Option<TickTicket> {
        match self.phase {
            DriverPhase::Running | DriverPhase::Converged => None,
            DriverPhase::Idle | DriverPhase::Stepping => {
                if self.sim.iteration() >= self.params.max_iterations() {
                    self.halt = Some(HaltReason::IterationCap);
                    return None;
                }
                self.epoch += 1;
                self.halt = None;
                self.set_phase(DriverPhase::Running);
                Some(TickTicket { epoch: self.epoch })
            }
        }
    }

    /// Leave auto-advance; outstanding tickets go stale.
    pub fn stop(&mut self) {
        if self.phase == DriverPhase::Running {
            self.epoch += 1;
            self.set_phase(DriverPhase::Stepping);
        }
    }

    pub fn on_tick(&mut self, ticket: TickTicket) -> TickReply {
        if ticket.epoch != self.epoch || self.phase != DriverPhase::Running {
            return TickReply::Stale;
        }
        let reason = match self.apply_step() {
            StepOutcome::Converged => Some(HaltReason::Converged),
            StepOutcome::Diverged => Some(HaltReason::Diverged),
            StepOutcome::Advanced if self.sim.iteration() >= self.params.max_iterations() => {
                Some(HaltReason::IterationCap)
            }
            StepOutcome::Advanced => None,
        };
        match reason {
            None => TickReply::Continue,
            Some(reason) => {
                self.halt = Some(reason);
                self.epoch += 1;
                let phase = if reason == HaltReason::Converged {
                    DriverPhase::Converged
                } else {
                    DriverPhase::Stepping
                };
                self.set_phase(phase);
                TickReply::Halted(reason)
            }
        }
    }

    /// Fresh dataset, iteration 0, phase `Idle`.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.sim.regenerate(&self.params, &mut self.rng);
        self.mutations += 1;
        self.generation += 1;
        self.halt = None;
        self.set_phase(DriverPhase::Idle);
    }

    /// Write a parameter through the control layer. Returns the stored value.
    pub fn set_param(&mut self, key: &str, value: f64) -> Result<f64> {
        let stored = self.params.set(key, value)?;
        // The cap belongs to the driver and is read on the next tick.
        if key == MAX_ITERATIONS.key {
            return Ok(stored);
        }
        match self.sim.param_changed(key, &self.params) {
            ParamEffect::Regenerate => self.reset(),
            ParamEffect::Recomputed => {
                self.mutations += 1;
                // A recompute can un-converge a one-shot lesson.
                if self.phase == DriverPhase::Converged && !self.sim.is_converged() {
                    self.halt = None;
                    self.set_phase(DriverPhase::Stepping);
                } else if self.sim.is_converged() && self.phase != DriverPhase::Running {
                    self.halt = Some(HaltReason::Converged);
                    self.set_phase(DriverPhase::Converged);
                }
            }
            ParamEffect::Live => {}
        }
        Ok(stored)
    }

    pub fn reset_params(&mut self) {
        self.params.reset_defaults();
        self.reset();
    }

    /// Build the lesson's scene at the given canvas size.
    pub fn scene(&self, width: f64, height: f64) -> Scene {
        let mut scene = Scene::new(crate::render::Viewport::new(
            (0.0, 1.0),
            (0.0, 1.0),
            width,
            height,
        ));
        self.sim.render(&mut scene);
        scene
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::params::ParamSpec;

    /// Counts to `target`, then converges.
    pub(crate) struct Counter {
        pub value: u32,
        pub target: u32,
    }

    impl Simulation for Counter {
        fn regenerate(&mut self, params: &ParamSet, _rng: &mut Prng) {
            self.value = 0;
            self.target = params.get_usize("target") as u32;
        }

        fn step(&mut self, _params: &ParamSet) -> StepOutcome {
            if self.value >= self.target {
                return StepOutcome::Converged;
            }
            self.value += 1;
            if self.value >= self.target {
                StepOutcome::Converged
            } else {
                StepOutcome::Advanced
            }
        }

        fn iteration(&self) -> u32 {
            self.value
        }

        fn is_converged(&self) -> bool {
            self.value >= self.target
        }

        fn render(&self, _scene: &mut Scene) {}

        fn param_changed(&mut self, key: &str, _params: &ParamSet) -> ParamEffect {
            if key == "target" {
                ParamEffect::Regenerate
            } else {
                ParamEffect::Live
            }
        }
    }

    pub(crate) fn counter_driver(target: u32) -> Driver<Counter> {
        let mut params = ParamSet::new(
            "counter",
            vec![ParamSpec {
                key: "target",
                label: "Target",
                description: "",
                units: None,
                min: 1.0,
                max: 1000.0,
                step: 1.0,
                default: 5.0,
            }],
        );
        params.set("target", target as f64).unwrap();
        Driver::new(
            Counter {
                value: 0,
                target: 0,
            },
            params,
            Prng::new(1),
        )
    }

    #[test]
    fn manual_steps_until_converged() {
        let mut d = counter_driver(3);
        assert_eq!(d.phase(), DriverPhase::Idle);
        assert_eq!(d.step_once(), StepOutcome::Advanced);
        assert_eq!(d.phase(), DriverPhase::Stepping);
        d.step_once();
        assert_eq!(d.step_once(), StepOutcome::Converged);
        assert_eq!(d.phase(), DriverPhase::Converged);

        let before = d.mutations();
        assert_eq!(d.step_once(), StepOutcome::Converged);
        assert_eq!(d.mutations(), before);
        assert_eq!(d.start(), None);
    }

    #[test]
    fn ticks_run_to_convergence() {
        let mut d = counter_driver(4);
        let t = d.start().unwrap();
        assert_eq!(d.on_tick(t), TickReply::Continue);
        assert_eq!(d.on_tick(t), TickReply::Continue);
        assert_eq!(d.on_tick(t), TickReply::Continue);
        assert_eq!(d.on_tick(t), TickReply::Halted(HaltReason::Converged));
        assert_eq!(d.phase(), DriverPhase::Converged);
        assert_eq!(d.on_tick(t), TickReply::Stale);
    }

    #[test]
    fn stale_ticket_after_reset_is_ignored() {
        let mut d = counter_driver(10);
        let t = d.start().unwrap();
        d.on_tick(t);
        d.reset();
        let mutations = d.mutations();
        let iteration = d.sim().iteration();

        assert_eq!(d.on_tick(t), TickReply::Stale);
        assert_eq!(d.mutations(), mutations);
        assert_eq!(d.sim().iteration(), iteration);
        assert_eq!(d.phase(), DriverPhase::Idle);
    }

    #[test]
    fn stop_then_restart_issues_fresh_ticket() {
        let mut d = counter_driver(10);
        let first = d.start().unwrap();
        assert_eq!(d.start(), None);
        d.stop();
        assert_eq!(d.phase(), DriverPhase::Stepping);
        let second = d.start().unwrap();
        assert_ne!(first, second);
        assert_eq!(d.on_tick(first), TickReply::Stale);
        assert_eq!(d.on_tick(second), TickReply::Continue);
    }

    #[test]
    fn iteration_cap_halts_auto_advance() {
        let mut d = counter_driver(100);
        d.set_param("max_iterations", 2.0).unwrap();
        let t = d.start().unwrap();
        assert_eq!(d.on_tick(t), TickReply::Continue);
        assert_eq!(d.on_tick(t), TickReply::Halted(HaltReason::IterationCap));
        assert_eq!(d.phase(), DriverPhase::Stepping);
        assert_eq!(d.start(), None);
        assert_eq!(d.halt_reason(), Some(HaltReason::IterationCap));
    }

    #[test]
    fn regenerating_param_resets_iteration() {
        let mut d = counter_driver(10);
        d.step_once();
        d.step_once();
        assert_eq!(d.sim().iteration(), 2);
        assert_eq!(d.generation(), 1);
        d.set_param("target", 20.0).unwrap();
        assert_eq!(d.sim().iteration(), 0);
        assert_eq!(d.phase(), DriverPhase::Idle);
        assert_eq!(d.sim().target, 20);
        assert_eq!(d.generation(), 2);
    }

    #[test]
    fn changing_the_cap_keeps_the_run() {
        let mut d = counter_driver(10);
        let t = d.start().unwrap();
        assert_eq!(d.on_tick(t), TickReply::Continue);
        assert_eq!(d.set_param("max_iterations", 500.0), Ok(500.0));
        assert_eq!(d.phase(), DriverPhase::Running);
        assert_eq!(d.sim().iteration(), 1);
        assert_eq!(d.generation(), 1);
        assert_eq!(d.on_tick(t), TickReply::Continue);

        d.set_param("max_iterations", 2.0).unwrap();
        assert_eq!(d.generation(), 1);
        assert_eq!(d.on_tick(t), TickReply::Halted(HaltReason::IterationCap));
    }

    #[test]
    fn manual_step_cancels_running() {
        let mut d = counter_driver(10);
        let t = d.start().unwrap();
        d.step_once();
        assert_eq!(d.phase(), DriverPhase::Stepping);
        assert_eq!(d.on_tick(t), TickReply::Stale);
    }
}
