//! Staged visual reveals.
//!
//! A [`Timeline`] is an ordered list of tweens, each moving one
//! `(target, property)` value by `delta` over `duration_ms`, starting at
//! `offset_ms`. Overlapping tweens on the same property add up. A
//! [`TimelinePlayer`] advances a timeline by wall-clock deltas and reports
//! completion exactly once.

use hashbrown::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    #[default]
    Linear,
    /// Cubic ease-in-out.
    InOut,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::InOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tween {
    pub target: &'static str,
    pub property: &'static str,
    pub delta: f64,
    pub duration_ms: f64,
    pub offset_ms: f64,
    pub easing: Easing,
}

impl Tween {
    pub fn new(
        target: &'static str,
        property: &'static str,
        delta: f64,
        duration_ms: f64,
        offset_ms: f64,
    ) -> Self {
        Self {
            target,
            property,
            delta,
            duration_ms,
            offset_ms,
            easing: Easing::Linear,
        }
    }

    pub fn eased(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn end_ms(&self) -> f64 {
        self.offset_ms.max(0.0) + self.duration_ms.max(0.0)
    }

    /// Fraction of `delta` applied at time `t_ms`.
    fn progress(&self, t_ms: f64) -> f64 {
        let start = self.offset_ms.max(0.0);
        if t_ms < start {
            return 0.0;
        }
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        self.easing.apply((t_ms - start) / self.duration_ms)
    }
}

/// Property values at one instant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimelineFrame {
    values: HashMap<(&'static str, &'static str), f64>,
}

impl TimelineFrame {
    pub fn get(&self, target: &str, property: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|((t, p), _)| *t == target && *p == property)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Timeline {
    base: HashMap<(&'static str, &'static str), f64>,
    tweens: Vec<Tween>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starting value of a property (defaults to 0).
    pub fn set_base(&mut self, target: &'static str, property: &'static str, value: f64) {
        self.base.insert((target, property), value);
    }

    pub fn push(&mut self, tween: Tween) {
        self.tweens.push(tween);
    }

    /// Fade `target` in from 0 to 1.
    pub fn fade_in(mut self, target: &'static str, duration_ms: f64, offset_ms: f64) -> Self {
        self.set_base(target, "opacity", 0.0);
        self.push(Tween::new(target, "opacity", 1.0, duration_ms, offset_ms).eased(Easing::InOut));
        self
    }

    pub fn tweens(&self) -> &[Tween] {
        &self.tweens
    }

    pub fn duration_ms(&self) -> f64 {
        self.tweens.iter().map(Tween::end_ms).fold(0.0, f64::max)
    }

    pub fn sample(&self, t_ms: f64) -> TimelineFrame {
        let mut values = self.base.clone();
        for tw in &self.tweens {
            *values.entry((tw.target, tw.property)).or_insert(0.0) += tw.delta * tw.progress(t_ms);
        }
        TimelineFrame { values }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    Playing(TimelineFrame),
    /// Emitted once, carrying the final frame.
    Completed(TimelineFrame),
    Idle,
}

/// Plays a timeline once.
#[derive(Clone, Debug)]
pub struct TimelinePlayer {
    timeline: Timeline,
    elapsed_ms: f64,
    done: bool,
}

impl TimelinePlayer {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            elapsed_ms: 0.0,
            done: false,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Current frame without advancing.
    pub fn frame(&self) -> TimelineFrame {
        self.timeline.sample(self.elapsed_ms)
    }

    pub fn advance(&mut self, dt_ms: f64) -> PlayerEvent {
        if self.done {
            return PlayerEvent::Idle;
        }
        if dt_ms.is_finite() && dt_ms > 0.0 {
            self.elapsed_ms += dt_ms;
        }
        let total = self.timeline.duration_ms();
        if self.elapsed_ms >= total {
            self.elapsed_ms = total;
            self.done = true;
            PlayerEvent::Completed(self.timeline.sample(total))
        } else {
            PlayerEvent::Playing(self.timeline.sample(self.elapsed_ms))
        }
    }

    /// Jump to the end (used when motion is disabled).
    pub fn finish(&mut self) -> PlayerEvent {
        self.advance(f64::MAX)
    }

    pub fn restart(&mut self) {
        self.elapsed_ms = 0.0;
        self.done = false;
    }
}
