//! Cancelable tick scheduling.
//!
//! [`Runner`] pairs a [`Driver`] with a timer backend. It keeps at most one
//! pending tick and only schedules the next one after the current tick has
//! been handled, so ticks of one driver never overlap. Stopping, resetting
//! or dropping the runner cancels the pending tick; the driver's epoch check
//! covers backends where a timer fires anyway.

use crate::driver::{Driver, DriverPhase, Simulation, StepOutcome, TickReply, TickTicket};
use crate::error::Result;
use crate::time::Duration;

/// Timer backend: deliver `ticket` back to the runner after `delay`.
pub trait TickScheduler {
    type Handle;

    fn schedule(&mut self, delay: Duration, ticket: TickTicket) -> Self::Handle;

    /// Cancel a pending tick. Cancelling an already-fired handle is a no-op.
    fn cancel(&mut self, handle: Self::Handle);
}

pub struct Runner<S: Simulation, T: TickScheduler> {
    driver: Driver<S>,
    scheduler: T,
    pending: Option<(TickTicket, T::Handle)>,
    delay: Duration,
}

impl<S: Simulation, T: TickScheduler> Runner<S, T> {
    pub fn new(driver: Driver<S>, scheduler: T, delay: Duration) -> Self {
        Self {
            driver,
            scheduler,
            pending: None,
            delay,
        }
    }

    pub fn driver(&self) -> &Driver<S> {
        &self.driver
    }

    pub fn scheduler(&self) -> &T {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut T {
        &mut self.scheduler
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Applies from the next scheduled tick on.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_ticket(&self) -> Option<TickTicket> {
        self.pending.as_ref().map(|(t, _)| *t)
    }

    fn cancel_pending(&mut self) {
        if let Some((_, handle)) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
    }

    pub fn start(&mut self) -> bool {
        match self.driver.start() {
            Some(ticket) => {
                self.cancel_pending();
                let handle = self.scheduler.schedule(self.delay, ticket);
                self.pending = Some((ticket, handle));
                true
            }
            None => false,
        }
    }

    pub fn stop(&mut self) {
        self.cancel_pending();
        self.driver.stop();
    }

    pub fn reset(&mut self) {
        self.cancel_pending();
        self.driver.reset();
    }

    pub fn step_once(&mut self) -> StepOutcome {
        self.cancel_pending();
        self.driver.step_once()
    }

    pub fn set_param(&mut self, key: &str, value: f64) -> Result<f64> {
        let stored = self.driver.set_param(key, value)?;
        if self.driver.phase() != DriverPhase::Running {
            self.cancel_pending();
        }
        Ok(stored)
    }

    pub fn reset_params(&mut self) {
        self.cancel_pending();
        self.driver.reset_params();
    }

    /// Handle a delivered tick and schedule the next one if the run continues.
    pub fn fire(&mut self, ticket: TickTicket) -> TickReply {
        match &self.pending {
            Some((pending, _)) if *pending == ticket => {
                self.pending = None;
            }
            _ => return TickReply::Stale,
        }
        let reply = self.driver.on_tick(ticket);
        if reply == TickReply::Continue {
            let handle = self.scheduler.schedule(self.delay, ticket);
            self.pending = Some((ticket, handle));
        }
        reply
    }
}

impl<S: Simulation, T: TickScheduler> Drop for Runner<S, T> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// Deterministic virtual-time backend.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_id: u64,
    queue: Vec<(Duration, u64, TickTicket)>,
    cancelled: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    /// Earliest tick due at or before `until`; moves the clock to its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<TickTicket> {
        let (idx, _) = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, (due, _, _))| *due <= until)
            .min_by_key(|(_, (due, id, _))| (*due, *id))?;
        let (due, _, ticket) = self.queue.remove(idx);
        self.now = self.now.max(due);
        Some(ticket)
    }

    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

impl TickScheduler for ManualScheduler {
    type Handle = u64;

    fn schedule(&mut self, delay: Duration, ticket: TickTicket) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push((self.now + delay, id, ticket));
        id
    }

    fn cancel(&mut self, handle: u64) {
        let before = self.queue.len();
        self.queue.retain(|(_, id, _)| *id != handle);
        if self.queue.len() != before {
            self.cancelled += 1;
        }
    }
}

impl<S: Simulation> Runner<S, ManualScheduler> {
    /// Advance virtual time by `dt`, firing every tick that comes due in order.
    /// Returns the number of ticks delivered.
    pub fn advance(&mut self, dt: Duration) -> usize {
        let until = self.scheduler.now() + dt;
        let mut fired = 0;
        while let Some(ticket) = self.scheduler.pop_due(until) {
            self.fire(ticket);
            fired += 1;
        }
        self.scheduler.set_now(until);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::tests::counter_driver;
    use crate::driver::HaltReason;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn ticks_follow_the_delay() {
        let mut r = Runner::new(counter_driver(100), ManualScheduler::new(), ms(200));
        assert!(r.start());
        assert_eq!(r.advance(ms(199)), 0);
        assert_eq!(r.advance(ms(1)), 1);
        assert_eq!(r.advance(ms(1000)), 5);
        assert_eq!(r.driver().sim().value, 6);
        assert_eq!(r.scheduler().pending_len(), 1);
    }

    #[test]
    fn runs_until_converged_then_goes_quiet() {
        let mut r = Runner::new(counter_driver(3), ManualScheduler::new(), ms(100));
        r.start();
        r.advance(ms(10_000));
        assert_eq!(r.driver().phase(), DriverPhase::Converged);
        assert_eq!(r.driver().halt_reason(), Some(HaltReason::Converged));
        assert!(!r.is_pending());
        assert_eq!(r.scheduler().pending_len(), 0);
    }

    #[test]
    fn reset_while_running_stops_all_mutation() {
        let mut r = Runner::new(counter_driver(100), ManualScheduler::new(), ms(100));
        r.start();
        r.advance(ms(350));
        let stale = r.pending_ticket().unwrap();

        r.reset();
        let mutations = r.driver().mutations();
        assert_eq!(r.scheduler().pending_len(), 0);
        assert_eq!(r.scheduler().cancelled(), 1);

        assert_eq!(r.advance(ms(10_000)), 0);
        // A backend that failed to cancel still can't reach the simulation.
        assert_eq!(r.fire(stale), TickReply::Stale);
        assert_eq!(r.driver().mutations(), mutations);
        assert_eq!(r.driver().sim().value, 0);
    }

    #[test]
    fn stop_cancels_pending_tick() {
        let mut r = Runner::new(counter_driver(100), ManualScheduler::new(), ms(100));
        r.start();
        r.advance(ms(250));
        r.stop();
        let value = r.driver().sim().value;
        assert_eq!(r.advance(ms(1000)), 0);
        assert_eq!(r.driver().sim().value, value);
        assert_eq!(r.driver().phase(), DriverPhase::Stepping);
    }

    #[test]
    fn never_more_than_one_pending_tick() {
        let mut r = Runner::new(counter_driver(100), ManualScheduler::new(), ms(100));
        r.start();
        assert!(!r.start());
        for _ in 0..10 {
            r.advance(ms(30));
            assert!(r.scheduler().pending_len() <= 1);
        }
    }

    #[test]
    fn regenerating_param_cancels_run() {
        let mut r = Runner::new(counter_driver(100), ManualScheduler::new(), ms(100));
        r.start();
        r.advance(ms(200));
        r.set_param("target", 50.0).unwrap();
        assert!(!r.is_pending());
        assert_eq!(r.advance(ms(1000)), 0);
        assert_eq!(r.driver().sim().value, 0);
    }

    #[test]
    fn drop_cancels_pending_tick() {
        use std::cell::Cell;
        use std::rc::Rc;

        struct Spy(Rc<Cell<u32>>);
        impl TickScheduler for Spy {
            type Handle = ();
            fn schedule(&mut self, _delay: Duration, _ticket: TickTicket) {}
            fn cancel(&mut self, _handle: ()) {
                self.0.set(self.0.get() + 1);
            }
        }

        let cancels = Rc::new(Cell::new(0));
        {
            let mut r = Runner::new(counter_driver(10), Spy(Rc::clone(&cancels)), ms(10));
            r.start();
        }
        assert_eq!(cancels.get(), 1);
    }
}
