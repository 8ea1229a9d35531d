//! Cycle scheduler.
//!
//! Everything that advances with the system clock implements [`Process`].
//! A [`Clock`] hands the same tick budget to each registered process in
//! registration order, so after every [`Clock::run`] call all processes
//! agree on the current time to within the length of one CPU instruction.
//!
//! A process that can only move in indivisible steps (the CPU executes
//! whole instructions) may overshoot its budget; it banks the overshoot and
//! deducts it from the next call. Splitting `run(n)` into any sequence of
//! smaller runs that sums to `n` therefore ends in the same state.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::Result;

/// Something driven by the system clock.
pub trait Process {
    /// Advance by `ticks` clock cycles.
    fn run(&mut self, ticks: u64) -> Result<()>;
}

/// Runs `inner` at `1/divisor` of the parent clock, carrying the remainder.
pub struct Divider<P> {
    inner: P,
    divisor: u64,
    remainder: u64,
}

impl<P: Process> Divider<P> {
    /// `divisor` is clamped to at least 1.
    pub fn new(inner: P, divisor: u64) -> Self {
        Divider { inner, divisor: divisor.max(1), remainder: 0 }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut P {
        &mut self.inner
    }
}

impl<P: Process> Process for Divider<P> {
    fn run(&mut self, ticks: u64) -> Result<()> {
        let total = self.remainder + ticks;
        self.remainder = total % self.divisor;
        let ticks = total / self.divisor;
        if ticks > 0 {
            self.inner.run(ticks)?;
        }
        Ok(())
    }
}

/// Master clock.
pub struct Clock {
    processes: Vec<Rc<RefCell<dyn Process>>>,
    now: u64,
    started: Instant,
    last_log: Instant,
    last_log_ticks: u64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        let now = Instant::now();
        Clock {
            processes: Vec::new(),
            now: 0,
            started: now,
            last_log: now,
            last_log_ticks: 0,
        }
    }

    pub fn add(&mut self, process: Rc<RefCell<dyn Process>>) {
        self.processes.push(process);
    }

    /// Ticks elapsed since the clock was created.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Advance every process by `ticks`, stopping at the first error.
    ///
    /// [`now`](Self::now) only counts batches every process completed. After
    /// an error the processes registered before the failing one have already
    /// run the batch and the rest have not, so the clock should not be run
    /// again without resetting them.
    pub fn run(&mut self, ticks: u64) -> Result<()> {
        for p in &self.processes {
            p.borrow_mut().run(ticks)?;
        }
        self.now += ticks;
        Ok(())
    }

    /// Effective emulated frequency since the previous call, in Hz. Also
    /// logged at info level.
    pub fn log_frequency(&mut self) -> f64 {
        let elapsed = self.last_log.elapsed().as_secs_f64();
        let ticks = self.now - self.last_log_ticks;
        let hz = if elapsed > 0.0 { ticks as f64 / elapsed } else { 0.0 };
        info!(ticks, mhz = hz / 1e6, "effective clock frequency");
        self.last_log = Instant::now();
        self.last_log_ticks = self.now;
        hz
    }

    /// Sleep until wall time catches up with emulated time at `freq_hz`.
    pub fn throttle(&self, freq_hz: f64) {
        // Also rejects NaN
        if !(freq_hz > 0.0) {
            return;
        }
        let target = Duration::from_secs_f64(self.now as f64 / freq_hz);
        let elapsed = self.started.elapsed();
        if target > elapsed {
            std::thread::sleep(target - elapsed);
        }
    }
}
