//! Simulation clock abstraction.
//!
//! The engine never reads wall time. It asks a [`Clock`] for the current
//! simulated time and advances it once per tick. [`SimClock`] is the
//! built-in implementation: it accumulates elapsed time in Q32.32 fixed
//! point, so a run of N steps of the same `dt` lands on exactly the same
//! elapsed value every time, whatever order the steps were batched in.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Q32.32 fixed-point seconds.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation progress.
pub type Ticks = u64;

/// Source of simulated time.
pub trait Clock: std::fmt::Debug {
    /// Absolute simulated time in seconds (start offset + elapsed).
    fn now(&self) -> f64;

    /// Length of the most recent step in seconds.
    fn delta_time(&self) -> f64;

    /// Seconds elapsed since the start of the run.
    fn elapsed_seconds(&self) -> f64;

    /// Number of steps taken since the start of the run.
    fn tick(&self) -> Ticks;

    /// Advance by one step of `dt` seconds.
    fn advance(&mut self, dt: f64);

    /// Return to the start of the run.
    fn reset(&mut self);

    /// Where the clock stands within the run.
    fn checkpoint(&self) -> ClockCheckpoint;

    /// Jump to a checkpoint taken earlier in this or an identical run.
    fn restore(&mut self, checkpoint: &ClockCheckpoint);
}

/// Run position of a [`Clock`], stored in engine snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockCheckpoint {
    pub elapsed: Fixed64,
    pub last_dt: Fixed64,
    pub tick: Ticks,
}

/// Deterministic fixed-point clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    /// Absolute time corresponding to elapsed zero.
    start: Fixed64,
    elapsed: Fixed64,
    last_dt: Fixed64,
    tick: Ticks,
}

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    /// A clock whose `now()` starts at `start` seconds.
    pub fn starting_at(start: f64) -> Self {
        Self {
            start: Fixed64::from_num(start),
            elapsed: Fixed64::ZERO,
            last_dt: Fixed64::ZERO,
            tick: 0,
        }
    }

    /// Elapsed time as raw fixed point.
    pub fn elapsed_fixed(&self) -> Fixed64 {
        self.elapsed
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn now(&self) -> f64 {
        (self.start + self.elapsed).to_num::<f64>()
    }

    fn delta_time(&self) -> f64 {
        self.last_dt.to_num::<f64>()
    }

    fn elapsed_seconds(&self) -> f64 {
        self.elapsed.to_num::<f64>()
    }

    fn tick(&self) -> Ticks {
        self.tick
    }

    fn advance(&mut self, dt: f64) {
        // Negative steps would break monotonic time.
        let dt = Fixed64::saturating_from_num(dt.max(0.0));
        self.last_dt = dt;
        self.elapsed = self.elapsed.saturating_add(dt);
        self.tick += 1;
    }

    fn reset(&mut self) {
        self.elapsed = Fixed64::ZERO;
        self.last_dt = Fixed64::ZERO;
        self.tick = 0;
    }

    fn checkpoint(&self) -> ClockCheckpoint {
        ClockCheckpoint {
            elapsed: self.elapsed,
            last_dt: self.last_dt,
            tick: self.tick,
        }
    }

    fn restore(&mut self, checkpoint: &ClockCheckpoint) {
        self.elapsed = checkpoint.elapsed;
        self.last_dt = checkpoint.last_dt;
        self.tick = checkpoint.tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let clock = SimClock::new();
        assert_eq!(clock.elapsed_seconds(), 0.0);
        assert_eq!(clock.delta_time(), 0.0);
        assert_eq!(clock.tick(), 0);
    }

    #[test]
    fn advance_accumulates() {
        let mut clock = SimClock::new();
        clock.advance(0.5);
        clock.advance(0.25);
        assert_eq!(clock.elapsed_seconds(), 0.75);
        assert_eq!(clock.delta_time(), 0.25);
        assert_eq!(clock.tick(), 2);
    }

    #[test]
    fn now_includes_start_offset() {
        let mut clock = SimClock::starting_at(100.0);
        clock.advance(1.0);
        assert_eq!(clock.now(), 101.0);
        assert_eq!(clock.elapsed_seconds(), 1.0);
    }

    #[test]
    fn repeated_steps_are_bit_exact() {
        let mut a = SimClock::new();
        let mut b = SimClock::new();
        for _ in 0..1000 {
            a.advance(0.1);
        }
        for _ in 0..1000 {
            b.advance(0.1);
        }
        assert_eq!(a.elapsed_fixed(), b.elapsed_fixed());
    }

    #[test]
    fn negative_dt_is_ignored() {
        let mut clock = SimClock::new();
        clock.advance(1.0);
        clock.advance(-5.0);
        assert_eq!(clock.elapsed_seconds(), 1.0);
    }

    #[test]
    fn restore_rewinds_to_checkpoint() {
        let mut clock = SimClock::starting_at(5.0);
        clock.advance(0.25);
        clock.advance(0.25);
        let saved = clock.checkpoint();
        clock.advance(1.0);
        clock.advance(1.0);
        clock.restore(&saved);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.elapsed_seconds(), 0.5);
        assert_eq!(clock.delta_time(), 0.25);
        assert_eq!(clock.now(), 5.5);
    }

    #[test]
    fn reset_returns_to_start() {
        let mut clock = SimClock::starting_at(10.0);
        clock.advance(3.0);
        clock.reset();
        assert_eq!(clock.elapsed_seconds(), 0.0);
        assert_eq!(clock.now(), 10.0);
        assert_eq!(clock.tick(), 0);
    }
}
