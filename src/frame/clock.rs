//! Delta clock: a stopwatch that measures time between laps.

use std::time::{Duration, Instant};

/// Stopwatch for frame deltas.
///
/// The first lap has no previous lap to measure against and returns
/// `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaClock {
    last: Option<Instant>,
}

impl DeltaClock {
    /// Create a clock that has not lapped yet.
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Record a lap at `now` and return the time since the previous one.
    pub fn lap_at(&mut self, now: Instant) -> Option<Duration> {
        let previous = self.last.replace(now);
        previous.map(|last| now.saturating_duration_since(last))
    }

    /// Record a lap now.
    pub fn lap(&mut self) -> Option<Duration> {
        self.lap_at(Instant::now())
    }

    /// Time since the last lap, without recording a new one.
    pub fn elapsed(&self) -> Option<Duration> {
        self.last.map(|last| last.elapsed())
    }

    /// Forget the previous lap.
    pub const fn reset(&mut self) {
        self.last = None;
    }
}
