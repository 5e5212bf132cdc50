//! Simulation time.
//!
//! The scheduler never reads a wall clock on its own. The host hands it a
//! `now` per tick, either directly through `Scheduler::advance_all` or by
//! sampling a [`TimeSource`].

/// Supplies monotonically increasing time and the delta of the current tick.
pub trait TimeSource {
    /// Returns `(now, delta)` in seconds for the next tick.
    fn sample(&mut self) -> (f64, f64);
}

/// Deterministic source that advances by a fixed step on every sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedStep {
    now: f64,
    step: f64,
}

impl FixedStep {
    pub fn new(step: f64) -> Self {
        Self { now: 0.0, step }
    }

    /// Start sampling from `start` instead of zero.
    pub fn starting_at(start: f64, step: f64) -> Self {
        Self { now: start, step }
    }

    pub fn now(&self) -> f64 {
        self.now
    }
}

impl TimeSource for FixedStep {
    fn sample(&mut self) -> (f64, f64) {
        self.now += self.step;
        (self.now, self.step)
    }
}

/// Wall clock built on `tokio::time::Instant`.
///
/// Follows tokio's paused clock in tests. Deltas larger than `max_delta` are
/// reported as `max_delta`; `now` itself is never clamped.
#[derive(Debug, Clone)]
pub struct WallClock {
    origin: tokio::time::Instant,
    offset: f64,
    last: f64,
    max_delta: f64,
}

impl WallClock {
    /// Start counting from `offset` seconds (usually the scheduler's current `now`).
    pub fn new(offset: f64, max_delta: f64) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            offset,
            last: offset,
            max_delta,
        }
    }
}

impl TimeSource for WallClock {
    fn sample(&mut self) -> (f64, f64) {
        let now = self.offset + self.origin.elapsed().as_secs_f64();
        let delta = (now - self.last).clamp(0.0, self.max_delta);
        self.last = now;
        (now, delta)
    }
}

/// Snapshot of the clock handed to callables and coroutine bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickTime {
    /// Global simulation time of the tick.
    pub now: f64,
    /// Host-supplied delta of the tick.
    pub delta: f64,
    /// Number of ticks processed so far, this one included.
    pub frame: u64,
    /// The owner's local clock: `now` minus every span the owner spent inactive.
    pub local: f64,
}

/// The scheduler's view of global time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimClock {
    now: f64,
    delta: f64,
    frame: u64,
}

impl SimClock {
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Move to an absolute time. The caller checks monotonicity.
    pub(crate) fn advance_to(&mut self, now: f64, delta: f64) {
        debug_assert!(now >= self.now);
        self.now = now;
        self.delta = delta;
        self.frame += 1;
    }

    pub(crate) fn snapshot(&self, local: f64) -> TickTime {
        TickTime {
            now: self.now,
            delta: self.delta,
            frame: self.frame,
            local,
        }
    }
}
