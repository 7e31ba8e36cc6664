//! Edge detection on polled digital inputs.
//!
//! - [`RisingEdge`] / [`FallingEdge`] - single-poll transition triggers
//! - [`DebouncedEdges`] - both directions with a lockout window after each
//!   accepted edge
//!
//! The lockout replaces a blocking "sleep through the bounce" with a
//! timestamp comparison, so the polling loop never blocks outside its
//! absolute wait.

use sbc_common::time::MonoTime;
use std::time::Duration;

/// Rising edge trigger (low → high).
#[derive(Debug, Clone, Default)]
pub struct RisingEdge {
    prev: bool,
}

impl RisingEdge {
    /// Create a trigger whose previous sample is `initial`.
    #[must_use]
    pub fn new(initial: bool) -> Self {
        Self { prev: initial }
    }

    /// Feed one sample; true on a low → high transition.
    pub fn call(&mut self, level: bool) -> bool {
        let q = level && !self.prev;
        self.prev = level;
        q
    }
}

/// Falling edge trigger (high → low).
#[derive(Debug, Clone, Default)]
pub struct FallingEdge {
    prev: bool,
}

impl FallingEdge {
    /// Create a trigger whose previous sample is `initial`.
    #[must_use]
    pub fn new(initial: bool) -> Self {
        Self { prev: initial }
    }

    /// Feed one sample; true on a high → low transition.
    pub fn call(&mut self, level: bool) -> bool {
        let q = !level && self.prev;
        self.prev = level;
        q
    }
}

/// Direction of an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Low → high.
    Rising,
    /// High → low.
    Falling,
}

/// Edge detector with a debounce lockout.
///
/// After an edge is accepted, samples are ignored until `window` has
/// elapsed. The level seen at the accepted edge stays the reference for
/// the next comparison.
#[derive(Debug, Clone)]
pub struct DebouncedEdges {
    rising: RisingEdge,
    falling: FallingEdge,
    window: Duration,
    locked_until: Option<MonoTime>,
}

impl DebouncedEdges {
    /// Create a detector starting from `initial` (true = high).
    #[must_use]
    pub fn new(initial: bool, window: Duration) -> Self {
        Self {
            rising: RisingEdge::new(initial),
            falling: FallingEdge::new(initial),
            window,
            locked_until: None,
        }
    }

    /// Feed a sample taken at `now`.
    pub fn sample(&mut self, level: bool, now: MonoTime) -> Option<Edge> {
        if let Some(until) = self.locked_until {
            if now < until {
                return None;
            }
            self.locked_until = None;
        }

        let rose = self.rising.call(level);
        let fell = self.falling.call(level);
        let edge = if rose {
            Edge::Rising
        } else if fell {
            Edge::Falling
        } else {
            return None;
        };

        if !self.window.is_zero() {
            self.locked_until = Some(now + self.window);
        }
        Some(edge)
    }

    /// Whether samples are currently being ignored.
    #[must_use]
    pub fn is_locked(&self, now: MonoTime) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}
