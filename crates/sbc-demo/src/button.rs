//! Button monitor: polls an active-low input and reports presses.
//!
//! The button pulls the pin to ground against the internal pull-up, so a
//! falling edge is a press and a rising edge is a release.

use sbc_common::error::SbcResult;
use sbc_common::time::MonoTime;
use sbc_hal::{Bias, GpioChip};
use sbc_runtime::{DebouncedEdges, Edge, MonotonicClock, PeriodicAction};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Periodic button poller with non-blocking debounce.
pub struct ButtonMonitor<G: GpioChip, C: MonotonicClock> {
    chip: G,
    clock: C,
    pin: u8,
    edges: DebouncedEdges,
    press_count: u64,
    pressed_at: Option<MonoTime>,
    last_press_duration: Option<Duration>,
    read_failures: u64,
}

impl<G: GpioChip, C: MonotonicClock> ButtonMonitor<G, C> {
    /// Claim `pin` as a pulled-up input.
    ///
    /// Edges closer than `bounce_window` to the last accepted edge are
    /// ignored.
    pub fn new(mut chip: G, clock: C, pin: u8, bounce_window: Duration) -> SbcResult<Self> {
        chip.claim_input(pin, Bias::PullUp)?;
        debug!(pin, ?bounce_window, "Button pin claimed as input with pull-up");
        Ok(Self {
            chip,
            clock,
            pin,
            // Released reads high.
            edges: DebouncedEdges::new(true, bounce_window),
            press_count: 0,
            pressed_at: None,
            last_press_duration: None,
            read_failures: 0,
        })
    }

    /// Presses detected so far.
    pub fn press_count(&self) -> u64 {
        self.press_count
    }

    /// Hold time of the most recent completed press.
    pub fn last_press_duration(&self) -> Option<Duration> {
        self.last_press_duration
    }

    /// Reads that failed.
    pub fn read_failures(&self) -> u64 {
        self.read_failures
    }

    fn sample(&mut self) -> SbcResult<()> {
        let level = self.chip.read(self.pin)?;
        let now = self.clock.now()?;

        match self.edges.sample(level.is_high(), now) {
            Some(Edge::Falling) => {
                self.press_count += 1;
                self.pressed_at = Some(now);
                info!(press = self.press_count, at = %now, "Button pressed");
            }
            Some(Edge::Rising) => match self.pressed_at.take() {
                Some(pressed_at) => {
                    let held = now.saturating_duration_since(pressed_at);
                    self.last_press_duration = Some(held);
                    #[allow(clippy::cast_precision_loss)]
                    let held_ms = held.as_nanos() as f64 / 1e6;
                    info!(press = self.press_count, held_ms, "Button released");
                }
                None => info!("Button released"),
            },
            None => {}
        }
        Ok(())
    }
}

impl<G: GpioChip, C: MonotonicClock> PeriodicAction for ButtonMonitor<G, C> {
    fn on_cycle(&mut self) {
        if let Err(e) = self.sample() {
            self.read_failures += 1;
            warn!(pin = self.pin, error = %e, "Button read failed");
        }
    }
}

impl<G: GpioChip, C: MonotonicClock> Drop for ButtonMonitor<G, C> {
    fn drop(&mut self) {
        if let Err(e) = self.chip.release(self.pin) {
            warn!(pin = self.pin, error = %e, "Failed to release button pin");
        }
        debug!(pin = self.pin, "Button pin released");
    }
}
