//! LED blinker: toggles one output pin per cycle.

use sbc_hal::{GpioChip, Level};
use sbc_common::error::SbcResult;
use sbc_runtime::PeriodicAction;
use tracing::{debug, warn};

/// Periodic LED toggle on a claimed output pin.
///
/// The pin is claimed low. On drop it is driven low and released before the
/// chip closes.
pub struct LedBlinker<G: GpioChip> {
    chip: G,
    pin: u8,
    level: Level,
    toggles: u64,
    write_failures: u64,
}

impl<G: GpioChip> LedBlinker<G> {
    /// Claim `pin` as an output, initially low.
    pub fn new(mut chip: G, pin: u8) -> SbcResult<Self> {
        chip.claim_output(pin, Level::Low)?;
        debug!(pin, "LED pin claimed as output");
        Ok(Self {
            chip,
            pin,
            level: Level::Low,
            toggles: 0,
            write_failures: 0,
        })
    }

    /// Successful writes so far.
    pub fn toggles(&self) -> u64 {
        self.toggles
    }

    /// Writes that failed.
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    /// Level last driven.
    pub fn level(&self) -> Level {
        self.level
    }
}

impl<G: GpioChip> PeriodicAction for LedBlinker<G> {
    fn on_cycle(&mut self) {
        let next = !self.level;
        match self.chip.write(self.pin, next) {
            Ok(()) => {
                self.level = next;
                self.toggles += 1;
            }
            Err(e) => {
                self.write_failures += 1;
                warn!(pin = self.pin, error = %e, "LED write failed");
            }
        }
    }
}

impl<G: GpioChip> Drop for LedBlinker<G> {
    fn drop(&mut self) {
        if let Err(e) = self.chip.write(self.pin, Level::Low) {
            warn!(pin = self.pin, error = %e, "Failed to turn LED off");
        }
        if let Err(e) = self.chip.release(self.pin) {
            warn!(pin = self.pin, error = %e, "Failed to release LED pin");
        }
        debug!(pin = self.pin, "LED pin released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbc_common::config::SchedulerConfig;
    use sbc_runtime::{CancellationToken, ManualClock, SchedulerBuilder};
    use sbc_hal::SimulatedChip;

    #[test]
    fn test_toggles_each_cycle() {
        let chip = SimulatedChip::new();
        let pins = chip.pins();
        let mut led = LedBlinker::new(chip, 17).unwrap();

        for _ in 0..4 {
            led.on_cycle();
        }
        assert_eq!(led.toggles(), 4);
        assert_eq!(
            pins.writes(17),
            vec![Level::Low, Level::High, Level::Low, Level::High, Level::Low]
        );
    }

    #[test]
    fn test_drop_turns_off_and_releases() {
        let chip = SimulatedChip::new();
        let pins = chip.pins();
        let mut led = LedBlinker::new(chip, 17).unwrap();
        led.on_cycle();
        assert_eq!(pins.output_level(17), Some(Level::High));

        drop(led);
        assert_eq!(pins.output_level(17), Some(Level::Low));
        assert_eq!(pins.released(), vec![17]);
        assert!(pins.is_closed());
    }

    #[test]
    fn test_claim_failure_is_setup_error() {
        let chip = SimulatedChip::new();
        chip.pins().refuse_claims_on(17);
        assert!(LedBlinker::new(chip, 17).is_err());
    }

    #[test]
    fn test_scheduled_blink() {
        let chip = SimulatedChip::new();
        let pins = chip.pins();
        let clock = ManualClock::default();
        let mut led = LedBlinker::new(chip, 17).unwrap();
        let mut scheduler = SchedulerBuilder::new(SchedulerConfig::led())
            .max_cycles(1_000)
            .build_with_clock(&clock)
            .unwrap();

        let report = scheduler.run(&mut led, &CancellationToken::new()).unwrap();
        assert_eq!(report.cycles, 1_000);
        assert_eq!(led.toggles(), 1_000);
        // Even number of toggles ends where it started.
        assert_eq!(led.level(), Level::Low);
        assert_eq!(pins.writes(17).len(), 1_001);
    }
}
