//! AM2320 sensor reader.

use sbc_hal::{read_am2320, Am2320Reading, I2cBus};
use sbc_runtime::PeriodicAction;
use tracing::{info, warn};

/// Periodic temperature/humidity reader.
///
/// A failed transfer is logged and the next cycle tries again.
pub struct SensorReader<B: I2cBus> {
    bus: B,
    readings: u64,
    failures: u64,
    last: Option<Am2320Reading>,
}

impl<B: I2cBus> SensorReader<B> {
    /// Reader over an opened, addressed device.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            readings: 0,
            failures: 0,
            last: None,
        }
    }

    /// Successful readings.
    pub fn readings(&self) -> u64 {
        self.readings
    }

    /// Failed transfers.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Most recent successful reading.
    pub fn last(&self) -> Option<Am2320Reading> {
        self.last
    }
}

impl<B: I2cBus> PeriodicAction for SensorReader<B> {
    fn on_cycle(&mut self) {
        match read_am2320(&mut self.bus) {
            Ok(reading) => {
                self.readings += 1;
                self.last = Some(reading);
                info!(
                    temperature_c = reading.temperature_c,
                    humidity_pct = reading.humidity_pct,
                    "{reading}"
                );
            }
            Err(e) => {
                self.failures += 1;
                warn!(error = %e, "Sensor read failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbc_common::config::SensorConfig;
    use sbc_hal::SimulatedI2c;
    use sbc_runtime::{CancellationToken, ManualClock, SchedulerBuilder};

    #[test]
    fn test_failure_then_recovery() {
        let mut bus = SimulatedI2c::new();
        bus.push_error("remote I/O error");
        bus.push_frame(vec![0x01, 0xC8, 0x00, 0xEA, 0x00, 0x00]);

        let mut reader = SensorReader::new(bus);
        reader.on_cycle();
        assert_eq!(reader.failures(), 1);
        assert!(reader.last().is_none());

        reader.on_cycle();
        assert_eq!(reader.readings(), 1);
        let last = reader.last().unwrap();
        assert!((last.temperature_c - 23.4).abs() < 1e-4);
        assert!((last.humidity_pct - 45.6).abs() < 1e-4);

        // Script exhausted and no steady frame.
        reader.on_cycle();
        assert_eq!(reader.failures(), 2);
    }

    #[test]
    fn test_reads_every_interval() {
        let clock = ManualClock::default();
        let reading = Am2320Reading {
            temperature_c: -3.5,
            humidity_pct: 80.0,
        };
        let mut reader = SensorReader::new(SimulatedI2c::with_reading(reading));
        let mut scheduler = SchedulerBuilder::new(SensorConfig::default().schedule())
            .max_cycles(5)
            .build_with_clock(&clock)
            .unwrap();

        let report = scheduler.run(&mut reader, &CancellationToken::new()).unwrap();
        assert_eq!(report.cycles, 5);
        assert_eq!(reader.readings(), 5);
        assert_eq!(reader.last(), Some(reading));
        // Reads at 0, 2, 4, 6 and 8 s; no wait after the last one.
        assert_eq!(clock.current().secs(), 8);
    }
}
