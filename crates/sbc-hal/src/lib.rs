//! Hardware abstraction for the SBC demos.
//!
//! This crate provides:
//! - [`GpioChip`] trait for claiming and driving GPIO pins
//! - [`I2cBus`] trait and AM2320 frame decoding
//! - [`simulated`] in-memory backends (feature `simulated`, on by default)
//! - [`rpi`] Raspberry Pi backends via `rppal` (feature `rppal`)

pub mod gpio;
pub mod i2c;
#[cfg(all(feature = "rppal", target_os = "linux"))]
pub mod rpi;
#[cfg(feature = "simulated")]
pub mod simulated;

pub use gpio::*;
pub use i2c::*;
#[cfg(all(feature = "rppal", target_os = "linux"))]
pub use rpi::*;
#[cfg(feature = "simulated")]
pub use simulated::*;

use sbc_common::config::SensorConfig;
use sbc_common::error::{SbcError, SbcResult};
use std::fmt;

/// Available hardware backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Raspberry Pi GPIO and I2C.
    Rppal,
    /// In-memory devices.
    Simulated,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rppal => write!(f, "rppal"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

fn not_built(backend: Backend) -> SbcError {
    SbcError::Config(format!(
        "the {backend} backend is not compiled in; rebuild with `--features {backend}`"
    ))
}

/// Open GPIO chip `chip` on the selected backend.
///
/// # Errors
///
/// Returns an error if the backend is not compiled in or the chip cannot be
/// opened.
pub fn open_chip(backend: Backend, chip: u32) -> SbcResult<Box<dyn GpioChip>> {
    match backend {
        #[cfg(all(feature = "rppal", target_os = "linux"))]
        Backend::Rppal => Ok(Box::new(RppalChip::open(chip)?)),
        #[cfg(feature = "simulated")]
        Backend::Simulated => {
            tracing::debug!(chip, "Opening simulated GPIO chip");
            Ok(Box::new(SimulatedChip::new()))
        }
        #[allow(unreachable_patterns)]
        other => {
            let _ = chip;
            Err(not_built(other))
        }
    }
}

/// Open the sensor's I2C device on the selected backend.
///
/// The simulated device answers every read with a fixed room-climate
/// reading.
///
/// # Errors
///
/// Returns an error if the backend is not compiled in, the bus cannot be
/// opened, or the address cannot be selected.
pub fn open_i2c(backend: Backend, config: &SensorConfig) -> SbcResult<Box<dyn I2cBus>> {
    match backend {
        #[cfg(all(feature = "rppal", target_os = "linux"))]
        Backend::Rppal => Ok(Box::new(RppalI2c::open(config.bus, config.address)?)),
        #[cfg(feature = "simulated")]
        Backend::Simulated => {
            tracing::debug!(path = %config.device_path().display(), "Opening simulated I2C device");
            Ok(Box::new(SimulatedI2c::with_reading(Am2320Reading {
                temperature_c: 22.5,
                humidity_pct: 45.0,
            })))
        }
        #[allow(unreachable_patterns)]
        other => {
            let _ = config;
            Err(not_built(other))
        }
    }
}

#[cfg(all(test, feature = "simulated"))]
mod tests {
    use super::*;

    #[test]
    fn test_open_simulated_chip() {
        let mut chip = open_chip(Backend::Simulated, 0).unwrap();
        chip.claim_output(17, Level::Low).unwrap();
        chip.write(17, Level::High).unwrap();
        chip.release(17).unwrap();
    }

    #[test]
    fn test_open_simulated_i2c() {
        let mut bus = open_i2c(Backend::Simulated, &SensorConfig::default()).unwrap();
        let reading = read_am2320(&mut bus).unwrap();
        assert!((reading.temperature_c - 22.5).abs() < 1e-4);
    }

    #[cfg(not(feature = "rppal"))]
    #[test]
    fn test_missing_backend() {
        let err = open_chip(Backend::Rppal, 0).err().unwrap();
        assert!(matches!(err, SbcError::Config(_)));
    }
}
