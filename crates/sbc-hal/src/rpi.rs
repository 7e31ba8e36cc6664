//! Raspberry Pi backends built on `rppal`.
//!
//! Pin numbers are BCM GPIO numbers. `rppal` drives the SoC's own GPIO
//! controller through `/dev/gpiomem`, so only chip 0 exists.

use crate::gpio::{Bias, GpioChip, Level};
use crate::i2c::{short_read, I2cBus};
use rppal::gpio::{Gpio, InputPin, Level as PinLevel, OutputPin};
use rppal::i2c::I2c;
use sbc_common::error::{SbcError, SbcResult};
use std::collections::HashMap;
use tracing::debug;

impl From<PinLevel> for Level {
    fn from(level: PinLevel) -> Self {
        match level {
            PinLevel::Low => Level::Low,
            PinLevel::High => Level::High,
        }
    }
}

impl From<Level> for PinLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => PinLevel::Low,
            Level::High => PinLevel::High,
        }
    }
}

/// GPIO controller of a Raspberry Pi.
pub struct RppalChip {
    gpio: Gpio,
    inputs: HashMap<u8, InputPin>,
    outputs: HashMap<u8, OutputPin>,
}

impl RppalChip {
    /// Open the GPIO controller.
    ///
    /// # Errors
    ///
    /// Returns an error if `chip` is not 0 or the controller cannot be
    /// mapped (missing `/dev/gpiomem`, insufficient permissions, or an
    /// unsupported board).
    pub fn open(chip: u32) -> SbcResult<Self> {
        if chip != 0 {
            return Err(SbcError::chip(format!(
                "gpiochip{chip} is not available; the Raspberry Pi backend only drives chip 0"
            )));
        }
        let gpio = Gpio::new().map_err(|e| SbcError::chip(format!("failed to open gpiochip0: {e}")))?;
        debug!("GPIO controller opened");
        Ok(Self {
            gpio,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        })
    }

    fn ensure_free(&self, pin: u8) -> SbcResult<()> {
        if self.inputs.contains_key(&pin) || self.outputs.contains_key(&pin) {
            return Err(SbcError::gpio(pin, "pin already claimed"));
        }
        Ok(())
    }
}

impl GpioChip for RppalChip {
    fn claim_input(&mut self, pin: u8, bias: Bias) -> SbcResult<()> {
        self.ensure_free(pin)?;
        let raw = self
            .gpio
            .get(pin)
            .map_err(|e| SbcError::gpio(pin, format!("claim failed: {e}")))?;
        let input = match bias {
            Bias::Disabled => raw.into_input(),
            Bias::PullUp => raw.into_input_pullup(),
            Bias::PullDown => raw.into_input_pulldown(),
        };
        self.inputs.insert(pin, input);
        Ok(())
    }

    fn claim_output(&mut self, pin: u8, initial: Level) -> SbcResult<()> {
        self.ensure_free(pin)?;
        let raw = self
            .gpio
            .get(pin)
            .map_err(|e| SbcError::gpio(pin, format!("claim failed: {e}")))?;
        let output = match initial {
            Level::Low => raw.into_output_low(),
            Level::High => raw.into_output_high(),
        };
        self.outputs.insert(pin, output);
        Ok(())
    }

    fn read(&mut self, pin: u8) -> SbcResult<Level> {
        self.inputs
            .get(&pin)
            .map(|input| input.read().into())
            .ok_or_else(|| SbcError::gpio(pin, "pin not claimed as input"))
    }

    fn write(&mut self, pin: u8, level: Level) -> SbcResult<()> {
        let output = self
            .outputs
            .get_mut(&pin)
            .ok_or_else(|| SbcError::gpio(pin, "pin not claimed as output"))?;
        output.write(level.into());
        Ok(())
    }

    fn release(&mut self, pin: u8) -> SbcResult<()> {
        // Dropping the rppal pin restores its previous mode.
        if self.inputs.remove(&pin).is_some() || self.outputs.remove(&pin).is_some() {
            Ok(())
        } else {
            Err(SbcError::gpio(pin, "pin not claimed"))
        }
    }
}

/// I2C device on a Raspberry Pi bus.
pub struct RppalI2c {
    i2c: I2c,
}

impl RppalI2c {
    /// Open `/dev/i2c-{bus}` and select `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus cannot be opened or the address cannot
    /// be set.
    pub fn open(bus: u8, address: u16) -> SbcResult<Self> {
        let mut i2c = I2c::with_bus(bus)
            .map_err(|e| SbcError::I2c(format!("failed to open /dev/i2c-{bus}: {e}")))?;
        i2c.set_slave_address(address)
            .map_err(|e| SbcError::I2c(format!("failed to set address {address:#04x}: {e}")))?;
        debug!(bus, address, "I2C device opened");
        Ok(Self { i2c })
    }
}

impl I2cBus for RppalI2c {
    fn read_exact(&mut self, buf: &mut [u8]) -> SbcResult<()> {
        let got = self
            .i2c
            .read(buf)
            .map_err(|e| SbcError::I2c(format!("read failed: {e}")))?;
        if got != buf.len() {
            return Err(short_read(got, buf.len()));
        }
        Ok(())
    }
}
