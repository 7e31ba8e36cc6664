//! I2C bus abstraction and AM2320 frame decoding.
//!
//! The AM2320 is read with a single plain 6-byte read from its slave
//! address. The block layout is:
//!
//! | Bytes | Content                                   |
//! |-------|-------------------------------------------|
//! | 0-1   | Relative humidity, big-endian, x10        |
//! | 2-3   | Temperature, big-endian, x10, bit 15 sign |
//! | 4-5   | CRC-16 (not verified)                     |

use sbc_common::error::{SbcError, SbcResult};
use std::fmt;

/// Default AM2320 slave address.
pub const AM2320_ADDRESS: u16 = 0x5C;

/// Length of one AM2320 read.
pub const AM2320_FRAME_LEN: usize = 6;

/// An I2C device handle with its slave address already configured.
pub trait I2cBus: Send {
    /// Fill `buf` with a single read transfer.
    ///
    /// A transfer that returns fewer bytes than requested is an error.
    fn read_exact(&mut self, buf: &mut [u8]) -> SbcResult<()>;
}

impl<T: I2cBus + ?Sized> I2cBus for Box<T> {
    fn read_exact(&mut self, buf: &mut [u8]) -> SbcResult<()> {
        (**self).read_exact(buf)
    }
}

/// One decoded AM2320 measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Am2320Reading {
    /// Degrees Celsius.
    pub temperature_c: f32,
    /// Relative humidity in percent.
    pub humidity_pct: f32,
}

impl Am2320Reading {
    /// Decode a raw 6-byte frame.
    #[must_use]
    pub fn decode(frame: &[u8; AM2320_FRAME_LEN]) -> Self {
        let raw_humidity = u16::from_be_bytes([frame[0], frame[1]]);
        let raw_temperature = u16::from_be_bytes([frame[2], frame[3]]);

        let magnitude = f32::from(raw_temperature & 0x7FFF) / 10.0;
        let temperature_c = if raw_temperature & 0x8000 != 0 {
            -magnitude
        } else {
            magnitude
        };

        Self {
            temperature_c,
            humidity_pct: f32::from(raw_humidity) / 10.0,
        }
    }

    /// Encode as the sensor would, with a zero checksum.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_frame(&self) -> [u8; AM2320_FRAME_LEN] {
        let humidity = (self.humidity_pct * 10.0).round() as u16;
        let mut temperature = (self.temperature_c.abs() * 10.0).round() as u16 & 0x7FFF;
        if self.temperature_c < 0.0 {
            temperature |= 0x8000;
        }

        let [h0, h1] = humidity.to_be_bytes();
        let [t0, t1] = temperature.to_be_bytes();
        [h0, h1, t0, t1, 0, 0]
    }
}

impl fmt::Display for Am2320Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "temperature {:.1} °C, humidity {:.1} %",
            self.temperature_c, self.humidity_pct
        )
    }
}

/// Read and decode one AM2320 measurement.
///
/// # Errors
///
/// Returns an error if the transfer fails or is short.
pub fn read_am2320<B: I2cBus + ?Sized>(bus: &mut B) -> SbcResult<Am2320Reading> {
    let mut frame = [0u8; AM2320_FRAME_LEN];
    bus.read_exact(&mut frame)?;
    Ok(Am2320Reading::decode(&frame))
}

/// Error for a transfer that returned fewer bytes than requested.
pub(crate) fn short_read(got: usize, wanted: usize) -> SbcError {
    SbcError::I2c(format!("short read: got {got} of {wanted} bytes"))
}
