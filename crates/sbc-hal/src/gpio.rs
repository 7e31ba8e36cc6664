//! GPIO chip abstraction.
//!
//! A [`GpioChip`] owns the open controller handle. Pins are claimed as
//! input or output, read or written by BCM number, and released
//! individually. Dropping the chip closes it and frees any pins still
//! claimed.

use sbc_common::error::SbcResult;
use std::fmt;
use std::ops::Not;

/// Logic level of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// 0 V.
    Low,
    /// Supply voltage.
    High,
}

impl Level {
    /// True for [`Level::High`].
    #[must_use]
    pub fn is_high(self) -> bool {
        self == Self::High
    }

    /// True for [`Level::Low`].
    #[must_use]
    pub fn is_low(self) -> bool {
        self == Self::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl Not for Level {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Input bias resistor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
    /// Floating input.
    #[default]
    Disabled,
    /// Internal pull-up; an open switch reads high.
    PullUp,
    /// Internal pull-down; an open switch reads low.
    PullDown,
}

impl Bias {
    /// Level an unconnected input settles to.
    #[must_use]
    pub fn idle_level(self) -> Level {
        match self {
            Self::PullUp => Level::High,
            Self::Disabled | Self::PullDown => Level::Low,
        }
    }
}

/// An open GPIO controller.
///
/// Every method names the pin by its BCM number. Using a pin that was not
/// claimed in the matching direction is an error.
pub trait GpioChip: Send {
    /// Claim `pin` as an input with the given bias.
    fn claim_input(&mut self, pin: u8, bias: Bias) -> SbcResult<()>;

    /// Claim `pin` as an output, driven to `initial` immediately.
    fn claim_output(&mut self, pin: u8, initial: Level) -> SbcResult<()>;

    /// Sample a claimed input.
    fn read(&mut self, pin: u8) -> SbcResult<Level>;

    /// Drive a claimed output.
    fn write(&mut self, pin: u8, level: Level) -> SbcResult<()>;

    /// Free a claimed pin.
    fn release(&mut self, pin: u8) -> SbcResult<()>;
}

impl<T: GpioChip + ?Sized> GpioChip for Box<T> {
    fn claim_input(&mut self, pin: u8, bias: Bias) -> SbcResult<()> {
        (**self).claim_input(pin, bias)
    }

    fn claim_output(&mut self, pin: u8, initial: Level) -> SbcResult<()> {
        (**self).claim_output(pin, initial)
    }

    fn read(&mut self, pin: u8) -> SbcResult<Level> {
        (**self).read(pin)
    }

    fn write(&mut self, pin: u8, level: Level) -> SbcResult<()> {
        (**self).write(pin, level)
    }

    fn release(&mut self, pin: u8) -> SbcResult<()> {
        (**self).release(pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_conversions() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert_eq!(!Level::High, Level::Low);
        assert!(Level::High.is_high());
        assert!(Level::Low.is_low());
        assert_eq!(Level::High.to_string(), "HIGH");
    }

    #[test]
    fn test_bias_idle_level() {
        assert_eq!(Bias::PullUp.idle_level(), Level::High);
        assert_eq!(Bias::PullDown.idle_level(), Level::Low);
        assert_eq!(Bias::default(), Bias::Disabled);
    }
}
