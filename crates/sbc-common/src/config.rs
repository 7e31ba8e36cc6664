//! Configuration structures for the demo programs.
//!
//! Every program has built-in reference values (pin numbers, period,
//! real-time priority, debounce window). A TOML file may override any
//! subset of them; missing keys keep the preset for that program.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest accepted scheduler interval (one day).
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Top-level configuration shared by all demo programs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Real-time elevation settings.
    pub realtime: RealtimeConfig,

    /// GPIO chip selection.
    pub gpio: GpioConfig,

    /// Overrides for the LED blinker schedule.
    pub led: ScheduleOverrides,

    /// Overrides for the button poller schedule.
    pub button: ScheduleOverrides,

    /// Temperature/humidity sensor settings.
    pub sensor: SensorConfig,
}

/// Real-time elevation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Attempt SCHED_FIFO and memory locking. `false` gives the plain variant.
    pub enabled: bool,

    /// Lock all memory pages (mlockall).
    pub lock_memory: bool,

    /// Number of lateness samples retained for percentiles.
    pub histogram_size: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_memory: true,
            histogram_size: 10_000,
        }
    }
}

/// GPIO chip configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// GPIO chip index (`/dev/gpiochipN`).
    pub chip: u32,
}

/// Schedule parameters handed to the periodic scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// BCM pin driven or sampled by the action.
    pub pin: u8,

    /// Nominal period between actions.
    pub interval: Duration,

    /// SCHED_FIFO priority requested during elevation (1-99).
    pub priority: u8,

    /// Run the action before the first wait instead of after it.
    pub fire_immediately_on_first_iteration: bool,

    /// Minimum spacing between accepted input edges.
    pub bounce_window: Duration,

    /// Emit a drift report every N cycles (0 disables it).
    pub report_every: u64,

    /// Stop normally after this many actions.
    pub max_cycles: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::led()
    }
}

impl SchedulerConfig {
    /// LED blinker: GPIO17, 1 ms, priority 80, first toggle after one period.
    #[must_use]
    pub fn led() -> Self {
        Self {
            pin: 17,
            interval: Duration::from_millis(1),
            priority: 80,
            fire_immediately_on_first_iteration: false,
            bounce_window: Duration::ZERO,
            report_every: 10_000,
            max_cycles: None,
        }
    }

    /// Button poller: GPIO27, 1 ms, priority 70, first poll immediately,
    /// 20 ms debounce.
    #[must_use]
    pub fn button() -> Self {
        Self {
            pin: 27,
            interval: Duration::from_millis(1),
            priority: 70,
            fire_immediately_on_first_iteration: true,
            bounce_window: Duration::from_millis(20),
            report_every: 0,
            max_cycles: None,
        }
    }

    /// Set the cycle limit.
    #[must_use]
    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Check the invariants the scheduler relies on.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the interval is zero or longer
    /// than [`MAX_INTERVAL`].
    pub fn validate(&self) -> Result<(), crate::error::SbcError> {
        if self.interval.is_zero() {
            return Err(crate::error::SbcError::Config(
                "scheduler interval must be positive".into(),
            ));
        }
        if self.interval > MAX_INTERVAL {
            return Err(crate::error::SbcError::Config(format!(
                "scheduler interval {} exceeds the maximum of {}",
                humantime::format_duration(self.interval),
                humantime::format_duration(MAX_INTERVAL)
            )));
        }
        Ok(())
    }
}

/// Partial schedule settings from a TOML section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleOverrides {
    /// Override [`SchedulerConfig::pin`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<u8>,

    /// Override [`SchedulerConfig::interval`].
    #[serde(
        with = "humantime_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<Duration>,

    /// Override [`SchedulerConfig::priority`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,

    /// Override [`SchedulerConfig::fire_immediately_on_first_iteration`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fire_immediately_on_first_iteration: Option<bool>,

    /// Override [`SchedulerConfig::bounce_window`].
    #[serde(
        with = "humantime_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub bounce_window: Option<Duration>,

    /// Override [`SchedulerConfig::report_every`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_every: Option<u64>,
}

impl ScheduleOverrides {
    /// Apply these overrides on top of `base`.
    #[must_use]
    pub fn apply(&self, base: SchedulerConfig) -> SchedulerConfig {
        SchedulerConfig {
            pin: self.pin.unwrap_or(base.pin),
            interval: self.interval.unwrap_or(base.interval),
            priority: self.priority.unwrap_or(base.priority),
            fire_immediately_on_first_iteration: self
                .fire_immediately_on_first_iteration
                .unwrap_or(base.fire_immediately_on_first_iteration),
            bounce_window: self.bounce_window.unwrap_or(base.bounce_window),
            report_every: self.report_every.unwrap_or(base.report_every),
            max_cycles: base.max_cycles,
        }
    }
}

/// AM2320 temperature/humidity sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// I2C bus number (`/dev/i2c-N`).
    pub bus: u8,

    /// 7-bit slave address.
    pub address: u16,

    /// Time between readings.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            bus: 1,
            address: 0x5C,
            interval: Duration::from_secs(2),
        }
    }
}

impl SensorConfig {
    /// Device node for the configured bus.
    #[must_use]
    pub fn device_path(&self) -> PathBuf {
        PathBuf::from(format!("/dev/i2c-{}", self.bus))
    }

    /// Schedule for the sensor loop. The sensor reads immediately, then
    /// every `interval`; it has no pin and no debounce.
    #[must_use]
    pub fn schedule(&self) -> SchedulerConfig {
        SchedulerConfig {
            pin: 0,
            interval: self.interval,
            priority: 50,
            fire_immediately_on_first_iteration: true,
            bounce_window: Duration::ZERO,
            report_every: 0,
            max_cycles: None,
        }
    }
}

impl AppConfig {
    /// Effective LED schedule (preset plus overrides).
    #[must_use]
    pub fn led_schedule(&self) -> SchedulerConfig {
        self.led.apply(SchedulerConfig::led())
    }

    /// Effective button schedule (preset plus overrides).
    #[must_use]
    pub fn button_schedule(&self) -> SchedulerConfig {
        self.button.apply(SchedulerConfig::button())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helpers for `Duration` in humantime format ("1ms", "20ms", "2s").
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        #[allow(clippy::ref_option)]
        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = Option::<String>::deserialize(deserializer)?;
            s.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
