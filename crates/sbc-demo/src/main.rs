//! SBC demo entry point.
//!
//! Runs one of the LED, button, or sensor demos on the absolute-time
//! scheduler, with best-effort real-time elevation and signal-driven
//! shutdown.

mod button;
mod led;
mod sensor;
mod signals;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sbc_common::config::{AppConfig, SchedulerConfig};
use sbc_hal::Backend;
use sbc_runtime::{
    elevate_process, CancellationToken, PeriodicAction, RunReport, SchedulerBuilder, SystemClock,
};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::button::ButtonMonitor;
use crate::led::LedBlinker;
use crate::sensor::SensorReader;
use crate::signals::SignalHandler;

/// SBC demo command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "sbc-demo",
    about = "Single-board computer demos - drift-free LED, button, and sensor loops",
    version,
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Demo,

    /// Path to a configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Skip memory locking and real-time scheduling.
    #[arg(long, global = true)]
    plain: bool,

    /// Use in-memory GPIO and I2C devices.
    #[arg(long, short = 's', global = true)]
    simulated: bool,

    /// Stop after this many cycles (default: run until signalled).
    #[arg(long, global = true)]
    max_cycles: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,
}

/// Demo to run.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Demo {
    /// Blink an LED on a fixed 1 ms period.
    Led,
    /// Detect debounced button presses with 1 ms polling.
    Button,
    /// Read an AM2320 temperature/humidity sensor every 2 s.
    Sensor,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), demo = ?args.command, "Starting SBC demo");

    let mut config = load_config(&args)?;
    if args.plain {
        config.realtime.enabled = false;
    }
    let backend = if args.simulated {
        Backend::Simulated
    } else {
        Backend::Rppal
    };

    let signal_handler = SignalHandler::install().context("Failed to set up signal handlers")?;
    let token = signal_handler.token();

    let report = match args.command {
        Demo::Led => run_led(&config, backend, args.max_cycles, &token)?,
        Demo::Button => run_button(&config, backend, args.max_cycles, &token)?,
        Demo::Sensor => run_sensor(&config, backend, args.max_cycles, &token)?,
    };

    if let Some(signal) = signal_handler.last_signal() {
        info!(%signal, count = signal_handler.signal_count(), "Shutdown signal received");
    }
    info!(
        total_cycles = report.cycles,
        exit_reason = ?report.exit_reason,
        "SBC demo shutdown complete"
    );
    Ok(())
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!(
        "sbc_demo={level},sbc_runtime={level},sbc_hal={level},sbc_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `SBC_DEMO_CONFIG` environment variable
/// 3. `/etc/sbc-demo/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<AppConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return AppConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("SBC_DEMO_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from SBC_DEMO_CONFIG");
            return AppConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from SBC_DEMO_CONFIG={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "SBC_DEMO_CONFIG set but file does not exist, checking other locations"
        );
    }

    for candidate in ["/etc/sbc-demo/config.toml", "config/default.toml"] {
        let config_path = PathBuf::from(candidate);
        if config_path.exists() {
            info!(?config_path, "Loading config file");
            return AppConfig::from_file(&config_path)
                .with_context(|| format!("Failed to load config from {config_path:?}"));
        }
    }

    info!("No config file found, using built-in defaults");
    Ok(AppConfig::default())
}

fn run_led(
    config: &AppConfig,
    backend: Backend,
    max_cycles: Option<u64>,
    token: &CancellationToken,
) -> Result<RunReport> {
    let schedule = config.led_schedule().with_max_cycles(max_cycles);
    log_schedule("led", &schedule);
    elevate_process(&config.realtime, schedule.priority);

    let chip = sbc_hal::open_chip(backend, config.gpio.chip)
        .with_context(|| format!("Failed to open gpiochip{}", config.gpio.chip))?;
    let mut led = LedBlinker::new(chip, schedule.pin)
        .with_context(|| format!("Failed to configure GPIO{} as output", schedule.pin))?;
    info!(pin = schedule.pin, backend = %backend, "LED ready; press Ctrl+C to stop");

    let report = run_loop(config, schedule, &mut led, token)?;
    info!(
        toggles = led.toggles(),
        write_failures = led.write_failures(),
        "LED demo finished"
    );
    Ok(report)
}

fn run_button(
    config: &AppConfig,
    backend: Backend,
    max_cycles: Option<u64>,
    token: &CancellationToken,
) -> Result<RunReport> {
    let schedule = config.button_schedule().with_max_cycles(max_cycles);
    log_schedule("button", &schedule);
    elevate_process(&config.realtime, schedule.priority);

    let chip = sbc_hal::open_chip(backend, config.gpio.chip)
        .with_context(|| format!("Failed to open gpiochip{}", config.gpio.chip))?;
    let mut button = ButtonMonitor::new(chip, SystemClock::new(), schedule.pin, schedule.bounce_window)
        .with_context(|| format!("Failed to configure GPIO{} as input", schedule.pin))?;
    info!(pin = schedule.pin, backend = %backend, "Watching button; press Ctrl+C to stop");

    let report = run_loop(config, schedule, &mut button, token)?;
    info!(
        total_presses = button.press_count(),
        read_failures = button.read_failures(),
        "Button demo finished"
    );
    Ok(report)
}

fn run_sensor(
    config: &AppConfig,
    backend: Backend,
    max_cycles: Option<u64>,
    token: &CancellationToken,
) -> Result<RunReport> {
    let schedule = config.sensor.schedule().with_max_cycles(max_cycles);
    log_schedule("sensor", &schedule);

    let bus = sbc_hal::open_i2c(backend, &config.sensor).with_context(|| {
        format!(
            "Failed to open sensor {:#04x} on {}",
            config.sensor.address,
            config.sensor.device_path().display()
        )
    })?;
    let mut reader = SensorReader::new(bus);
    info!(
        path = %config.sensor.device_path().display(),
        address = config.sensor.address,
        "Sensor connected; press Ctrl+C to stop"
    );

    let report = run_loop(config, schedule, &mut reader, token)?;
    info!(
        readings = reader.readings(),
        failures = reader.failures(),
        "Sensor demo finished"
    );
    Ok(report)
}

fn log_schedule(demo: &str, schedule: &SchedulerConfig) {
    info!(
        demo,
        interval = %humantime::format_duration(schedule.interval),
        priority = schedule.priority,
        fire_first = schedule.fire_immediately_on_first_iteration,
        max_cycles = ?schedule.max_cycles,
        "Schedule configured"
    );
}

fn run_loop<A: PeriodicAction>(
    config: &AppConfig,
    schedule: SchedulerConfig,
    action: &mut A,
    token: &CancellationToken,
) -> Result<RunReport> {
    let mut scheduler = SchedulerBuilder::new(schedule)
        .histogram_size(config.realtime.histogram_size)
        .build()
        .context("Invalid schedule")?;
    scheduler
        .run(action, token)
        .context("Periodic loop failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommand_and_globals() {
        let args = Args::try_parse_from([
            "sbc-demo",
            "led",
            "--simulated",
            "--plain",
            "--max-cycles",
            "10",
        ])
        .unwrap();
        assert_eq!(args.command, Demo::Led);
        assert!(args.simulated);
        assert!(args.plain);
        assert_eq!(args.max_cycles, Some(10));
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["sbc-demo"]).is_err());
        assert!(Args::try_parse_from(["sbc-demo", "motor"]).is_err());
    }

    #[test]
    fn test_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.toml");
        std::fs::write(&path, "[led]\ninterval = \"5ms\"\n").unwrap();

        let args = Args::try_parse_from([
            "sbc-demo",
            "led",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(
            config.led_schedule().interval,
            std::time::Duration::from_millis(5)
        );
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let args =
            Args::try_parse_from(["sbc-demo", "button", "-c", "/nonexistent/sbc.toml"]).unwrap();
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_simulated_led_run() {
        let mut config = AppConfig::default();
        config.realtime.enabled = false;
        let report = run_led(
            &config,
            Backend::Simulated,
            Some(5),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(report.cycles, 5);
    }
}
