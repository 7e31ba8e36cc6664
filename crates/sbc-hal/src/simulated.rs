//! In-memory GPIO and I2C backends.
//!
//! [`SimulatedChip`] keeps all pin state behind a shared handle
//! ([`SimulatedPins`]) so a test can script input levels and inspect
//! output history after the chip has been moved into an application.
//! [`SimulatedI2c`] replays scripted frames.

use crate::gpio::{Bias, GpioChip, Level};
use crate::i2c::{short_read, Am2320Reading, I2cBus};
use sbc_common::error::{SbcError, SbcResult};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Input(Bias),
    Output,
}

#[derive(Debug, Default)]
struct ChipState {
    claims: HashMap<u8, Claim>,
    /// Levels returned by successive reads, consumed front to back.
    scripted: HashMap<u8, VecDeque<Level>>,
    /// Level held once the script is exhausted.
    steady: HashMap<u8, Level>,
    writes: HashMap<u8, Vec<Level>>,
    released: Vec<u8>,
    refuse_claims: Vec<u8>,
    closed: bool,
}

/// Shared view of a [`SimulatedChip`].
#[derive(Debug, Clone, Default)]
pub struct SimulatedPins {
    state: Arc<Mutex<ChipState>>,
}

impl SimulatedPins {
    fn lock(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue levels for successive reads of `pin`.
    pub fn script_input(&self, pin: u8, levels: impl IntoIterator<Item = Level>) {
        self.lock().scripted.entry(pin).or_default().extend(levels);
    }

    /// Hold `pin` at `level` once any scripted levels are consumed.
    pub fn set_input(&self, pin: u8, level: Level) {
        self.lock().steady.insert(pin, level);
    }

    /// Every level written to `pin`, including the initial claim level.
    #[must_use]
    pub fn writes(&self, pin: u8) -> Vec<Level> {
        self.lock().writes.get(&pin).cloned().unwrap_or_default()
    }

    /// Last level driven on `pin`.
    #[must_use]
    pub fn output_level(&self, pin: u8) -> Option<Level> {
        self.lock().writes.get(&pin).and_then(|w| w.last().copied())
    }

    /// Whether `pin` is currently claimed.
    #[must_use]
    pub fn is_claimed(&self, pin: u8) -> bool {
        self.lock().claims.contains_key(&pin)
    }

    /// Pins released so far, in order.
    #[must_use]
    pub fn released(&self) -> Vec<u8> {
        self.lock().released.clone()
    }

    /// Make claims of `pin` fail as if another process held it.
    pub fn refuse_claims_on(&self, pin: u8) {
        self.lock().refuse_claims.push(pin);
    }

    /// Whether the chip has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// GPIO chip backed by memory.
#[derive(Debug, Default)]
pub struct SimulatedChip {
    pins: SimulatedPins,
}

impl SimulatedChip {
    /// Open a fresh simulated chip.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for scripting and inspection.
    #[must_use]
    pub fn pins(&self) -> SimulatedPins {
        self.pins.clone()
    }

    fn claim(&mut self, pin: u8, claim: Claim, initial: Option<Level>) -> SbcResult<()> {
        let mut state = self.pins.lock();
        if state.refuse_claims.contains(&pin) {
            return Err(SbcError::gpio(pin, "device or resource busy"));
        }
        if state.claims.contains_key(&pin) {
            return Err(SbcError::gpio(pin, "pin already claimed"));
        }
        state.claims.insert(pin, claim);
        if let Some(level) = initial {
            state.writes.entry(pin).or_default().push(level);
        }
        trace!(pin, ?claim, "Simulated pin claimed");
        Ok(())
    }
}

impl GpioChip for SimulatedChip {
    fn claim_input(&mut self, pin: u8, bias: Bias) -> SbcResult<()> {
        self.claim(pin, Claim::Input(bias), None)
    }

    fn claim_output(&mut self, pin: u8, initial: Level) -> SbcResult<()> {
        self.claim(pin, Claim::Output, Some(initial))
    }

    fn read(&mut self, pin: u8) -> SbcResult<Level> {
        let mut state = self.pins.lock();
        let bias = match state.claims.get(&pin) {
            Some(Claim::Input(bias)) => *bias,
            Some(Claim::Output) => return Err(SbcError::gpio(pin, "pin is an output")),
            None => return Err(SbcError::gpio(pin, "pin not claimed")),
        };

        if let Some(level) = state.scripted.get_mut(&pin).and_then(VecDeque::pop_front) {
            state.steady.insert(pin, level);
            return Ok(level);
        }
        Ok(state
            .steady
            .get(&pin)
            .copied()
            .unwrap_or_else(|| bias.idle_level()))
    }

    fn write(&mut self, pin: u8, level: Level) -> SbcResult<()> {
        let mut state = self.pins.lock();
        match state.claims.get(&pin) {
            Some(Claim::Output) => {}
            Some(Claim::Input(_)) => return Err(SbcError::gpio(pin, "pin is an input")),
            None => return Err(SbcError::gpio(pin, "pin not claimed")),
        }
        state.writes.entry(pin).or_default().push(level);
        Ok(())
    }

    fn release(&mut self, pin: u8) -> SbcResult<()> {
        let mut state = self.pins.lock();
        if state.claims.remove(&pin).is_none() {
            return Err(SbcError::gpio(pin, "pin not claimed"));
        }
        state.released.push(pin);
        Ok(())
    }
}

impl Drop for SimulatedChip {
    fn drop(&mut self) {
        let mut state = self.pins.lock();
        let still_claimed: Vec<u8> = state.claims.drain().map(|(pin, _)| pin).collect();
        state.released.extend(still_claimed);
        state.closed = true;
    }
}

/// I2C device backed by memory.
///
/// Reads consume scripted responses in order. Once the script is empty the
/// steady frame is returned, or an error when none is set.
#[derive(Debug, Default)]
pub struct SimulatedI2c {
    script: VecDeque<SbcResult<Vec<u8>>>,
    steady: Option<Vec<u8>>,
    reads: u64,
}

impl SimulatedI2c {
    /// Device with nothing to return.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that always answers with `reading`.
    #[must_use]
    pub fn with_reading(reading: Am2320Reading) -> Self {
        Self {
            steady: Some(reading.to_frame().to_vec()),
            ..Self::default()
        }
    }

    /// Queue a raw response.
    pub fn push_frame(&mut self, frame: impl Into<Vec<u8>>) {
        self.script.push_back(Ok(frame.into()));
    }

    /// Queue a failed transfer.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.script.push_back(Err(SbcError::I2c(message.into())));
    }

    /// Transfers attempted so far.
    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl I2cBus for SimulatedI2c {
    fn read_exact(&mut self, buf: &mut [u8]) -> SbcResult<()> {
        self.reads += 1;
        let frame = match self.script.pop_front() {
            Some(response) => response?,
            None => self
                .steady
                .clone()
                .ok_or_else(|| SbcError::I2c("remote I/O error: no device response".into()))?,
        };

        if frame.len() < buf.len() {
            return Err(short_read(frame.len(), buf.len()));
        }
        buf.copy_from_slice(&frame[..buf.len()]);
        Ok(())
    }
}
