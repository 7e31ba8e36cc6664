//! Signal handling for graceful shutdown.
//!
//! SIGINT and SIGTERM cancel the process-wide [`CancellationToken`]. The
//! handler only performs atomic stores. Handlers are installed without
//! `SA_RESTART`, so a signal landing during an absolute wait interrupts
//! it and the loop sees the cancellation immediately.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use sbc_runtime::CancellationToken;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::OnceLock;
use tracing::debug;

static SHUTDOWN_TOKEN: OnceLock<CancellationToken> = OnceLock::new();
static SIGNAL_COUNT: AtomicU32 = AtomicU32::new(0);
static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Signal types that end the demo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - Graceful termination request.
    Terminate,
    /// SIGINT - Interrupt (Ctrl+C).
    Interrupt,
}

impl SignalKind {
    fn from_raw(signum: c_int) -> Option<Self> {
        match signum {
            libc::SIGTERM => Some(Self::Terminate),
            libc::SIGINT => Some(Self::Interrupt),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
        }
    }
}

extern "C" fn on_shutdown_signal(signum: c_int) {
    SIGNAL_COUNT.fetch_add(1, Ordering::Relaxed);
    LAST_SIGNAL.store(signum, Ordering::Relaxed);
    if let Some(token) = SHUTDOWN_TOKEN.get() {
        token.cancel();
    }
}

/// Handle for the installed shutdown handlers.
#[derive(Debug, Clone)]
pub struct SignalHandler {
    token: CancellationToken,
}

impl SignalHandler {
    /// Register handlers for SIGINT and SIGTERM.
    ///
    /// Installing twice returns a handle to the same token.
    pub fn install() -> std::io::Result<Self> {
        let token = SHUTDOWN_TOKEN.get_or_init(CancellationToken::new).clone();

        let action = SigAction::new(
            SigHandler::Handler(on_shutdown_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );
        for signal in [Signal::SIGINT, Signal::SIGTERM] {
            // SAFETY: the handler only touches atomics and an initialized
            // OnceLock, all of which are async-signal-safe.
            unsafe { sigaction(signal, &action) }.map_err(std::io::Error::from)?;
        }

        debug!("Unix signal handlers registered");
        Ok(Self { token })
    }

    /// Token cancelled by the handlers.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of shutdown signals received.
    pub fn signal_count(&self) -> u32 {
        SIGNAL_COUNT.load(Ordering::Relaxed)
    }

    /// Most recent shutdown signal, if any arrived.
    pub fn last_signal(&self) -> Option<SignalKind> {
        SignalKind::from_raw(LAST_SIGNAL.load(Ordering::Relaxed))
    }
}
