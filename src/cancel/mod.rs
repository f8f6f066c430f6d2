//! Cooperative stop requests
//!
//! A [`CancelToken`] is shared between the report pass and whoever may ask
//! it to stop (the signal handler in the binary, or a test). The pass checks
//! it between hive files; a tool that is already running is left to finish.
//!
//! On SIGINT/SIGTERM:
//! 1. First signal: request a stop; the current file completes and the
//!    module reports STOP
//! 2. Second signal: exit immediately with [`EXIT_CODE_STOPPED`]

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Exit code for a run that ended on a stop request
pub const EXIT_CODE_STOPPED: i32 = 80;

/// Shared stop flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenState>,
}

#[derive(Debug, Default)]
struct TokenState {
    requested: AtomicBool,
    signals: AtomicU8,
}

/// What to do on a delivered signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: stop after the current file
    RequestStop,
    /// Second signal: exit now
    ImmediateExit,
    /// Third and later: already exiting
    Ignore,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the pass to stop at the next file boundary.
    pub fn cancel(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Record a delivered signal and decide what to do about it.
    pub fn handle_signal(&self) -> SignalAction {
        match self.inner.signals.fetch_add(1, Ordering::SeqCst) {
            0 => {
                self.cancel();
                SignalAction::RequestStop
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }

    /// Route SIGINT/SIGTERM to this token. Call once per process.
    pub fn install_signal_handler(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || match token.handle_signal() {
            SignalAction::RequestStop => {
                tracing::warn!("stop requested; finishing the current hive file");
            }
            SignalAction::ImmediateExit => {
                tracing::error!("second signal, exiting immediately");
                std::process::exit(EXIT_CODE_STOPPED);
            }
            SignalAction::Ignore => {}
        })
    }
}
