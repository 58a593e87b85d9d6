/// Async-safe termination signal tracking for the runner process
///
/// The handler only stores the signal number; the wait loop polls
/// [`TerminationSignals::received`] and tears the child down itself.
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicI32, Ordering};

use crate::config::types::{Result, RunnerError};

/// Last termination signal received (0 if none)
static SIGNAL_RECEIVED: AtomicI32 = AtomicI32::new(0);

const HANDLED: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

extern "C" fn record_signal(signal: libc::c_int) {
    SIGNAL_RECEIVED.store(signal, Ordering::SeqCst);
}

/// Handle for querying termination requests
#[derive(Clone, Copy, Debug)]
pub struct TerminationSignals;

impl TerminationSignals {
    /// Install handlers for SIGINT, SIGTERM and SIGHUP.
    /// Must be called before any threads are spawned.
    pub fn install() -> Result<Self> {
        let action = SigAction::new(
            SigHandler::Handler(record_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );

        for sig in HANDLED {
            let installed = unsafe { signal::sigaction(sig, &action) };
            installed.map_err(|e| {
                RunnerError::Signal(format!("Failed to install {} handler: {}", sig, e))
            })?;
        }

        log::debug!("Signal handlers installed (SIGINT, SIGTERM, SIGHUP)");
        Ok(Self)
    }

    /// Signal number received since installation, if any
    pub fn received(&self) -> Option<i32> {
        pending_signal()
    }
}

fn pending_signal() -> Option<i32> {
    match SIGNAL_RECEIVED.load(Ordering::SeqCst) {
        0 => None,
        sig => Some(sig),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_succeeds() {
        assert!(TerminationSignals::install().is_ok());
    }

    #[test]
    fn test_recorded_signal_is_visible() {
        let signals = TerminationSignals::install().unwrap();
        record_signal(libc::SIGHUP);
        assert_eq!(signals.received(), Some(libc::SIGHUP));

        SIGNAL_RECEIVED.store(0, Ordering::SeqCst);
        assert_eq!(signals.received(), None);
    }
}
