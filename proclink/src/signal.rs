//! SIGINT / SIGTERM latch for the supervisor.
//!
//! The handler only stores into an atomic; the supervisor polls
//! [`interrupted`] between child checks. Handlers are installed for the
//! lifetime of a [`SignalGuard`] and the previous dispositions come back
//! when it drops.

#![allow(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

#[cfg(unix)]
const HANDLED: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

#[cfg(unix)]
extern "C" fn on_signal(_: std::os::raw::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Keeps the handlers installed; restores the previous ones on drop.
#[derive(Debug)]
#[must_use = "handlers are removed when the guard drops"]
pub struct SignalGuard {
    #[cfg(unix)]
    previous: Vec<(Signal, SigAction)>,
}

/// Install the handlers and clear the latch.
#[cfg(unix)]
pub fn install() -> SignalGuard {
    reset();
    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    let mut previous = Vec::with_capacity(HANDLED.len());
    for signal in HANDLED {
        // SAFETY: the handler only touches an atomic, which is
        // async-signal-safe.
        match unsafe { sigaction(signal, &action) } {
            Ok(old) => previous.push((signal, old)),
            Err(e) => tracing::warn!("[SUPERVISOR] Failed to install {} handler: {}", signal, e),
        }
    }
    SignalGuard { previous }
}

/// Install the handlers and clear the latch.
#[cfg(not(unix))]
pub fn install() -> SignalGuard {
    reset();
    SignalGuard {}
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        for (signal, old) in self.previous.drain(..).rev() {
            // SAFETY: `old` is the disposition the process had before.
            if let Err(e) = unsafe { sigaction(signal, &old) } {
                tracing::warn!("[SUPERVISOR] Failed to restore {} handler: {}", signal, e);
            }
        }
    }
}

/// Whether SIGINT or SIGTERM arrived since the last [`reset`].
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Clear the latch.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}
