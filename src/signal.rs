//! Termination signals received while an external job runs
//!
//! A background thread records SIGINT, SIGTERM and SIGHUP. The process
//! runner polls for a pending signal and passes it on to the job, so
//! stopping specbench never leaves a GPU job running unattended.

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::OnceLock;
use std::thread;

/// The last signal received and not yet taken (0 if none)
static PENDING: AtomicI32 = AtomicI32::new(0);

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Install the handlers once per process. Returns false when the
/// platform refused them, in which case signals keep their default action.
pub fn install() -> bool {
    *INSTALLED.get_or_init(|| match Signals::new([SIGINT, SIGTERM, SIGHUP]) {
        Ok(mut signals) => {
            thread::spawn(move || {
                for sig in signals.forever() {
                    PENDING.store(sig, Ordering::SeqCst);
                }
            });
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not install signal handlers");
            false
        }
    })
}

/// Take the pending signal, clearing it
pub fn take_pending() -> Option<i32> {
    match PENDING.swap(0, Ordering::SeqCst) {
        0 => None,
        sig => Some(sig),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_is_idempotent() {
        assert_eq!(install(), install());
    }
}
