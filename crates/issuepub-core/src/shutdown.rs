//! Graceful shutdown via atomic flag.
//!
//! First SIGINT/SIGTERM sets the flag so the current document can finish
//! and the cache and report still get flushed. A second signal exits.

use std::sync::atomic::{AtomicBool, Ordering};

/// Exit status for a run stopped by a signal
pub const INTERRUPTED_EXIT: u8 = 130;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Check if shutdown was requested
pub fn is_shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Request shutdown (signal handlers, tests)
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Register SIGINT/SIGTERM handlers.
pub fn install_signal_handlers() -> std::io::Result<()> {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
        unsafe {
            signal_hook::low_level::register(signal, || {
                if SHUTDOWN.swap(true, Ordering::Relaxed) {
                    std::process::exit(i32::from(INTERRUPTED_EXIT));
                }
            })?;
        }
    }
    Ok(())
}
