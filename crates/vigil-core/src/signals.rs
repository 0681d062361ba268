//! The supervisor's own cancellation handlers (§4.7, §9) — distinct
//! from the per-pool shutdown signal handlers in `spawner.rs`, which
//! run only in children.
//!
//! A signal handler must stick to async-signal-safe operations: here,
//! that means checking which process installed the handler, forcing the
//! phase to `ForceQuit`, and writing a short diagnostic to a raw
//! descriptor. Nothing else. Rather than the C implementation's global
//! statics reached directly, a single process-wide atomic pointer is
//! initialized right before handler registration and cleared right
//! before teardown, so the handler never reaches into memory the
//! supervisor has already unmapped.

use std::sync::atomic::{AtomicI32, AtomicPtr, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::getpid;

use crate::error::CoreError;
use crate::phase::Phase;

static PHASE_PTR: AtomicPtr<Phase> = AtomicPtr::new(std::ptr::null_mut());
static SUPERVISOR_PID: AtomicI32 = AtomicI32::new(0);

const CANCEL_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

/// Installs `SIGINT`/`SIGTERM` handlers that force `phase` to
/// `ForceQuit`. Must be called from the supervisor process only, before
/// any pool is spawned.
pub fn install_cancellation_handlers(phase: &Phase) -> Result<(), CoreError> {
    SUPERVISOR_PID.store(getpid().as_raw(), Ordering::SeqCst);
    PHASE_PTR.store(phase as *const Phase as *mut Phase, Ordering::SeqCst);

    let action = SigAction::new(
        SigHandler::Handler(handle_cancellation),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in CANCEL_SIGNALS {
        unsafe { sigaction(signal, &action) }.map_err(CoreError::Signal)?;
    }
    Ok(())
}

/// Clears the process-wide pointer before the shared mapping it points
/// into is unmapped, so a cancellation signal arriving during teardown
/// cannot dereference freed memory.
pub fn clear_cancellation_handlers() {
    PHASE_PTR.store(std::ptr::null_mut(), Ordering::SeqCst);
}

extern "C" fn handle_cancellation(_signo: libc::c_int) {
    // Async-signal-safe: getpid, an atomic load, an atomic store, and a
    // raw write. Nothing else runs here.
    if getpid().as_raw() != SUPERVISOR_PID.load(Ordering::SeqCst) {
        return;
    }

    let ptr = PHASE_PTR.load(Ordering::SeqCst);
    if ptr.is_null() {
        return;
    }
    unsafe {
        (*ptr).force_quit();
    }

    let msg = b"vigilscan: cancellation requested, shutting down\n";
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            msg.as_ptr() as *const libc::c_void,
            msg.len(),
        );
    }
}
