//! Forks `observer.size` children into a pool, each running `entry`
//! until it exits (§4.3).
//!
//! Before the first fork, the supervisor ignores the pool's shutdown
//! signal in itself, so the watchdog's later broadcast of it can never
//! kill the supervisor. Each child re-installs a handler for that same
//! signal right after forking.

use std::os::fd::RawFd;

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, Signal};
use nix::unistd::{close, fork, ForkResult};
use tracing::warn;

use crate::error::CoreError;
use crate::observer::Observer;

/// No-op handler installed in each child for its pool's shutdown signal.
/// Its only job is to exist: without an installed handler, the default
/// disposition of `SIGUSR1`/`SIGUSR2` is to terminate the process
/// outright, rather than merely interrupt whatever blocking syscall the
/// worker is inside and let the next loop-top phase check decide.
extern "C" fn pool_shutdown_handler(_signo: libc::c_int) {}

/// Forks `observer.size` children, each running `entry(write_fd)` and
/// then exiting with success status. A fork failure aborts spawning
/// further children; any already spawned are left running for the
/// watchdog to reap once the caller forces `ForceQuit` (§4.3, §7).
pub fn spawn_pool<F>(observer: &mut Observer, entry: F) -> Result<(), CoreError>
where
    F: Fn(RawFd) + Copy,
{
    ignore_in_supervisor(observer.signal)?;

    for _ in 0..observer.size {
        match unsafe { fork() }.map_err(CoreError::Fork)? {
            ForkResult::Child => {
                if let Err(e) = install_child_handler(observer.signal) {
                    warn!(error = %e, "failed to install pool shutdown handler in child");
                }
                let _ = close(observer.read_fd());
                entry(observer.write_fd());
                std::process::exit(0);
            }
            ForkResult::Parent { child } => {
                observer.children.push(child);
            }
        }
    }

    Ok(())
}

fn ignore_in_supervisor(signal: Signal) -> Result<(), CoreError> {
    let action = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), nix::sys::signal::SigSet::empty());
    unsafe { sigaction(signal, &action) }
        .map(|_| ())
        .map_err(CoreError::Signal)
}

fn install_child_handler(signal: Signal) -> Result<(), CoreError> {
    let action = SigAction::new(
        SigHandler::Handler(pool_shutdown_handler),
        SaFlags::empty(),
        nix::sys::signal::SigSet::empty(),
    );
    unsafe { sigaction(signal, &action) }
        .map(|_| ())
        .map_err(CoreError::Signal)
}
