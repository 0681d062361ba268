//! Supervisor-side loop that waits for a pool's completion phase or a
//! readiness-pipe message, then broadcasts the pool's shutdown signal
//! and reaps every child (§4.6). Run by the supervisor itself, never in
//! a child.

use std::os::fd::BorrowedFd;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::kill;
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use tracing::{debug, error};

use crate::config::{WATCHDOG_POLL_TIMEOUT_MS, WATCHDOG_READY_MESSAGE};
use crate::error::CoreError;
use crate::observer::Observer;
use crate::phase::{Phase, PhaseValue};

/// Waits for `phase` to reach `target` or for `observer`'s pipe to
/// deliver the readiness message, then signals and reaps the pool.
pub fn run(observer: &mut Observer, phase: &Phase, target: PhaseValue) -> Result<(), CoreError> {
    // As long as the supervisor holds its own copy of the write end
    // open, the read end can never see EOF once every child has exited
    // and closed its own copy (§4.6).
    observer.close_write_end();
    let read_fd = observer.read_fd();

    let timeout =
        PollTimeout::try_from(WATCHDOG_POLL_TIMEOUT_MS).expect("poll timeout fits in PollTimeout");

    loop {
        if phase.load() >= target {
            break;
        }

        // Safety: `read_fd` is the observer's read end, kept open for
        // the lifetime of this loop.
        let borrowed = unsafe { BorrowedFd::borrow_raw(read_fd) };
        let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
        match poll(&mut fds, timeout) {
            Ok(0) => {
                debug!("watchdog poll woke on timeout");
            }
            Ok(_) => {
                if read_ready_message(read_fd) {
                    debug!("pool signaled readiness via pipe");
                    break;
                }
            }
            Err(nix::errno::Errno::EINTR) => {}
            Err(e) => {
                error!(error = %e, "watchdog poll failed");
            }
        }
    }

    broadcast_and_reap(observer, phase)
}

/// Reads at most `WATCHDOG_READY_MESSAGE.len()` bytes; a read returning
/// exactly that message is success, anything else falls back to the
/// phase re-check at the top of the caller's loop (§4.6).
fn read_ready_message(read_fd: std::os::fd::RawFd) -> bool {
    let mut buf = [0u8; WATCHDOG_READY_MESSAGE.len()];
    let n = unsafe { libc::read(read_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    n == buf.len() as isize && buf == *WATCHDOG_READY_MESSAGE
}

fn broadcast_and_reap(observer: &mut Observer, phase: &Phase) -> Result<(), CoreError> {
    for pid in &observer.children {
        if let Err(e) = kill(*pid, observer.signal) {
            error!(pid = pid.as_raw(), error = %e, "failed to signal child; it may have already exited");
        }
    }

    let mut reap_failed = false;
    for pid in &observer.children {
        if let Err(e) = reap_one(*pid) {
            error!(pid = pid.as_raw(), error = %e, "failed to reap child");
            reap_failed = true;
        }
    }

    if reap_failed {
        phase.force_quit();
    }

    Ok(())
}

fn reap_one(pid: Pid) -> Result<(), CoreError> {
    waitpid(pid, None)
        .map(|_| ())
        .map_err(|e| CoreError::Reap {
            pid: pid.as_raw(),
            source: e,
        })
}
