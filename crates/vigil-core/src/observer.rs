//! Per-pool bookkeeping: spawned child pids, the signal used to wake a
//! pool for shutdown, and the one-shot readiness pipe workers use to
//! notify their watchdog (§4.3).
//!
//! This deliberately lives in the supervisor's private memory rather
//! than in the shared region: the child-identifier list is never read
//! by a child, and the pipe's file descriptors cross into children
//! through ordinary `fork` fd inheritance, not through shared memory.
//! See DESIGN.md for the full rationale.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::sys::signal::Signal;
use nix::unistd::{pipe, Pid};

use crate::error::CoreError;

pub struct Observer {
    pub signal: Signal,
    pub size: usize,
    pub children: Vec<Pid>,
    read_end: OwnedFd,
    write_end: Option<OwnedFd>,
}

impl Observer {
    pub fn new(size: usize, signal: Signal) -> Result<Self, CoreError> {
        let (read_end, write_end) = pipe().map_err(CoreError::Pipe)?;
        Ok(Self {
            signal,
            size,
            children: Vec::with_capacity(size),
            read_end,
            write_end: Some(write_end),
        })
    }

    pub fn read_fd(&self) -> RawFd {
        self.read_end.as_raw_fd()
    }

    /// `-1` once [`close_write_end`](Self::close_write_end) has run.
    /// Children read this before that point, while spawning; the
    /// watchdog reads it only to close it.
    pub fn write_fd(&self) -> RawFd {
        self.write_end
            .as_ref()
            .map(OwnedFd::as_raw_fd)
            .unwrap_or(-1)
    }

    /// Closes the supervisor's copy of the write end. Called exactly
    /// once, by the watchdog, before it starts polling: as long as the
    /// supervisor holds a copy open, the read end never reports EOF
    /// after every child has exited and closed its own copy (§4.6).
    pub fn close_write_end(&mut self) {
        self.write_end = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_fd_is_valid_until_closed() {
        let mut observer = Observer::new(2, Signal::SIGUSR1).unwrap();
        assert!(observer.write_fd() >= 0);
        observer.close_write_end();
        assert_eq!(observer.write_fd(), -1);
    }

    #[test]
    fn children_start_empty_with_capacity_reserved() {
        let observer = Observer::new(4, Signal::SIGUSR2).unwrap();
        assert!(observer.children.is_empty());
        assert_eq!(observer.size, 4);
    }
}
