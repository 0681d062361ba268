//! Consumer loop (§4.5): drains the file queue, submits each file to
//! the scan engine, and records the outcome.

use std::os::fd::{AsFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;

use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use tracing::{debug, warn};

use crate::engine::{EngineError, ScanEngine, ScanVerdict};
use crate::phase::PhaseValue;
use crate::region::SharedRegion;
use crate::task::TaskKind;
use crate::worker::run_loop;

pub fn run<E: ScanEngine>(region: &SharedRegion<E>, write_fd: RawFd, quiet: bool) {
    run_loop(
        &region.phase,
        &region.file_queue,
        PhaseValue::AllTasksDone,
        |current| current >= PhaseValue::ProducerDone,
        write_fd,
        |tasks| {
            for task in tasks {
                if task.kind != TaskKind::ScanFile {
                    debug!(?task, "consumer received a non-file task; dropping");
                    continue;
                }
                scan_one(region, &task.path(), quiet);
            }
        },
    );
}

fn scan_one<E: ScanEngine>(region: &SharedRegion<E>, path: &Path, quiet: bool) {
    let fd = match open_readonly(path) {
        Ok(fd) => fd,
        Err(e) => {
            region.result.record_error();
            warn!(path = %path.display(), error = %e, "failed to open file for scanning");
            println!("{}: SCAN ERROR: {e}", path.display());
            return;
        }
    };

    match region.engine.scan(fd.as_fd()) {
        Ok(ScanVerdict::Clean) => {
            region.result.record_clean();
            if !quiet {
                println!("{}: OK", path.display());
            }
        }
        Ok(ScanVerdict::Infected { name }) => {
            region.result.record_infected();
            println!("{}: {name} FOUND", path.display());
        }
        Err(e) => {
            region.result.record_error();
            warn!(path = %path.display(), error = %e, "engine scan error");
            println!("{}: SCAN ERROR: {e}", path.display());
        }
    }
}

/// Opens `path` read-only without following a terminal symlink, with
/// close-on-exec set (§4.5). Shared by the consumer loop and the
/// scan-a-single-regular-file fast path in `supervisor.rs`.
pub fn open_readonly(path: &Path) -> Result<OwnedFd, EngineError> {
    let raw = open(
        path,
        OFlag::O_RDONLY | OFlag::O_NOFOLLOW | OFlag::O_CLOEXEC,
        Mode::empty(),
    )?;
    // Safety: `open` just returned a fresh, uniquely owned descriptor.
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}
