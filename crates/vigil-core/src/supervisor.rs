//! The supervisor lifecycle (§4.7): resolve the target, construct the
//! engine, create the shared region, seed the first task, install
//! cancellation handlers, spawn both pools, run both watchdogs in turn,
//! print the summary, and tear down.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::{self, CONSUMER_SIGNAL, PRODUCER_SIGNAL};
use crate::consumer;
use crate::engine::{EngineError, ScanEngine, ScanVerdict};
use crate::error::CoreError;
use crate::observer::Observer;
use crate::phase::PhaseValue;
use crate::producer;
use crate::region::SharedMapping;
use crate::result::ResultSnapshot;
use crate::signals;
use crate::spawner;
use crate::task::{Task, TaskKind};
use crate::watchdog;

/// Inputs resolved from the CLI surface (§6, §10.3).
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub path: PathBuf,
    pub workers: usize,
    pub signature_dir: PathBuf,
    pub quiet: bool,
}

/// What a completed (or cancelled) run produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOutcome {
    pub result: ResultSnapshot,
    pub cancelled: bool,
}

/// Runs the scanner to completion against `opts`. Returns `Ok` both on
/// normal completion and on user cancellation (§7's three-outcome
/// model); only initialization failures are `Err`.
pub fn run<E>(opts: RunOptions) -> Result<RunOutcome, CoreError>
where
    E: ScanEngine + Send + Sync,
{
    let root = resolve_absolute(&opts.path)?;

    if root.is_file() {
        return scan_single_file::<E>(&root, &opts);
    }

    info!(signature_dir = %opts.signature_dir.display(), "loading scan engine");
    let engine = E::load(&opts.signature_dir).map_err(|e| {
        error!(error = %e, "failed to construct scan engine");
        CoreError::Sync(format!("engine load failed: {e}"))
    })?;

    let region = SharedMapping::new(engine)?;

    let root_task = Task::new(TaskKind::ScanDir, &root)?;
    region.get().dir_queue.enqueue(root_task);

    signals::install_cancellation_handlers(&region.get().phase)?;

    let workers = config::clamp_workers(opts.workers);
    let producers = config::producer_pool_size(workers);
    info!(producers, consumers = workers, "spawning scan pools");

    let mut producer_observer = Observer::new(producers, PRODUCER_SIGNAL)?;
    let mut consumer_observer = Observer::new(workers, CONSUMER_SIGNAL)?;

    let region_ptr: *const _ = region.get();
    let quiet = opts.quiet;

    if let Err(e) = spawner::spawn_pool(&mut producer_observer, move |write_fd| {
        let region = unsafe { &*region_ptr };
        producer::run(region, write_fd);
    }) {
        warn!(error = %e, "producer pool spawn failed; forcing shutdown");
        region.get().phase.force_quit();
    }

    if let Err(e) = spawner::spawn_pool(&mut consumer_observer, move |write_fd| {
        let region = unsafe { &*region_ptr };
        consumer::run(region, write_fd, quiet);
    }) {
        warn!(error = %e, "consumer pool spawn failed; forcing shutdown");
        region.get().phase.force_quit();
    }

    watchdog::run(&mut producer_observer, &region.get().phase, PhaseValue::ProducerDone)?;
    watchdog::run(&mut consumer_observer, &region.get().phase, PhaseValue::AllTasksDone)?;

    // Clear the signal handler's pointer before the mapping it refers
    // into is unmapped at the end of this function's scope.
    signals::clear_cancellation_handlers();

    let snapshot = region.get().result.snapshot();
    let cancelled = region.get().phase.load() == PhaseValue::ForceQuit;

    print_summary(&snapshot);

    Ok(RunOutcome {
        result: snapshot,
        cancelled,
    })
}

/// Step 1 of §4.7: a regular file is scanned directly, with no pool
/// spawned at all.
fn scan_single_file<E>(path: &Path, opts: &RunOptions) -> Result<RunOutcome, CoreError>
where
    E: ScanEngine,
{
    let engine = E::load(&opts.signature_dir)
        .map_err(|e| CoreError::Sync(format!("engine load failed: {e}")))?;

    let mut snapshot = ResultSnapshot::default();
    match scan_outcome(&engine, path) {
        Ok(ScanVerdict::Clean) => {
            snapshot.files_scanned = 1;
            if !opts.quiet {
                println!("{}: OK", path.display());
            }
        }
        Ok(ScanVerdict::Infected { name }) => {
            snapshot.files_scanned = 1;
            snapshot.infections_found = 1;
            println!("{}: {name} FOUND", path.display());
        }
        Err(e) => {
            snapshot.errors = 1;
            println!("{}: SCAN ERROR: {e}", path.display());
        }
    }

    print_summary(&snapshot);
    Ok(RunOutcome {
        result: snapshot,
        cancelled: false,
    })
}

fn scan_outcome<E: ScanEngine>(engine: &E, path: &Path) -> Result<ScanVerdict, EngineError> {
    use std::os::fd::AsFd;
    let fd = consumer::open_readonly(path)?;
    engine.scan(fd.as_fd())
}

fn print_summary(snapshot: &ResultSnapshot) {
    println!("scanned: {}", snapshot.files_scanned);
    println!("infected: {}", snapshot.infections_found);
    println!("errors: {}", snapshot.errors);
}

fn resolve_absolute(path: &Path) -> Result<PathBuf, CoreError> {
    std::fs::canonicalize(path)
        .map_err(|e| CoreError::InvalidPath(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StubEngine;
    use std::io::Write;

    #[test]
    fn single_clean_file_reports_ok_and_no_pools() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"harmless").unwrap();

        let opts = RunOptions {
            path: file.path().to_path_buf(),
            workers: 1,
            signature_dir: PathBuf::from("/nonexistent"),
            quiet: false,
        };

        let outcome = run::<StubEngine>(opts).unwrap();
        assert_eq!(outcome.result.files_scanned, 1);
        assert_eq!(outcome.result.infections_found, 0);
        assert_eq!(outcome.result.errors, 0);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn single_infected_file_is_reported_and_not_scanned_clean() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*",
        )
        .unwrap();

        let opts = RunOptions {
            path: file.path().to_path_buf(),
            workers: 1,
            signature_dir: PathBuf::from("/nonexistent"),
            quiet: false,
        };

        let outcome = run::<StubEngine>(opts).unwrap();
        assert_eq!(outcome.result.files_scanned, 1);
        assert_eq!(outcome.result.infections_found, 1);
    }
}
