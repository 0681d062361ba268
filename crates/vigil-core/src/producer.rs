//! Producer loop (§4.4): drains the directory queue, enumerates
//! entries, and feeds discovered subdirectories and regular files back
//! into the two task queues.
//!
//! Recursive traversal is realized entirely through the queue, never
//! through call-stack recursion, so memory use stays bounded regardless
//! of tree depth.

use std::fs;
use std::os::fd::RawFd;
use std::path::Path;

use tracing::{debug, warn};

use crate::phase::PhaseValue;
use crate::region::SharedRegion;
use crate::task::{Task, TaskKind};
use crate::worker::run_loop;

pub fn run<E>(region: &SharedRegion<E>, write_fd: RawFd) {
    run_loop(
        &region.phase,
        &region.dir_queue,
        PhaseValue::ProducerDone,
        |_current| true,
        write_fd,
        |tasks| {
            for task in tasks {
                if task.kind != TaskKind::ScanDir {
                    debug!(?task, "producer received a non-directory task; dropping");
                    continue;
                }
                expand_directory(region, &task.path());
            }
        },
    );
}

fn expand_directory<E>(region: &SharedRegion<E>, dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to open directory; skipping");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read a directory entry; skipping");
                continue;
            }
        };

        let path = entry.path();

        // `symlink_metadata` is the lstat equivalent: it never follows a
        // terminal symlink, so a symlinked directory or file is neither
        // traversed into nor scanned (§4.4, §8).
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "lstat failed; skipping");
                continue;
            }
        };

        let file_type = metadata.file_type();
        let (kind, target_queue) = if file_type.is_dir() {
            (TaskKind::ScanDir, &region.dir_queue)
        } else if file_type.is_file() {
            (TaskKind::ScanFile, &region.file_queue)
        } else {
            // Symlinks, devices, sockets, fifos: never followed.
            continue;
        };

        match Task::new(kind, &path) {
            Ok(task) => target_queue.enqueue(task),
            Err(e) => warn!(path = %path.display(), error = %e, "path exceeds task capacity; skipping"),
        }
    }
}
