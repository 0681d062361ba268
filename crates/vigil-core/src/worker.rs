//! The loop skeleton shared by producers and consumers (§4.4, §4.5):
//! check for force-quit, bulk-dequeue, detect quiescence and advance the
//! phase, or hand the batch to the caller's `step`.

use std::os::fd::RawFd;
use std::time::Duration;

use tracing::info;

use crate::config::WATCHDOG_READY_MESSAGE;
use crate::phase::{Phase, PhaseValue};
use crate::queue::{TaskQueue, BULK_CAP};
use crate::task::Task;

/// How long a worker sleeps after an empty dequeue. Bounds busy-wait CPU
/// usage; the worker still re-checks the phase at the top of every
/// iteration, so this adds no meaningful latency to shutdown.
const IDLE_SLEEP: Duration = Duration::from_millis(5);

/// Runs the identical top-level loop shared by producers and consumers.
///
/// `ready_to_finish` gates whether an empty, quiescent queue should
/// advance the phase right now: producers gate on nothing (an empty,
/// quiescent directory queue always means producing is done), consumers
/// additionally require the phase to have already reached
/// `ProducerDone` (an empty file queue early in the run just means no
/// files have been discovered *yet*, not that none remain).
pub fn run_loop<Step>(
    phase: &Phase,
    queue: &TaskQueue,
    finish_phase: PhaseValue,
    ready_to_finish: impl Fn(PhaseValue) -> bool,
    write_fd: RawFd,
    mut step: Step,
) where
    Step: FnMut(&[Task]),
{
    let mut buf = [Task::EMPTY; BULK_CAP];
    let mut notified = false;

    loop {
        // `ForceQuit` sorts above every `finish_phase` a caller passes,
        // so this one comparison covers both early cancellation and
        // ordinary end-of-work exit.
        if phase.load() >= finish_phase {
            break;
        }

        let n = queue.bulk_dequeue(&mut buf);
        if n == 0 {
            let current = phase.load();
            if current >= finish_phase {
                break;
            }
            if ready_to_finish(current) && matches!(queue.is_quiescent(), Some(true)) {
                info!(?finish_phase, "queue quiescent; raising lifecycle phase");
                phase.store_if_greater(finish_phase);
                notify_watchdog(write_fd, &mut notified);
            }
            std::thread::sleep(IDLE_SLEEP);
            continue;
        }

        step(&buf[..n]);
        queue.mark_done(n);
    }
}

/// Sends the one-shot "pool is done" notification. Idempotent: only the
/// first call per worker actually writes (§8's round-trip property).
fn notify_watchdog(write_fd: RawFd, notified: &mut bool) {
    if *notified {
        return;
    }
    *notified = true;
    unsafe {
        libc::write(
            write_fd,
            WATCHDOG_READY_MESSAGE.as_ptr() as *const libc::c_void,
            WATCHDOG_READY_MESSAGE.len(),
        );
    }
}
