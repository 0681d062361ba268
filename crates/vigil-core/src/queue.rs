//! The bounded, process-shared task queue.
//!
//! A fixed-capacity ring of [`Task`] guarded by a [`PsharedMutex`] plus two
//! counting semaphores (`empty`/`full`), with a non-blocking bulk-fetch
//! path built so a consumer never blocks while holding the mutex — that
//! would deadlock once every producer has already exited.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::CoreError;
use crate::sync::{PsharedMutex, PsharedSemaphore};
use crate::task::Task;

/// Ring buffer capacity. A power of two, as the spec requires, so index
/// wraparound is a cheap modulo (the compiler turns `% QUEUE_CAPACITY`
/// into a mask since the divisor is a compile-time power of two).
pub const QUEUE_CAPACITY: usize = 4096;

/// Upper bound on tasks drained by a single `bulk_dequeue` call. Amortizes
/// the mutex acquire while keeping any one consumer from monopolizing the
/// queue.
pub const BULK_CAP: usize = 32;

/// A bounded MPMC FIFO of [`Task`]s living inline in the shared mapping.
#[repr(C)]
pub struct TaskQueue {
    mutex: PsharedMutex,
    empty: PsharedSemaphore,
    full: PsharedSemaphore,
    count: AtomicI64,
    in_progress: AtomicI64,
    head: UnsafeCell<usize>,
    tail: UnsafeCell<usize>,
    slots: UnsafeCell<[MaybeUninit<Task>; QUEUE_CAPACITY]>,
}

unsafe impl Send for TaskQueue {}
unsafe impl Sync for TaskQueue {}

impl TaskQueue {
    /// # Safety
    /// Same in-place-construction contract as the primitives it wraps:
    /// `this` must point at unobserved memory inside the shared mapping.
    pub unsafe fn init_in_place(this: *mut Self) -> Result<(), CoreError> {
        PsharedMutex::init_in_place(std::ptr::addr_of_mut!((*this).mutex))?;
        PsharedSemaphore::init_in_place(
            std::ptr::addr_of_mut!((*this).empty),
            QUEUE_CAPACITY as u32,
        )?;
        PsharedSemaphore::init_in_place(std::ptr::addr_of_mut!((*this).full), 0)?;
        std::ptr::addr_of_mut!((*this).count).write(AtomicI64::new(0));
        std::ptr::addr_of_mut!((*this).in_progress).write(AtomicI64::new(0));
        std::ptr::addr_of_mut!((*this).head).write(UnsafeCell::new(0));
        std::ptr::addr_of_mut!((*this).tail).write(UnsafeCell::new(0));
        // `MaybeUninit` slots carry no validity invariant of their own;
        // the array itself needs no initialization beyond this.
        std::ptr::addr_of_mut!((*this).slots).write(UnsafeCell::new(uninit_slots()));
        Ok(())
    }

    /// Blocks until a slot is free, then appends `task`. Linearizes at the
    /// mutex release inside the critical section below.
    pub fn enqueue(&self, task: Task) {
        self.empty.wait();
        {
            let _guard = self.mutex.lock();
            unsafe {
                let tail = *self.tail.get();
                (*self.slots.get())[tail].write(task);
                *self.tail.get() = (tail + 1) % QUEUE_CAPACITY;
            }
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        self.full.post();
    }

    /// Non-blocking. Drains up to `buf.len()` (capped at [`BULK_CAP`])
    /// tasks into `buf` and returns how many were written. Returning 0 is
    /// the normal "nothing ready right now" signal, not an error.
    ///
    /// Marks every drained task in-progress before releasing the mutex,
    /// in the same critical section that decrements `count`. Doing this
    /// as a separate post-return step would leave a window, after the
    /// mutex is released but before the caller marks the batch
    /// in-progress, where `count == 0 && in_progress == 0` even though a
    /// batch has been handed out and is about to produce more work — a
    /// false-positive quiescence observation that §3 Invariant C and §8
    /// forbid. The caller still owns marking each task *done* once it has
    /// actually been processed, via [`TaskQueue::mark_done`].
    pub fn bulk_dequeue(&self, buf: &mut [Task]) -> usize {
        let Some(_guard) = self.mutex.try_lock() else {
            return 0;
        };

        let available = self.count.load(Ordering::SeqCst).max(0) as usize;
        let wanted = available.min(buf.len()).min(BULK_CAP);

        let mut acquired = 0;
        while acquired < wanted && self.full.try_wait() {
            acquired += 1;
        }

        for slot in buf.iter_mut().take(acquired) {
            unsafe {
                let head = *self.head.get();
                *slot = (*self.slots.get())[head].assume_init_read();
                *self.head.get() = (head + 1) % QUEUE_CAPACITY;
            }
            self.empty.post();
        }

        if acquired > 0 {
            self.count.fetch_sub(acquired as i64, Ordering::SeqCst);
            self.in_progress.fetch_add(acquired as i64, Ordering::SeqCst);
        }

        acquired
    }

    /// Non-blocking quiescence check. `None` means the mutex was
    /// contended and the caller should treat that pessimistically as
    /// "not quiescent" rather than risk a false-positive termination
    /// signal.
    pub fn is_quiescent(&self) -> Option<bool> {
        let _guard = self.mutex.try_lock()?;
        Some(
            self.count.load(Ordering::SeqCst) == 0
                && self.in_progress.load(Ordering::SeqCst) == 0,
        )
    }

    /// Must be called once each of the `n` tasks a `bulk_dequeue` call
    /// marked in-progress has been fully processed.
    pub fn mark_done(&self, n: usize) {
        self.in_progress.fetch_sub(n as i64, Ordering::SeqCst);
    }
}

fn uninit_slots() -> [MaybeUninit<Task>; QUEUE_CAPACITY] {
    // Safety: an array of `MaybeUninit<T>` has no validity invariant, so
    // this "uninitialized as a whole" value is itself well-defined.
    unsafe { MaybeUninit::uninit().assume_init() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;
    use std::path::Path;

    fn queue() -> TaskQueue {
        // Tests run single-process, so in-place construction on the stack
        // (rather than inside an actual shared mapping) is fine: nothing
        // else observes the address before `init_in_place` returns.
        let mut queue = std::mem::MaybeUninit::<TaskQueue>::uninit();
        unsafe {
            TaskQueue::init_in_place(queue.as_mut_ptr()).unwrap();
            queue.assume_init()
        }
    }

    #[test]
    fn enqueue_then_dequeue_round_trips() {
        let q = queue();
        let task = Task::new(TaskKind::ScanFile, Path::new("/tmp/a.txt")).unwrap();
        q.enqueue(task);

        let mut buf = [Task::EMPTY; BULK_CAP];
        let n = q.bulk_dequeue(&mut buf);
        assert_eq!(n, 1);
        assert_eq!(buf[0].path(), Path::new("/tmp/a.txt"));
        assert_eq!(buf[0].kind, TaskKind::ScanFile);
    }

    #[test]
    fn bulk_dequeue_on_empty_queue_returns_zero() {
        let q = queue();
        let mut buf = [Task::EMPTY; BULK_CAP];
        assert_eq!(q.bulk_dequeue(&mut buf), 0);
    }

    #[test]
    fn quiescent_after_drain_and_completion() {
        let q = queue();
        assert_eq!(q.is_quiescent(), Some(true));

        let task = Task::new(TaskKind::ScanDir, Path::new("/tmp")).unwrap();
        q.enqueue(task);
        assert_eq!(q.is_quiescent(), Some(false));

        let mut buf = [Task::EMPTY; BULK_CAP];
        let n = q.bulk_dequeue(&mut buf);
        assert_eq!(
            q.is_quiescent(),
            Some(false),
            "bulk_dequeue marks the batch in-progress before returning"
        );

        q.mark_done(n);
        assert_eq!(q.is_quiescent(), Some(true));
    }

    #[test]
    fn bulk_dequeue_marks_in_progress_inside_the_same_critical_section() {
        // Regression test: `in_progress` must already reflect the
        // drained batch by the time `bulk_dequeue` returns, not after a
        // separate caller step, or a concurrent `is_quiescent()` could
        // observe a false "count == 0 && in_progress == 0" window.
        let q = queue();
        let task = Task::new(TaskKind::ScanFile, Path::new("/tmp/a.txt")).unwrap();
        q.enqueue(task);

        let mut buf = [Task::EMPTY; BULK_CAP];
        let n = q.bulk_dequeue(&mut buf);
        assert_eq!(n, 1);
        assert_eq!(q.in_progress.load(Ordering::SeqCst), 1);
        assert_eq!(q.is_quiescent(), Some(false));

        q.mark_done(n);
        assert_eq!(q.in_progress.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn bulk_dequeue_respects_bulk_cap() {
        let q = queue();
        for i in 0..(BULK_CAP * 2) {
            let task = Task::new(TaskKind::ScanFile, Path::new(&format!("/tmp/{i}"))).unwrap();
            q.enqueue(task);
        }
        let mut buf = [Task::EMPTY; BULK_CAP];
        let first = q.bulk_dequeue(&mut buf);
        assert_eq!(first, BULK_CAP);
        let second = q.bulk_dequeue(&mut buf);
        assert_eq!(second, BULK_CAP);
    }

    #[test]
    fn count_never_exceeds_capacity_invariant() {
        let q = queue();
        for i in 0..8 {
            let task = Task::new(TaskKind::ScanFile, Path::new(&format!("/tmp/{i}"))).unwrap();
            q.enqueue(task);
        }
        assert_eq!(q.count.load(Ordering::SeqCst), 8);
        assert!(q.count.load(Ordering::SeqCst) as usize <= QUEUE_CAPACITY);
    }
}
