//! Process-shared synchronization primitives.
//!
//! Rust's standard `Mutex`/`Condvar` make no guarantee about working across
//! a `fork`-ed address space, so the queue's mutex and counting semaphores
//! are thin wrappers over the POSIX primitives built for exactly this: a
//! `pthread_mutex_t` with `PTHREAD_PROCESS_SHARED` and an unnamed `sem_t`
//! initialized with `pshared = 1`.

pub mod mutex;
pub mod sem;

pub use mutex::PsharedMutex;
pub use sem::PsharedSemaphore;
