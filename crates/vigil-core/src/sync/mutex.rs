use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

use crate::error::CoreError;

/// A `pthread_mutex_t` configured with `PTHREAD_PROCESS_SHARED`, for
/// mutual exclusion among processes that all mapped the same anonymous
/// shared region.
///
/// Must be constructed with [`PsharedMutex::init_in_place`] directly at
/// its final address inside the shared mapping — never built on the stack
/// and moved, since process-shared mutexes and the mapping they live in
/// are expected to stay put for the duration of the run.
#[repr(C)]
pub struct PsharedMutex {
    raw: UnsafeCell<libc::pthread_mutex_t>,
}

unsafe impl Send for PsharedMutex {}
unsafe impl Sync for PsharedMutex {}

impl PsharedMutex {
    /// # Safety
    /// `this` must point at valid, writable memory for a `PsharedMutex`
    /// that no other process can yet observe, and must never move or be
    /// deallocated before [`Drop`] runs.
    pub unsafe fn init_in_place(this: *mut Self) -> Result<(), CoreError> {
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        cvt(libc::pthread_mutexattr_init(attr.as_mut_ptr()))?;
        let mut attr = attr.assume_init();
        cvt(libc::pthread_mutexattr_setpshared(
            &mut attr,
            libc::PTHREAD_PROCESS_SHARED,
        ))?;

        let raw_ptr = (*this).raw.get();
        let rc = libc::pthread_mutex_init(raw_ptr, &attr);
        libc::pthread_mutexattr_destroy(&mut attr);
        cvt(rc)
    }

    pub fn lock(&self) -> MutexGuard<'_> {
        let rc = unsafe { libc::pthread_mutex_lock(self.raw.get()) };
        debug_assert_eq!(rc, 0, "pthread_mutex_lock failed with errno {rc}");
        MutexGuard { mutex: self }
    }

    /// Non-blocking. Returns `None` immediately if the mutex is held by
    /// another process rather than waiting for it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_>> {
        let rc = unsafe { libc::pthread_mutex_trylock(self.raw.get()) };
        if rc == 0 {
            Some(MutexGuard { mutex: self })
        } else {
            None
        }
    }
}

impl Drop for PsharedMutex {
    fn drop(&mut self) {
        // Only the supervisor ever runs this (children terminate via
        // `std::process::exit`, which skips destructors for exactly this
        // reason — see `spawner.rs`).
        unsafe {
            libc::pthread_mutex_destroy(self.raw.get());
        }
    }
}

pub struct MutexGuard<'a> {
    mutex: &'a PsharedMutex,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        let rc = unsafe { libc::pthread_mutex_unlock(self.mutex.raw.get()) };
        debug_assert_eq!(rc, 0, "pthread_mutex_unlock failed with errno {rc}");
    }
}

fn cvt(rc: libc::c_int) -> Result<(), CoreError> {
    if rc == 0 {
        Ok(())
    } else {
        Err(CoreError::Sync(format!(
            "pthread call failed with errno {rc}"
        )))
    }
}
