use std::cell::UnsafeCell;
use std::io;

use crate::error::CoreError;

/// An unnamed POSIX counting semaphore initialized with `pshared = 1`, so
/// it can be waited on and posted from any process that mapped the shared
/// region it lives in.
#[repr(C)]
pub struct PsharedSemaphore {
    raw: UnsafeCell<libc::sem_t>,
}

unsafe impl Send for PsharedSemaphore {}
unsafe impl Sync for PsharedSemaphore {}

impl PsharedSemaphore {
    /// # Safety
    /// Same contract as [`crate::sync::mutex::PsharedMutex::init_in_place`]:
    /// initialize exactly once, in place, before any other process can see
    /// `this`.
    pub unsafe fn init_in_place(this: *mut Self, initial: u32) -> Result<(), CoreError> {
        let raw_ptr = (*this).raw.get();
        let rc = libc::sem_init(raw_ptr, 1, initial);
        if rc != 0 {
            return Err(CoreError::Sync(format!(
                "sem_init failed: {}",
                io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Blocks until a token is available. Retries transparently on `EINTR`
    /// so a pool shutdown signal arriving while a producer blocks on a
    /// full directory queue doesn't wedge the semaphore in an inconsistent
    /// state; the worker's next loop-top phase check is what actually
    /// ends the loop.
    pub fn wait(&self) {
        loop {
            let rc = unsafe { libc::sem_wait(self.raw.get()) };
            if rc == 0 {
                return;
            }
            if io::Error::last_os_error().kind() != io::ErrorKind::Interrupted {
                debug_assert!(false, "sem_wait failed unexpectedly");
                return;
            }
        }
    }

    /// Non-blocking. `true` if a token was acquired.
    pub fn try_wait(&self) -> bool {
        unsafe { libc::sem_trywait(self.raw.get()) == 0 }
    }

    pub fn post(&self) {
        let rc = unsafe { libc::sem_post(self.raw.get()) };
        debug_assert_eq!(rc, 0, "sem_post failed");
    }
}

impl Drop for PsharedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_destroy(self.raw.get());
        }
    }
}
