//! The single anonymous, process-shared memory mapping that holds every
//! piece of cross-process state (§3, §6): the lifecycle phase, both task
//! queues, the result counters, and the (read-only, post-construction)
//! scan engine.

use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};

use crate::engine::ScanEngine;
use crate::error::CoreError;
use crate::phase::Phase;
use crate::queue::TaskQueue;
use crate::result::ScanResult;

/// Layout mirrors §6: phase, both queues, result counters, engine state.
///
/// The per-pool [`crate::observer::Observer`] (child pids, shutdown
/// signal, readiness pipe) deliberately does *not* live here. Per §4.3
/// its child-identifier bookkeeping is allowed to live in the
/// supervisor's private memory, since no child ever reads it back, and
/// its pipe file descriptors cross into children through ordinary
/// `fork` fd inheritance rather than through shared memory. See
/// DESIGN.md for the full decision record.
#[repr(C)]
pub struct SharedRegion<E> {
    pub phase: Phase,
    pub dir_queue: TaskQueue,
    pub file_queue: TaskQueue,
    pub result: ScanResult,
    pub engine: E,
}

// Safety: every field is either a process-shared synchronization
// primitive or plain atomics, except `engine`, which the caller already
// bounds by `E: Send + Sync` at construction (§10.5).
unsafe impl<E: Send> Send for SharedRegion<E> {}
unsafe impl<E: Sync> Sync for SharedRegion<E> {}

impl<E> SharedRegion<E> {
    /// # Safety
    /// `this` must point at freshly mapped, unobserved memory large
    /// enough for a `SharedRegion<E>`; must be called exactly once per
    /// mapping, before any other process can see `this`.
    unsafe fn init_in_place(this: *mut Self, engine: E) -> Result<(), CoreError> {
        TaskQueue::init_in_place(std::ptr::addr_of_mut!((*this).dir_queue))?;
        TaskQueue::init_in_place(std::ptr::addr_of_mut!((*this).file_queue))?;
        std::ptr::addr_of_mut!((*this).phase).write(Phase::new());
        std::ptr::addr_of_mut!((*this).result).write(ScanResult::new());
        std::ptr::addr_of_mut!((*this).engine).write(engine);
        Ok(())
    }
}

/// Owns the mapping's lifetime. Only the supervisor constructs and
/// drops this; children inherit the mapping via `fork` and must never
/// map, unmap, or drop their copy — they exit through
/// `std::process::exit`, which skips destructors for exactly this
/// reason (see [`crate::spawner::spawn_pool`]).
pub struct SharedMapping<E> {
    ptr: NonNull<SharedRegion<E>>,
    len: usize,
    _marker: PhantomData<E>,
}

unsafe impl<E: Send> Send for SharedMapping<E> {}
unsafe impl<E: Sync> Sync for SharedMapping<E> {}

impl<E: ScanEngine> SharedMapping<E> {
    /// Creates the mapping and constructs `engine` in place inside it.
    pub fn new(engine: E) -> Result<Self, CoreError> {
        let len = std::mem::size_of::<SharedRegion<E>>();
        let length = NonZeroUsize::new(len).expect("SharedRegion is never zero-sized");

        let ptr = unsafe {
            mmap_anonymous(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )
        }
        .map_err(|e| CoreError::Mmap(std::io::Error::from_raw_os_error(e as i32)))?;

        let region_ptr = ptr.as_ptr() as *mut SharedRegion<E>;
        unsafe {
            SharedRegion::init_in_place(region_ptr, engine)?;
        }

        Ok(Self {
            ptr: NonNull::new(region_ptr).expect("mmap never returns null on success"),
            len,
            _marker: PhantomData,
        })
    }

    pub fn get(&self) -> &SharedRegion<E> {
        // Safety: the mapping lives for `self`'s lifetime and every
        // field was initialized by `new`.
        unsafe { self.ptr.as_ref() }
    }
}

impl<E> Drop for SharedMapping<E> {
    fn drop(&mut self) {
        // Safety: only the supervisor ever drops a `SharedMapping`
        // (children terminate via `std::process::exit`, bypassing
        // `Drop` entirely), and it does so once, after both watchdogs
        // have reaped every child that could still observe the mapping.
        unsafe {
            let _ = munmap(self.ptr.cast(), self.len);
        }
    }
}
