//! The single global lifecycle phase shared by every process in the run.

use std::sync::atomic::{AtomicU32, Ordering};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PhaseValue {
    Unfinished = 0,
    ProducerDone = 1,
    AllTasksDone = 2,
    ForceQuit = 3,
}

impl PhaseValue {
    fn from_u32(v: u32) -> Self {
        match v {
            0 => PhaseValue::Unfinished,
            1 => PhaseValue::ProducerDone,
            2 => PhaseValue::AllTasksDone,
            _ => PhaseValue::ForceQuit,
        }
    }
}

/// Monotone lifecycle state, `repr(C)` so it can live inline in the shared
/// mapping. Every reader uses acquire semantics; every writer uses
/// sequentially consistent stores so that phase observations agree with
/// queue-emptiness observations across processes.
#[repr(C)]
pub struct Phase(AtomicU32);

impl Phase {
    pub fn new() -> Self {
        Self(AtomicU32::new(PhaseValue::Unfinished as u32))
    }

    pub fn load(&self) -> PhaseValue {
        PhaseValue::from_u32(self.0.load(Ordering::Acquire))
    }

    /// Stores `v` only if it is strictly greater than the current value.
    /// A no-op if the phase is already at or beyond `v`.
    pub fn store_if_greater(&self, v: PhaseValue) {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current >= v as u32 {
                return;
            }
            match self.0.compare_exchange_weak(
                current,
                v as u32,
                Ordering::SeqCst,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Forces the phase to `ForceQuit` unconditionally. The only
    /// transition allowed to skip the monotone ordering above.
    ///
    /// A plain atomic store, so it is safe to call from an
    /// async-signal-safe handler.
    pub fn force_quit(&self) {
        self.0.store(PhaseValue::ForceQuit as u32, Ordering::SeqCst);
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unfinished() {
        assert_eq!(Phase::new().load(), PhaseValue::Unfinished);
    }

    #[test]
    fn monotone_store_never_regresses() {
        let phase = Phase::new();
        phase.store_if_greater(PhaseValue::AllTasksDone);
        phase.store_if_greater(PhaseValue::ProducerDone);
        assert_eq!(phase.load(), PhaseValue::AllTasksDone);
    }

    #[test]
    fn force_quit_overrides_from_any_state() {
        let phase = Phase::new();
        phase.force_quit();
        assert_eq!(phase.load(), PhaseValue::ForceQuit);

        let phase = Phase::new();
        phase.store_if_greater(PhaseValue::ProducerDone);
        phase.force_quit();
        assert_eq!(phase.load(), PhaseValue::ForceQuit);
    }

    #[test]
    fn load_after_store_is_at_least_v() {
        let phase = Phase::new();
        phase.store_if_greater(PhaseValue::ProducerDone);
        assert!(phase.load() >= PhaseValue::ProducerDone);
    }
}
