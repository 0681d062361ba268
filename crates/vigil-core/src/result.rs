//! Atomic scan-result counters. Lives inline in the shared region;
//! written only by consumers, read by the supervisor at teardown.

use std::sync::atomic::{AtomicU64, Ordering};

#[repr(C)]
pub struct ScanResult {
    files_scanned: AtomicU64,
    infections_found: AtomicU64,
    errors: AtomicU64,
}

impl ScanResult {
    pub fn new() -> Self {
        Self {
            files_scanned: AtomicU64::new(0),
            infections_found: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// A clean file counts toward `files_scanned` only.
    pub fn record_clean(&self) {
        self.files_scanned.fetch_add(1, Ordering::SeqCst);
    }

    /// An infection counts toward both `files_scanned` and
    /// `infections_found` (§4.5).
    pub fn record_infected(&self) {
        self.files_scanned.fetch_add(1, Ordering::SeqCst);
        self.infections_found.fetch_add(1, Ordering::SeqCst);
    }

    /// An open or engine error counts toward `errors` only; per §4.5 /
    /// §9 this is deliberately *not* added to `files_scanned`.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ResultSnapshot {
        ResultSnapshot {
            files_scanned: self.files_scanned.load(Ordering::SeqCst),
            infections_found: self.infections_found.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
        }
    }
}

impl Default for ScanResult {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time read of [`ScanResult`], safe to move across the
/// process boundary since it no longer refers into the shared mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultSnapshot {
    pub files_scanned: u64,
    pub infections_found: u64,
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_increments_only_scanned() {
        let result = ScanResult::new();
        result.record_clean();
        let snap = result.snapshot();
        assert_eq!(snap.files_scanned, 1);
        assert_eq!(snap.infections_found, 0);
        assert_eq!(snap.errors, 0);
    }

    #[test]
    fn infected_increments_scanned_and_infections() {
        let result = ScanResult::new();
        result.record_infected();
        let snap = result.snapshot();
        assert_eq!(snap.files_scanned, 1);
        assert_eq!(snap.infections_found, 1);
    }

    #[test]
    fn error_does_not_increment_scanned() {
        let result = ScanResult::new();
        result.record_error();
        let snap = result.snapshot();
        assert_eq!(snap.files_scanned, 0);
        assert_eq!(snap.errors, 1);
    }
}
