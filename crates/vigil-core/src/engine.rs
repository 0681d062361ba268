//! The scan-engine trait boundary (§10.5).
//!
//! The real anti-virus signature engine is an external collaborator and
//! out of scope for this crate (§1). This module defines the seam
//! consumers call through — [`ScanEngine`] — plus [`StubEngine`], a
//! deterministic stand-in used by tests and by environments with no real
//! signature database configured. `StubEngine` is test/dev tooling, not
//! a production detection engine.

use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Classification produced by a single scan (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Clean,
    Infected { name: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load signatures from {path}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open file descriptor for scanning")]
    Open(#[source] nix::Error),

    #[error("{0}")]
    Scan(String),
}

impl From<nix::Error> for EngineError {
    fn from(e: nix::Error) -> Self {
        EngineError::Open(e)
    }
}

/// The anti-virus signature engine seam. Construction requires a
/// signature-database directory and produces a handle; a scan takes an
/// already-open file descriptor and classifies it (§6).
///
/// Per §10.5, the supervisor is generic over `E: ScanEngine + Send +
/// Sync`, constructs one instance before any pool is spawned, and places
/// it in the shared region. Consumers read it only; it is never mutated
/// after construction.
pub trait ScanEngine: Sized {
    fn load(signature_dir: &Path) -> Result<Self, EngineError>;
    fn scan(&self, fd: BorrowedFd<'_>) -> Result<ScanVerdict, EngineError>;
}

/// The antivirus industry's standard harmless test string. Any engine
/// implementation, real or stand-in, is expected to flag a file
/// containing it.
const EICAR_TEST_STRING: &str =
    "X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// A deterministic stand-in engine: flags the EICAR test string as
/// infected, everything else as clean. Ships so the pipeline, its unit
/// tests, and the end-to-end scenarios in §8 run without a real
/// signature database. Its cross-process sharing is sound only because
/// it is plain, immutable data set once by the supervisor before any
/// fork — a real engine binding unable to tolerate shared read-only use
/// must switch to per-consumer construction instead (§9).
#[derive(Debug)]
pub struct StubEngine {
    signature_dir: PathBuf,
}

impl ScanEngine for StubEngine {
    fn load(signature_dir: &Path) -> Result<Self, EngineError> {
        Ok(Self {
            signature_dir: signature_dir.to_path_buf(),
        })
    }

    fn scan(&self, fd: BorrowedFd<'_>) -> Result<ScanVerdict, EngineError> {
        // A signature engine caps how much of a file it inspects; EICAR
        // is always well within the first few kilobytes.
        let mut buf = [0u8; 4096];
        let raw = fd.as_raw_fd();
        let n = loop {
            let r = unsafe { libc::read(raw, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if r >= 0 {
                break r as usize;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(EngineError::Scan(err.to_string()));
            }
        };

        let contents = String::from_utf8_lossy(&buf[..n]);
        if contents.contains(EICAR_TEST_STRING) {
            Ok(ScanVerdict::Infected {
                name: "Eicar-Test-Signature".to_string(),
            })
        } else {
            Ok(ScanVerdict::Clean)
        }
    }
}
