use thiserror::Error;

/// Errors surfaced by the scan pipeline itself, as distinct from errors
/// produced while scanning an individual file (those are counted, not
/// propagated — see `consumer.rs`).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to create the shared memory mapping")]
    Mmap(#[source] std::io::Error),

    #[error("failed to initialize a process-shared synchronization primitive: {0}")]
    Sync(String),

    #[error("fork failed")]
    Fork(#[source] nix::Error),

    #[error("failed to create the watchdog readiness pipe")]
    Pipe(#[source] nix::Error),

    #[error("failed to install a signal handler")]
    Signal(#[source] nix::Error),

    #[error("failed to reap child process {pid}")]
    Reap { pid: i32, source: nix::Error },

    #[error("{0}")]
    InvalidPath(String),

    #[error("path exceeds the {cap}-byte task path capacity: {path}")]
    PathTooLong { path: String, cap: usize },
}
