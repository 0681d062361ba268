//! # vigil-core
//!
//! The multi-process scan pipeline: a bounded shared-memory task queue,
//! a producer/consumer process pool, the lifecycle phase that coordinates
//! termination, and the watchdogs that reap each pool. The anti-virus
//! signature engine itself is an external collaborator — this crate only
//! defines the [`engine::ScanEngine`] seam and ships a deterministic
//! stand-in for tests (see `engine.rs`).

pub mod config;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod observer;
pub mod phase;
pub mod producer;
pub mod queue;
pub mod region;
pub mod result;
pub mod signals;
pub mod spawner;
pub mod supervisor;
pub mod sync;
pub mod task;
pub mod watchdog;
pub mod worker;

pub use engine::{EngineError, ScanEngine, ScanVerdict, StubEngine};
pub use error::CoreError;
pub use result::ResultSnapshot;
pub use supervisor::{RunOptions, RunOutcome};
