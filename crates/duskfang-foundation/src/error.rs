//! Shared error types for fallible setup paths.
//!
//! The simulation core never surfaces recoverable runtime errors from
//! `tick()` or any `try_*` action -- preconditions unmet there are silent
//! no-ops. `CoreError` exists only for the handful of
//! genuinely fallible setup operations: snapshot/replay deserialization and
//! duplicate-id construction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("body id {0} already exists")]
    DuplicateBodyId(u32),

    #[error("snapshot is corrupt or from an incompatible version: {0}")]
    InvalidSnapshot(String),

    #[error("replay log is corrupt: {0}")]
    InvalidReplayLog(String),

    #[error("replay diverged at tick {tick}: expected hash {expected:?}, got {actual:?}")]
    ReplayDivergence {
        tick: u64,
        expected: [u8; 32],
        actual: [u8; 32],
    },
}
