//! Error type for the headless runner.

use std::path::PathBuf;

use squad_core::error::GameError;
use thiserror::Error;

/// Result alias using [`RunnerError`].
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Failures outside the rules engine itself: files, parsing and checks.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse RON: {0}")]
    Ron(#[from] ron::error::SpannedError),
    /// Failed to parse or encode JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The rules engine refused an operation.
    #[error(transparent)]
    Game(#[from] GameError),
    /// A script line could not be parsed.
    #[error("Script line {line}: {message}")]
    Script {
        /// 1-based line number.
        line: usize,
        /// Parser message.
        message: String,
    },
    /// Two runs of the same script ended differently.
    #[error("Run {run} diverged: expected hash {expected:#018x}, got {actual:#018x}")]
    Diverged {
        /// 0-based run index.
        run: usize,
        /// Hash of the first run.
        expected: u64,
        /// Hash of the diverging run.
        actual: u64,
    },
    /// A run produced a different event log than the first one.
    #[error("Run {run} produced a different event log")]
    LogMismatch {
        /// 0-based run index.
        run: usize,
    },
    /// Restoring a saved state did not reproduce it.
    #[error("Snapshot round-trip changed the state hash")]
    SnapshotMismatch,
    /// Re-running a recording did not end on the recorded state.
    #[error("Replay did not reproduce the recorded final state")]
    ReplayMismatch,
}
