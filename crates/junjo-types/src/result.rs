//! Result types returned by the coordinator and executor.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Outcome of executing one file operation.
///
/// The output string is intended for direct display to a user or model; on
/// failure it carries the diagnostic text (missing text preview, line counts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable result or diagnostic text.
    pub output: String,
}

impl ExecResult {
    /// Create a successful result.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    /// Create a failure result.
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// What `acquire_lock` resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LockAcquisitionResult {
    /// Caller now holds the lock (or already held it).
    Acquired,
    /// The operation was proven non-conflicting with the holder's and was
    /// executed immediately; the caller never took the lock.
    Merged { success: bool, output: String },
    /// Zero-timeout request: caller was enqueued at this 1-based position.
    Queued { position: usize },
    /// The wait deadline elapsed; the caller's queue entry was removed.
    TimedOut,
}

impl LockAcquisitionResult {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired)
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, Self::Merged { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Contention snapshot for one locked path, for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    /// Session currently holding the lock.
    pub holder: SessionId,
    /// How long the holder has had it.
    pub held_for: Duration,
    /// Number of sessions queued behind the holder.
    pub queue_len: usize,
}
