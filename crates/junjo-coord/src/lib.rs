//! # junjo-coord
//!
//! The file-operation coordination core: arbitrates concurrent attempts by
//! independent agent sessions to read-modify-write the same files.
//!
//! Every request resolves quickly to one of four outcomes rather than an
//! unbounded block:
//! - **Acquired** — the caller holds the path's lock and may execute
//! - **Merged** — the operation was proven non-conflicting with the current
//!   holder's and was executed immediately, no lock taken
//! - **Queued** — zero-timeout requests report their FIFO position
//! - **TimedOut** — the wait deadline elapsed, all bookkeeping cleaned up
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Agent sessions / tools           │
//! └────────────────────┬────────────────────┘
//!                      │ FileOperation + SessionId
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           FileCoordinator               │
//! │  (lock table + waiting map, one mutex)  │
//! └───────┬──────────────┬──────────────────┘
//!         │ merge check  │ granted / merged
//!         ▼              ▼
//! ┌──────────────┐  ┌──────────────────┐
//! │ MergeAnalyzer │  │ OperationExecutor │──▶ FileEventBus
//! │ (fresh read)  │  │ (tokio::fs)       │    (file-modified)
//! └──────────────┘  └──────────────────┘
//! ```
//!
//! The lock table is purely in-memory and process-lifetime; files are not
//! locked at the OS level, so writers bypassing the coordinator are outside
//! the consistency guarantee.

pub mod constants;
pub mod coordinator;
pub mod events;
pub mod executor;
pub mod lock_table;
pub mod merge;
pub mod path;

pub use coordinator::FileCoordinator;
pub use events::{FileEventBus, FileModified};
pub use executor::{ExecError, OperationExecutor};
pub use lock_table::{FileLock, PendingEdit};
pub use merge::{MergeDecision, analyze};
pub use path::normalize_path;

pub use junjo_types::{
    ExecResult, FileOperation, LockAcquisitionResult, LockInfo, SessionId, WriteMode,
};
