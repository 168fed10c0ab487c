//! # junjo-types
//!
//! Shared types for the junjo file-operation coordinator.
//!
//! These are the wire-level building blocks: the [`FileOperation`] sum type
//! describing a requested mutation, the [`SessionId`] identifying which agent
//! session asked for it, and the result types handed back by the coordinator
//! and executor. No I/O happens in this crate.

pub mod operation;
pub mod result;
pub mod session;

pub use operation::{FileOperation, WriteMode};
pub use result::{ExecResult, LockAcquisitionResult, LockInfo};
pub use session::SessionId;
