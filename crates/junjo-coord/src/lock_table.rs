//! In-memory lock table and waiting map.
//!
//! [`CoordState`] is the coordinator's entire shared mutable state. It lives
//! behind a single `parking_lot::Mutex` so that every check-then-set sequence
//! ("no entry exists → insert entry", "holder matches → promote") is atomic
//! with respect to other callers. Nothing outside the coordinator touches it.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use junjo_types::{FileOperation, SessionId};
use uuid::Uuid;

/// A queued request waiting for the current holder to release the lock.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    /// Identity of this queue entry (used for timeout removal).
    pub id: Uuid,
    /// Session that queued it.
    pub session_id: SessionId,
    /// The operation it wants to run once promoted.
    pub operation: FileOperation,
    /// When it entered the queue.
    pub queued_at: Instant,
}

impl PendingEdit {
    pub fn new(session_id: SessionId, operation: FileOperation) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            operation,
            queued_at: Instant::now(),
        }
    }
}

/// The lock on one path, owned by exactly one session at a time.
#[derive(Debug, Clone)]
pub struct FileLock {
    /// Current holder.
    pub session_id: SessionId,
    /// Normalized absolute path.
    pub path: String,
    /// When the current holder acquired it.
    pub acquired_at: Instant,
    /// The operation that acquired the lock. Informational: merge analysis
    /// runs new arrivals against it.
    pub operation: FileOperation,
    /// FIFO wait queue.
    pub pending_edits: VecDeque<PendingEdit>,
}

impl FileLock {
    pub fn new(session_id: SessionId, path: String, operation: FileOperation) -> Self {
        Self {
            session_id,
            path,
            acquired_at: Instant::now(),
            operation,
            pending_edits: VecDeque::new(),
        }
    }
}

/// Lock table plus the "which path is each session waiting on" map.
///
/// A path is present in `locks` iff it is currently held; the entry is
/// removed the instant its holder releases with an empty queue.
#[derive(Debug, Default)]
pub(crate) struct CoordState {
    pub(crate) locks: HashMap<String, FileLock>,
    pub(crate) waiting: HashMap<SessionId, String>,
}

impl CoordState {
    /// 1-based queue position of a session on a path, if it is queued there.
    pub(crate) fn queue_position(&self, session_id: &SessionId, path: &str) -> Option<usize> {
        let lock = self.locks.get(path)?;
        lock.pending_edits
            .iter()
            .position(|p| p.session_id == *session_id)
            .map(|i| i + 1)
    }

    /// Release a lock held by `session_id`.
    ///
    /// No-op unless the entry exists and the holder matches — a session can
    /// never release a lock it does not hold. On release the head of the
    /// queue (if any) becomes the new holder with the remaining queue intact;
    /// otherwise the entry is removed. Returns whether anything changed.
    pub(crate) fn release(&mut self, path: &str, session_id: &SessionId) -> bool {
        match self.locks.remove(path) {
            Some(lock) if lock.session_id == *session_id => {
                let mut remaining = lock.pending_edits;
                if let Some(next) = remaining.pop_front() {
                    self.waiting.remove(&next.session_id);
                    self.locks.insert(
                        path.to_string(),
                        FileLock {
                            session_id: next.session_id,
                            path: path.to_string(),
                            acquired_at: Instant::now(),
                            operation: next.operation,
                            pending_edits: remaining,
                        },
                    );
                }
                true
            }
            Some(lock) => {
                // Holder mismatch: put it back untouched.
                self.locks.insert(path.to_string(), lock);
                false
            }
            None => false,
        }
    }

    /// Drop a specific pending entry (timeout cleanup).
    pub(crate) fn remove_pending(&mut self, path: &str, pending_id: Uuid) {
        if let Some(lock) = self.locks.get_mut(path) {
            lock.pending_edits.retain(|p| p.id != pending_id);
        }
    }

    /// Paths currently held by a session.
    pub(crate) fn held_paths(&self, session_id: &SessionId) -> Vec<String> {
        self.locks
            .iter()
            .filter(|(_, lock)| lock.session_id == *session_id)
            .map(|(path, _)| path.clone())
            .collect()
    }
}
