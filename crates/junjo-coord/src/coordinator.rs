//! The coordinator: who gets to act on a path, and when.
//!
//! One [`FileCoordinator`] instance is shared (by `Arc` or reference) across
//! every session. It owns the lock table and waiting map behind a single
//! mutex, decides grant / merge / queue for each request, and wakes queued
//! waiters on release. Whether a granted operation is *well-formed* is the
//! executor's problem; the coordinator only arbitrates access.

use std::collections::hash_map::Entry;
use std::time::{Duration, Instant};

use junjo_types::{ExecResult, FileOperation, LockAcquisitionResult, LockInfo, SessionId};
use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::constants::POLL_INTERVAL;
use crate::events::FileEventBus;
use crate::executor::OperationExecutor;
use crate::lock_table::{CoordState, FileLock, PendingEdit};
use crate::merge;
use crate::path::normalize_path;

/// Arbitrates concurrent file operations across sessions.
pub struct FileCoordinator {
    state: Mutex<CoordState>,
    /// Fired on every release so queued waiters re-check immediately instead
    /// of sleeping out their full poll interval.
    released: Notify,
    executor: OperationExecutor,
    events: FileEventBus,
    poll_interval: Duration,
}

impl FileCoordinator {
    pub fn new() -> Self {
        Self::with_poll_interval(POLL_INTERVAL)
    }

    /// Custom poll interval; tests use a short one to keep timeouts tight.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        let events = FileEventBus::default();
        Self {
            state: Mutex::new(CoordState::default()),
            released: Notify::new(),
            executor: OperationExecutor::new(events.clone()),
            events,
            poll_interval,
        }
    }

    /// The bus carrying file-modified notifications.
    pub fn events(&self) -> &FileEventBus {
        &self.events
    }

    /// The executor for operations granted through [`Self::acquire_lock`].
    pub fn executor(&self) -> &OperationExecutor {
        &self.executor
    }

    /// Request the right to perform `operation`.
    ///
    /// Resolves to `Acquired` (caller holds the lock and should execute then
    /// release), `Merged` (the operation already ran, no lock taken),
    /// `TimedOut`, or — for a zero `timeout` — `Queued` with the caller's
    /// 1-based position.
    #[tracing::instrument(skip(self, operation), fields(path = operation.path(), kind = operation.kind(), session = %session_id))]
    pub async fn acquire_lock(
        &self,
        operation: FileOperation,
        session_id: &SessionId,
        timeout: Duration,
    ) -> LockAcquisitionResult {
        let path = normalize_path(operation.path());
        let operation = operation.with_path(path.clone());

        // Fast path: free, or already ours.
        let (holder_operation, already_queued) = {
            let mut state = self.state.lock();
            match state.locks.entry(path.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(FileLock::new(session_id.clone(), path.clone(), operation));
                    tracing::debug!("lock acquired");
                    return LockAcquisitionResult::Acquired;
                }
                Entry::Occupied(entry) => {
                    let lock = entry.get();
                    if lock.session_id == *session_id {
                        // Re-entrant pass-through.
                        return LockAcquisitionResult::Acquired;
                    }
                    let already_queued = lock
                        .pending_edits
                        .iter()
                        .any(|p| p.session_id == *session_id);
                    (lock.operation.clone(), already_queued)
                }
            }
        };

        // A session with an entry already in the queue is committed to
        // sequencing: merging its retry would execute immediately while the
        // stale entry stays queued, later promoting a holder that will never
        // release. Such retries go straight back to the wait path.
        if !already_queued {
            // Merge analysis reads the disk, so it runs outside the mutex.
            let decision = merge::analyze(&holder_operation, &operation, &path).await;
            if decision.can_merge {
                if let Some(adjusted) = decision.adjusted {
                    tracing::debug!(reason = %decision.reason, "executing merged operation");
                    let result = self.executor.execute(&adjusted).await;
                    return LockAcquisitionResult::Merged {
                        success: result.success,
                        output: result.output,
                    };
                }
            }
            tracing::debug!(reason = %decision.reason, "not mergeable, queueing");
        }

        // Queue up. The table may have changed while we were analyzing, so
        // re-run the same checks before enqueueing.
        let (position, pending_id) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            match state.locks.entry(path.clone()) {
                Entry::Vacant(entry) => {
                    // Freed during analysis: claim it directly.
                    entry.insert(FileLock::new(
                        session_id.clone(),
                        path.clone(),
                        operation.clone(),
                    ));
                    return LockAcquisitionResult::Acquired;
                }
                Entry::Occupied(mut entry) => {
                    let lock = entry.get_mut();
                    if lock.session_id == *session_id {
                        return LockAcquisitionResult::Acquired;
                    }
                    let already = lock
                        .pending_edits
                        .iter()
                        .position(|p| p.session_id == *session_id);
                    match already {
                        // Already queued (e.g. an earlier zero-timeout call):
                        // reuse that entry instead of double-queueing.
                        Some(index) => (index + 1, lock.pending_edits[index].id),
                        None => {
                            let pending = PendingEdit::new(session_id.clone(), operation.clone());
                            let pending_id = pending.id;
                            lock.pending_edits.push_back(pending);
                            state.waiting.insert(session_id.clone(), path.clone());
                            (lock.pending_edits.len(), pending_id)
                        }
                    }
                }
            }
        };

        if timeout.is_zero() {
            return LockAcquisitionResult::Queued { position };
        }

        self.wait_for_promotion(&path, session_id, &operation, pending_id, timeout)
            .await
    }

    /// Poll the table (woken early by releases) until promoted or timed out.
    async fn wait_for_promotion(
        &self,
        path: &str,
        session_id: &SessionId,
        operation: &FileOperation,
        pending_id: Uuid,
        timeout: Duration,
    ) -> LockAcquisitionResult {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let notified = self.released.notified();
            let _ = tokio::time::timeout(remaining.min(self.poll_interval), notified).await;

            let mut guard = self.state.lock();
            let state = &mut *guard;
            let holder_is_caller = state
                .locks
                .get(path)
                .map(|lock| lock.session_id == *session_id);
            match holder_is_caller {
                Some(true) => {
                    state.waiting.remove(session_id);
                    tracing::debug!(path, "promoted from queue");
                    return LockAcquisitionResult::Acquired;
                }
                Some(false) => {}
                None => {
                    // Entry vanished (e.g. holder teardown drained the queue
                    // past us): claim it directly.
                    state.waiting.remove(session_id);
                    state.locks.insert(
                        path.to_string(),
                        FileLock::new(session_id.clone(), path.to_string(), operation.clone()),
                    );
                    return LockAcquisitionResult::Acquired;
                }
            }
        }

        // Deadline passed, but promotion may have slipped in between the last
        // check and now; a final look settles it.
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state
            .locks
            .get(path)
            .is_some_and(|lock| lock.session_id == *session_id)
        {
            state.waiting.remove(session_id);
            return LockAcquisitionResult::Acquired;
        }
        state.remove_pending(path, pending_id);
        state.waiting.remove(session_id);
        tracing::debug!(path, "lock wait timed out");
        LockAcquisitionResult::TimedOut
    }

    /// Release a held lock. No-op if the entry is missing or the caller is
    /// not the holder; release is best-effort cleanup, never an error.
    #[tracing::instrument(skip(self), fields(session = %session_id))]
    pub fn release_lock(&self, path: &str, session_id: &SessionId) {
        let path = normalize_path(path);
        let released = self.state.lock().release(&path, session_id);
        if released {
            tracing::debug!(path, "lock released");
            self.released.notify_waiters();
        }
    }

    /// Session teardown: release every lock the session holds and clear its
    /// waiting entry. Idempotent — a session with no locks is a no-op.
    #[tracing::instrument(skip(self), fields(session = %session_id))]
    pub fn release_all_locks(&self, session_id: &SessionId) {
        let released_any = {
            let mut state = self.state.lock();
            let held = state.held_paths(session_id);
            let released_any = !held.is_empty();
            for path in held {
                state.release(&path, session_id);
            }
            state.waiting.remove(session_id);
            released_any
        };
        if released_any {
            tracing::debug!("released all session locks");
            self.released.notify_waiters();
        }
    }

    /// Acquire, execute, release — the whole arc for one operation.
    ///
    /// `Merged` results pass straight through; `TimedOut` becomes a failure
    /// result naming the current holder.
    pub async fn execute_with_lock(
        &self,
        operation: FileOperation,
        session_id: &SessionId,
        timeout: Duration,
    ) -> ExecResult {
        let path = normalize_path(operation.path());
        match self
            .acquire_lock(operation.clone(), session_id, timeout)
            .await
        {
            LockAcquisitionResult::Acquired => {
                let result = self
                    .executor
                    .execute(&operation.with_path(path.clone()))
                    .await;
                self.release_lock(&path, session_id);
                result
            }
            LockAcquisitionResult::Merged { success, output } => ExecResult { success, output },
            LockAcquisitionResult::Queued { position } => ExecResult::failure(format!(
                "{path} is locked; queued at position {position}"
            )),
            LockAcquisitionResult::TimedOut => {
                let holder = self
                    .lock_holder(&path)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".into());
                ExecResult::failure(format!(
                    "timed out waiting for lock on {path} (held by {holder})"
                ))
            }
        }
    }

    // ========================================================================
    // Status queries (read-only, for contention displays)
    // ========================================================================

    /// Is this session currently waiting on any path?
    pub fn is_waiting(&self, session_id: &SessionId) -> bool {
        self.state.lock().waiting.contains_key(session_id)
    }

    /// The path a session is waiting on, if any.
    pub fn waiting_path(&self, session_id: &SessionId) -> Option<String> {
        self.state.lock().waiting.get(session_id).cloned()
    }

    /// Current holder of a path's lock.
    pub fn lock_holder(&self, path: &str) -> Option<SessionId> {
        let path = normalize_path(path);
        self.state
            .lock()
            .locks
            .get(&path)
            .map(|lock| lock.session_id.clone())
    }

    /// 1-based queue position of a session on a path.
    pub fn queue_position(&self, session_id: &SessionId, path: &str) -> Option<usize> {
        let path = normalize_path(path);
        self.state.lock().queue_position(session_id, &path)
    }

    /// Holder, hold duration, and queue length for a locked path.
    pub fn lock_info(&self, path: &str) -> Option<LockInfo> {
        let path = normalize_path(path);
        self.state.lock().locks.get(&path).map(|lock| LockInfo {
            holder: lock.session_id.clone(),
            held_for: lock.acquired_at.elapsed(),
            queue_len: lock.pending_edits.len(),
        })
    }
}

impl Default for FileCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
