//! End-to-end contention scenarios: multiple sessions, one coordinator.

use std::sync::Arc;
use std::time::Duration;

use junjo_coord::{
    FileCoordinator, FileOperation, LockAcquisitionResult, SessionId, WriteMode,
};

fn sid(s: &str) -> SessionId {
    SessionId::from(s)
}

fn edit(path: &str, old: &str, new: &str) -> FileOperation {
    FileOperation::Edit {
        path: path.into(),
        old_text: old.into(),
        new_text: new.into(),
        replace_all: false,
    }
}

fn temp_file(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

/// Two edits on disjoint text ranges run concurrently: the second merges and
/// executes immediately, never entering the wait queue.
#[tokio::test(flavor = "multi_thread")]
async fn disjoint_edits_merge_without_queueing() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(&dir, "f.txt", "foo\nbar\nbaz");
    let coord = FileCoordinator::new();
    let mut events = coord.events().subscribe();

    let a = coord
        .acquire_lock(edit(&path, "foo", "FOO"), &sid("a"), Duration::from_secs(1))
        .await;
    assert!(a.is_acquired());

    let b = coord
        .acquire_lock(edit(&path, "baz", "BAZ"), &sid("b"), Duration::from_secs(1))
        .await;
    match b {
        LockAcquisitionResult::Merged { success, .. } => assert!(success),
        other => panic!("expected merge, got {other:?}"),
    }

    // B's edit landed while A still holds the lock; A's has not run yet.
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "foo\nbar\nBAZ");
    assert!(!coord.is_waiting(&sid("b")));
    assert_eq!(coord.lock_info(&path).unwrap().queue_len, 0);
    assert!(events.try_recv().is_ok());
}

/// Edits whose targets overlap never both run: the second queues.
#[tokio::test(flavor = "multi_thread")]
async fn overlapping_edits_queue() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(&dir, "f.txt", "foo bar baz");
    let coord = FileCoordinator::new();

    coord
        .acquire_lock(
            edit(&path, "foo bar", "X"),
            &sid("a"),
            Duration::from_secs(1),
        )
        .await;

    let b = coord
        .acquire_lock(edit(&path, "bar baz", "Y"), &sid("b"), Duration::ZERO)
        .await;
    assert_eq!(b, LockAcquisitionResult::Queued { position: 1 });
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "foo bar baz");
}

/// Overwrite is exclusive: a concurrent edit queues, and once promoted it
/// runs against the just-written content.
#[tokio::test(flavor = "multi_thread")]
async fn overwrite_excludes_concurrent_edit() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(&dir, "f.txt", "stale\n");
    let coord = Arc::new(FileCoordinator::with_poll_interval(Duration::from_millis(5)));

    let overwrite = FileOperation::Write {
        path: path.clone(),
        content: "fresh\ntarget\n".into(),
        mode: WriteMode::Overwrite,
    };
    let a = coord
        .acquire_lock(overwrite.clone(), &sid("a"), Duration::from_secs(1))
        .await;
    assert!(a.is_acquired());

    let b_coord = coord.clone();
    let b_path = path.clone();
    let b_task = tokio::spawn(async move {
        b_coord
            .execute_with_lock(
                edit(&b_path, "target", "TARGET"),
                &sid("b"),
                Duration::from_secs(2),
            )
            .await
    });

    // Give B time to fail the merge check and queue.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(coord.is_waiting(&sid("b")));
    assert_eq!(coord.lock_holder(&path), Some(sid("a")));

    // A performs its overwrite and releases; B is promoted FIFO.
    let result = coord.executor().execute(&overwrite).await;
    assert!(result.success);
    coord.release_lock(&path, &sid("a"));

    let b_result = b_task.await.unwrap();
    assert!(b_result.success, "B failed: {}", b_result.output);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "fresh\nTARGET\n"
    );
    assert_eq!(coord.lock_holder(&path), None);
}

/// Sessions queued B, C, D behind A are promoted in exactly that order.
#[tokio::test(flavor = "multi_thread")]
async fn promotion_is_fifo() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(&dir, "f.txt", "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n");
    let coord = FileCoordinator::new();

    let insert = |line: usize| FileOperation::InsertLines {
        path: path.clone(),
        line_number: line,
        content: "X".into(),
    };

    assert!(
        coord
            .acquire_lock(insert(5), &sid("a"), Duration::from_secs(1))
            .await
            .is_acquired()
    );

    // Adjacent inserts cannot merge, so each zero-timeout call enqueues.
    for (session, expected_position) in [("b", 1), ("c", 2), ("d", 3)] {
        let result = coord
            .acquire_lock(insert(5), &sid(session), Duration::ZERO)
            .await;
        assert_eq!(
            result,
            LockAcquisitionResult::Queued {
                position: expected_position
            }
        );
    }

    coord.release_lock(&path, &sid("a"));
    assert_eq!(coord.lock_holder(&path), Some(sid("b")));
    assert_eq!(coord.queue_position(&sid("c"), &path), Some(1));
    assert_eq!(coord.queue_position(&sid("d"), &path), Some(2));

    coord.release_lock(&path, &sid("b"));
    assert_eq!(coord.lock_holder(&path), Some(sid("c")));

    coord.release_lock(&path, &sid("c"));
    assert_eq!(coord.lock_holder(&path), Some(sid("d")));

    coord.release_lock(&path, &sid("d"));
    assert_eq!(coord.lock_holder(&path), None);
}

/// A session that already queued stays on the sequencing path when it
/// retries, even if the file has since changed in a way that would let the
/// retry merge. Merging a queued session would strand its queue entry, and
/// on release that entry would promote a holder that never releases.
#[tokio::test(flavor = "multi_thread")]
async fn queued_retry_stays_queued_instead_of_merging() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(&dir, "f.txt", "foo bar baz");
    let coord = FileCoordinator::new();

    coord
        .acquire_lock(edit(&path, "foo bar", "X"), &sid("a"), Duration::from_secs(1))
        .await;

    // Overlapping targets: B queues.
    let b = coord
        .acquire_lock(edit(&path, "bar baz", "Y"), &sid("b"), Duration::ZERO)
        .await;
    assert_eq!(b, LockAcquisitionResult::Queued { position: 1 });

    // The file changes underneath; B's target is now disjoint from A's, so a
    // fresh arrival could merge — but B is already committed to the queue.
    std::fs::write(&path, "foo bar and bar baz").unwrap();
    let retry = coord
        .acquire_lock(edit(&path, "bar baz", "Y"), &sid("b"), Duration::ZERO)
        .await;
    assert_eq!(retry, LockAcquisitionResult::Queued { position: 1 });
    assert_eq!(coord.lock_info(&path).unwrap().queue_len, 1);

    // FIFO promotion still works and the path drains cleanly.
    coord.release_lock(&path, &sid("a"));
    assert_eq!(coord.lock_holder(&path), Some(sid("b")));
    coord.release_lock(&path, &sid("b"));
    assert_eq!(coord.lock_holder(&path), None);
}

/// A waiter that queued earlier with zero timeout can come back with a real
/// timeout and ride its existing queue entry to promotion.
#[tokio::test(flavor = "multi_thread")]
async fn queued_session_waits_through_to_acquisition() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(&dir, "f.txt", "hello\n");
    let coord = Arc::new(FileCoordinator::with_poll_interval(Duration::from_millis(5)));

    let overwrite = FileOperation::Write {
        path: path.clone(),
        content: "v2\n".into(),
        mode: WriteMode::Overwrite,
    };
    coord
        .acquire_lock(overwrite, &sid("a"), Duration::from_secs(1))
        .await;

    let queued = coord
        .acquire_lock(edit(&path, "v2", "v3"), &sid("b"), Duration::ZERO)
        .await;
    assert_eq!(queued, LockAcquisitionResult::Queued { position: 1 });

    let b_coord = coord.clone();
    let b_path = path.clone();
    let b_task = tokio::spawn(async move {
        b_coord
            .acquire_lock(edit(&b_path, "v2", "v3"), &sid("b"), Duration::from_secs(2))
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    // Still one queue entry: the blocking call reused the zero-timeout one.
    assert_eq!(coord.lock_info(&path).unwrap().queue_len, 1);

    coord.release_lock(&path, &sid("a"));
    assert!(b_task.await.unwrap().is_acquired());
    assert_eq!(coord.lock_holder(&path), Some(sid("b")));
    assert!(!coord.is_waiting(&sid("b")));
}

/// At most one session holds a path at any instant, across many contenders.
#[tokio::test(flavor = "multi_thread")]
async fn mutual_exclusion_under_contention() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(&dir, "f.txt", "seed\n");
    let coord = Arc::new(FileCoordinator::with_poll_interval(Duration::from_millis(2)));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let coord = coord.clone();
        let path = path.clone();
        tasks.push(tokio::spawn(async move {
            let session = SessionId::new(format!("s{i}"));
            let op = FileOperation::Write {
                path: path.clone(),
                content: format!("line from s{i}\n"),
                mode: WriteMode::Append,
            };
            let result = coord
                .execute_with_lock(op, &session, Duration::from_secs(5))
                .await;
            assert!(result.success, "s{i} failed: {}", result.output);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Every appender got through exactly once and the table drained.
    let content = std::fs::read_to_string(&path).unwrap();
    for i in 0..8 {
        assert_eq!(
            content.matches(&format!("line from s{i}\n")).count(),
            1,
            "content was: {content}"
        );
    }
    assert_eq!(coord.lock_holder(&path), None);
}

/// Tearing down the holder's session unblocks the queue.
#[tokio::test(flavor = "multi_thread")]
async fn release_all_unblocks_waiters() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(&dir, "f.txt", "hello\n");
    let coord = Arc::new(FileCoordinator::with_poll_interval(Duration::from_millis(5)));

    coord
        .acquire_lock(
            FileOperation::Write {
                path: path.clone(),
                content: "x".into(),
                mode: WriteMode::Overwrite,
            },
            &sid("a"),
            Duration::from_secs(1),
        )
        .await;

    let b_coord = coord.clone();
    let b_path = path.clone();
    let b_task = tokio::spawn(async move {
        b_coord
            .acquire_lock(
                edit(&b_path, "hello", "goodbye"),
                &sid("b"),
                Duration::from_secs(2),
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    // A's parent task is cancelled.
    coord.release_all_locks(&sid("a"));

    assert!(b_task.await.unwrap().is_acquired());
    assert_eq!(coord.lock_holder(&path), Some(sid("b")));
}
