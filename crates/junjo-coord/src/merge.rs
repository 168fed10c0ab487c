//! Merge analysis: can a second operation run alongside the lock holder's?
//!
//! The analyzer is consulted when a session requests a path that a different
//! session already holds. If it can prove the two operations cannot conflict,
//! the incoming one (adjusted for the holder's pending effect where needed)
//! executes immediately and the caller never takes the lock.
//!
//! One deliberate side effect: the file's **current on-disk content** is
//! re-read on every call. Correctness depends on the true state at decision
//! time, never a cached snapshot. If the file is unreadable (including
//! deleted since the holder acquired the lock), analysis fails closed and the
//! caller queues. Safe to call without holding the coordinator mutex.

use junjo_types::FileOperation;

/// Outcome of analyzing an incoming operation against the holder's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDecision {
    /// Whether the incoming operation may execute immediately.
    pub can_merge: bool,
    /// Human-readable explanation, for logs and contention displays.
    pub reason: String,
    /// The (possibly offset-adjusted) operation to execute when mergeable.
    pub adjusted: Option<FileOperation>,
}

impl MergeDecision {
    fn merge(reason: impl Into<String>, adjusted: FileOperation) -> Self {
        Self {
            can_merge: true,
            reason: reason.into(),
            adjusted: Some(adjusted),
        }
    }

    fn no_merge(reason: impl Into<String>) -> Self {
        Self {
            can_merge: false,
            reason: reason.into(),
            adjusted: None,
        }
    }
}

/// A character-offset or line-number span. Transient to analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EditRange {
    start: usize,
    end: usize,
}

impl EditRange {
    /// True unless one range ends strictly before the other begins.
    fn overlaps(&self, other: &EditRange) -> bool {
        !(self.end < other.start || other.end < self.start)
    }

    fn lines(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    fn text(start: usize, len: usize) -> Self {
        Self {
            start,
            end: start + len,
        }
    }
}

/// Decide whether `incoming` can safely execute while `existing` holds the
/// lock on `path`, and compute the adjusted form of `incoming` if so.
pub async fn analyze(
    existing: &FileOperation,
    incoming: &FileOperation,
    path: &str,
) -> MergeDecision {
    if existing.requires_exclusive() || incoming.requires_exclusive() {
        return MergeDecision::no_merge("overwrite requires exclusive access");
    }

    // Fresh read of the current on-disk state; fails closed when unreadable.
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            return MergeDecision::no_merge(format!("cannot read current content of {path}: {e}"));
        }
    };

    match (existing, incoming) {
        (
            FileOperation::Edit {
                old_text: existing_old,
                ..
            },
            FileOperation::Edit {
                old_text: incoming_old,
                ..
            },
        ) => analyze_edits(&content, existing_old, incoming_old, incoming),
        (
            FileOperation::InsertLines {
                line_number: existing_line,
                ..
            },
            FileOperation::InsertLines { line_number, .. },
        ) => analyze_inserts(*existing_line, *line_number, incoming),
        (
            FileOperation::DeleteLines {
                start_line: existing_start,
                end_line: existing_end,
                ..
            },
            FileOperation::DeleteLines {
                start_line,
                end_line,
                ..
            },
        ) => analyze_deletes(
            *existing_start,
            *existing_end,
            *start_line,
            *end_line,
            incoming,
        ),
        // Cross-kind effects are not independently composable; sequence them.
        (existing, incoming) => MergeDecision::no_merge(format!(
            "{} and {} operations must be sequenced",
            existing.kind(),
            incoming.kind()
        )),
    }
}

/// Two edits merge when both targets are found and their first-occurrence
/// character ranges are disjoint. The incoming edit is returned unmodified:
/// it re-locates its own text at execution time.
fn analyze_edits(
    content: &str,
    existing_old: &str,
    incoming_old: &str,
    incoming: &FileOperation,
) -> MergeDecision {
    let existing_range = content
        .find(existing_old)
        .map(|start| EditRange::text(start, existing_old.len()));
    let incoming_range = content
        .find(incoming_old)
        .map(|start| EditRange::text(start, incoming_old.len()));

    match (existing_range, incoming_range) {
        (Some(a), Some(b)) if !a.overlaps(&b) => {
            MergeDecision::merge("edits target disjoint text ranges", incoming.clone())
        }
        (Some(_), Some(_)) => MergeDecision::no_merge("edits target overlapping text ranges"),
        _ => MergeDecision::no_merge("edit target text not found in current content"),
    }
}

/// Two inserts merge when their target lines differ by more than one. When
/// the holder's insertion point precedes the incoming one, the incoming line
/// is bumped by 1 to account for the line about to be added above it.
fn analyze_inserts(
    existing_line: usize,
    incoming_line: usize,
    incoming: &FileOperation,
) -> MergeDecision {
    if existing_line.abs_diff(incoming_line) <= 1 {
        return MergeDecision::no_merge("insertions target the same or adjacent lines");
    }

    let mut adjusted = incoming.clone();
    if let FileOperation::InsertLines { line_number, .. } = &mut adjusted {
        if existing_line < incoming_line {
            *line_number += 1;
        }
    }
    MergeDecision::merge("insertions target distant lines", adjusted)
}

/// Two deletions merge when their inclusive line spans are disjoint. An
/// incoming span entirely after the holder's is shifted back by the holder's
/// line count.
fn analyze_deletes(
    existing_start: usize,
    existing_end: usize,
    incoming_start: usize,
    incoming_end: usize,
    incoming: &FileOperation,
) -> MergeDecision {
    // Inverted spans come from malformed tool arguments; the overlap and
    // shift arithmetic assumes start <= end, so route them to sequencing and
    // let the executor produce the diagnostic.
    if existing_end < existing_start || incoming_end < incoming_start {
        return MergeDecision::no_merge("deletion range is inverted");
    }

    let existing_range = EditRange::lines(existing_start, existing_end);
    let incoming_range = EditRange::lines(incoming_start, incoming_end);
    if existing_range.overlaps(&incoming_range) {
        return MergeDecision::no_merge("deletions target overlapping line ranges");
    }

    let mut adjusted = incoming.clone();
    if incoming_start > existing_end {
        let removed = existing_end - existing_start + 1;
        if let FileOperation::DeleteLines {
            start_line,
            end_line,
            ..
        } = &mut adjusted
        {
            *start_line -= removed;
            *end_line -= removed;
        }
    }
    MergeDecision::merge("deletions target disjoint line ranges", adjusted)
}
