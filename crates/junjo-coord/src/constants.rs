//! Tunables for the coordinator and executor.

use std::time::Duration;

/// How often a queued waiter re-checks the lock table when no release
/// notification arrives. Latency/CPU tradeoff, not a correctness parameter.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum result lines shown after an edit; the rest collapse into an
/// overflow count.
pub const EDIT_PREVIEW_LINES: usize = 20;

/// Lines of the file shown when an edit's old text cannot be found.
pub const NOT_FOUND_PREVIEW_LINES: usize = 5;

/// Context lines shown on each side of an insertion.
pub const INSERT_CONTEXT_LINES: usize = 2;

/// Buffered file-modified events before slow subscribers start lagging.
pub const EVENT_BUS_CAPACITY: usize = 256;
