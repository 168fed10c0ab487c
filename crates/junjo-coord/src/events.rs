//! File-modified notifications.
//!
//! Every successful mutation announces its path so that open editors and
//! tree views can refresh. Publishing is fire-and-forget: no receivers is
//! fine, slow receivers lag and drop, and there is no ordering guarantee
//! across files.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::constants::EVENT_BUS_CAPACITY;

/// A file was just modified on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileModified {
    /// Normalized path of the modified file.
    pub path: String,
}

/// Broadcast bus for [`FileModified`] events.
#[derive(Debug, Clone)]
pub struct FileEventBus {
    tx: broadcast::Sender<FileModified>,
}

impl FileEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to file-modified events.
    pub fn subscribe(&self) -> broadcast::Receiver<FileModified> {
        self.tx.subscribe()
    }

    /// Announce a modification. Send errors (zero receivers) are ignored.
    pub fn publish(&self, path: impl Into<String>) {
        let _ = self.tx.send(FileModified { path: path.into() });
    }
}

impl Default for FileEventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}
