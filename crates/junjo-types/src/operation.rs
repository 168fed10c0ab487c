//! File operation model.
//!
//! Every mutation a session can request is one of four whole-file text
//! operations. The enum is deliberately closed: the merge analyzer and the
//! executor both match exhaustively, so adding a variant forces every
//! decision point to be revisited.

use serde::{Deserialize, Serialize};

/// How a `Write` treats existing content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace the whole file.
    #[default]
    Overwrite,
    /// Append to the end, creating the file if absent.
    Append,
}

/// A requested file mutation.
///
/// Line numbers are 1-based; `DeleteLines` ranges are inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileOperation {
    /// Write full content to a file.
    Write {
        path: String,
        content: String,
        #[serde(default)]
        mode: WriteMode,
    },
    /// Exact string replacement.
    Edit {
        path: String,
        old_text: String,
        new_text: String,
        #[serde(default)]
        replace_all: bool,
    },
    /// Insert content before the given line.
    InsertLines {
        path: String,
        line_number: usize,
        content: String,
    },
    /// Remove an inclusive line range.
    DeleteLines {
        path: String,
        start_line: usize,
        end_line: usize,
    },
}

impl FileOperation {
    /// The single target path every variant carries.
    pub fn path(&self) -> &str {
        match self {
            Self::Write { path, .. }
            | Self::Edit { path, .. }
            | Self::InsertLines { path, .. }
            | Self::DeleteLines { path, .. } => path,
        }
    }

    /// Whether this operation can never be merged alongside another.
    ///
    /// Overwrite discards the file content every other operation needs to
    /// locate its text or line positions, so it always demands sole ownership.
    pub fn requires_exclusive(&self) -> bool {
        matches!(
            self,
            Self::Write {
                mode: WriteMode::Overwrite,
                ..
            }
        )
    }

    /// The same operation retargeted at another path (e.g. the normalized
    /// form of the one it was built with).
    pub fn with_path(mut self, new_path: impl Into<String>) -> Self {
        match &mut self {
            Self::Write { path, .. }
            | Self::Edit { path, .. }
            | Self::InsertLines { path, .. }
            | Self::DeleteLines { path, .. } => *path = new_path.into(),
        }
        self
    }

    /// Static label for logs and merge-decision reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Write {
                mode: WriteMode::Overwrite,
                ..
            } => "write",
            Self::Write {
                mode: WriteMode::Append,
                ..
            } => "append",
            Self::Edit { .. } => "edit",
            Self::InsertLines { .. } => "insert_lines",
            Self::DeleteLines { .. } => "delete_lines",
        }
    }
}
