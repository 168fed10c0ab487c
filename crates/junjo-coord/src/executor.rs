//! Operation executor: the concrete file I/O behind a granted operation.
//!
//! Failures here are normal results, not exceptional control flow: a missing
//! file, absent edit target, or out-of-bounds range comes back as a failure
//! [`ExecResult`] carrying diagnostic text the caller can show directly.
//! Successful mutations announce themselves on the [`FileEventBus`].

use std::io;

use junjo_types::{ExecResult, FileOperation, WriteMode};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::{EDIT_PREVIEW_LINES, INSERT_CONTEXT_LINES, NOT_FOUND_PREVIEW_LINES};
use crate::events::FileEventBus;

/// Why an operation could not be performed.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Target file does not exist.
    #[error("file not found: {0}")]
    NotFound(String),

    /// An edit's old text is absent from the file.
    #[error("old text not found in {path}. File begins with:\n{preview}")]
    TextNotFound { path: String, preview: String },

    /// A deletion starts past the end of the file.
    #[error("start line {start_line} is beyond the end of {path} ({line_count} lines)")]
    RangeOutOfBounds {
        path: String,
        start_line: usize,
        line_count: usize,
    },

    /// A deletion range ends before it starts.
    #[error("end line {end_line} is before start line {start_line} in {path}")]
    InvertedRange {
        path: String,
        start_line: usize,
        end_line: usize,
    },

    /// Any other I/O failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// What one executed operation did.
struct Outcome {
    output: String,
    /// False for the insert-dedupe no-op; suppresses the modified event.
    modified: bool,
}

impl Outcome {
    fn modified(output: String) -> Self {
        Self {
            output,
            modified: true,
        }
    }

    fn unchanged(output: String) -> Self {
        Self {
            output,
            modified: false,
        }
    }
}

/// Performs file I/O for granted or merged operations.
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    events: FileEventBus,
}

impl OperationExecutor {
    pub fn new(events: FileEventBus) -> Self {
        Self { events }
    }

    /// Execute one operation, returning display-ready output either way.
    pub async fn execute(&self, operation: &FileOperation) -> ExecResult {
        let outcome = match operation {
            FileOperation::Write {
                path,
                content,
                mode: WriteMode::Overwrite,
            } => overwrite(path, content).await,
            FileOperation::Write {
                path,
                content,
                mode: WriteMode::Append,
            } => append(path, content).await,
            FileOperation::Edit {
                path,
                old_text,
                new_text,
                replace_all,
            } => edit(path, old_text, new_text, *replace_all).await,
            FileOperation::InsertLines {
                path,
                line_number,
                content,
            } => insert_lines(path, *line_number, content).await,
            FileOperation::DeleteLines {
                path,
                start_line,
                end_line,
            } => delete_lines(path, *start_line, *end_line).await,
        };

        match outcome {
            Ok(outcome) => {
                if outcome.modified {
                    self.events.publish(operation.path());
                }
                ExecResult::success(outcome.output)
            }
            Err(e) => {
                tracing::debug!(path = operation.path(), kind = operation.kind(), error = %e, "operation failed");
                ExecResult::failure(e.to_string())
            }
        }
    }
}

async fn overwrite(path: &str, content: &str) -> Result<Outcome, ExecError> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
    }

    // Write-then-rename so a concurrent reader never observes a torn file.
    let tmp = format!("{path}.{}.tmp", Uuid::new_v4().simple());
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| io_error(path, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(path, e));
    }

    Ok(Outcome::modified(format!(
        "Wrote {} bytes to {path}",
        content.len()
    )))
}

async fn append(path: &str, content: &str) -> Result<Outcome, ExecError> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| io_error(path, e))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(|e| io_error(path, e))?;
    file.flush().await.map_err(|e| io_error(path, e))?;

    Ok(Outcome::modified(format!(
        "Appended {} bytes to {path}",
        content.len()
    )))
}

async fn edit(
    path: &str,
    old_text: &str,
    new_text: &str,
    replace_all: bool,
) -> Result<Outcome, ExecError> {
    let content = read_required(path).await?;

    let occurrences = content.match_indices(old_text).count();
    if occurrences == 0 {
        return Err(ExecError::TextNotFound {
            path: path.to_string(),
            preview: numbered_lines(&content, 0, NOT_FOUND_PREVIEW_LINES.min(count_lines(&content))),
        });
    }

    let (updated, replaced) = if replace_all {
        (content.replace(old_text, new_text), occurrences)
    } else {
        (content.replacen(old_text, new_text, 1), 1)
    };

    tokio::fs::write(path, &updated)
        .await
        .map_err(|e| io_error(path, e))?;

    let total = count_lines(&updated);
    let shown = total.min(EDIT_PREVIEW_LINES);
    let mut preview = numbered_lines(&updated, 0, shown);
    if total > shown {
        preview.push_str(&format!("\n... ({} more lines)", total - shown));
    }

    Ok(Outcome::modified(format!(
        "Replaced {replaced} occurrence{} in {path}\n\n{preview}",
        if replaced == 1 { "" } else { "s" },
    )))
}

async fn insert_lines(path: &str, line_number: usize, content: &str) -> Result<Outcome, ExecError> {
    let existing = read_required(path).await?;

    // Dedupe: if the trimmed content is already present anywhere, splicing it
    // in again would only duplicate it.
    let trimmed = content.trim();
    if !trimmed.is_empty() && existing.contains(trimmed) {
        return Ok(Outcome::unchanged(format!(
            "Content already exists in {path}; no changes made"
        )));
    }

    let trailing_newline = existing.ends_with('\n');
    let mut lines: Vec<&str> = existing.lines().collect();
    let index = line_number.saturating_sub(1).min(lines.len());
    let new_lines: Vec<&str> = content.lines().collect();
    let inserted = new_lines.len();
    lines.splice(index..index, new_lines);

    let updated = join_lines(&lines, trailing_newline);
    tokio::fs::write(path, &updated)
        .await
        .map_err(|e| io_error(path, e))?;

    let start = index.saturating_sub(INSERT_CONTEXT_LINES);
    let end = (index + inserted + INSERT_CONTEXT_LINES).min(lines.len());
    let context = numbered_lines(&updated, start, end);

    Ok(Outcome::modified(format!(
        "Inserted {inserted} line{} at line {} in {path}\n\n{context}",
        if inserted == 1 { "" } else { "s" },
        index + 1,
    )))
}

async fn delete_lines(path: &str, start_line: usize, end_line: usize) -> Result<Outcome, ExecError> {
    let existing = read_required(path).await?;

    let trailing_newline = existing.ends_with('\n');
    let mut lines: Vec<&str> = existing.lines().collect();
    let line_count = lines.len();
    if start_line == 0 || start_line > line_count {
        return Err(ExecError::RangeOutOfBounds {
            path: path.to_string(),
            start_line,
            line_count,
        });
    }
    // Operations arrive from free-form tool arguments; an inverted range is
    // a caller mistake, not a crash.
    if end_line < start_line {
        return Err(ExecError::InvertedRange {
            path: path.to_string(),
            start_line,
            end_line,
        });
    }

    let end = end_line.min(line_count);
    let removed = end - start_line + 1;
    lines.drain(start_line - 1..end);

    let updated = join_lines(&lines, trailing_newline);
    tokio::fs::write(path, &updated)
        .await
        .map_err(|e| io_error(path, e))?;

    Ok(Outcome::modified(format!(
        "Deleted {removed} line{} ({start_line}-{end}) from {path}",
        if removed == 1 { "" } else { "s" },
    )))
}

/// Read a file that the operation requires to already exist.
async fn read_required(path: &str) -> Result<String, ExecError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| io_error(path, e))
}

fn io_error(path: &str, e: io::Error) -> ExecError {
    if e.kind() == io::ErrorKind::NotFound {
        ExecError::NotFound(path.to_string())
    } else {
        ExecError::Io {
            path: path.to_string(),
            source: e,
        }
    }
}

fn count_lines(content: &str) -> usize {
    content.lines().count()
}

/// Rebuild file content from lines, restoring the trailing newline if the
/// original had one.
fn join_lines(lines: &[&str], trailing_newline: bool) -> String {
    let mut out = lines.join("\n");
    if trailing_newline && !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Render lines `[start, end)` (0-based) with 1-based line-number gutters.
fn numbered_lines(content: &str, start: usize, end: usize) -> String {
    let width = end.to_string().len().max(4);
    content
        .lines()
        .enumerate()
        .skip(start)
        .take(end.saturating_sub(start))
        .map(|(i, line)| format!("{:>width$}→ {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}
