//! Path normalization.
//!
//! Lock-table keys must be stable: `~/f.txt`, `./f.txt` from `$HOME`, and the
//! canonical absolute path all have to land on the same entry. Canonicalizing
//! through `dunce` keeps Windows paths free of `\\?\` prefixes; files that do
//! not exist yet (a `Write` may create them) fall back to canonicalizing the
//! nearest existing ancestor and cleaning the rest lexically.

use std::path::{Component, Path, PathBuf};

/// Normalize a raw user path into the lock-table key form.
pub fn normalize_path(raw: &str) -> String {
    let expanded = shellexpand::tilde(raw);
    let p = Path::new(expanded.as_ref());
    let absolute = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(p)
    };

    let resolved = match dunce::canonicalize(&absolute) {
        Ok(canonical) => canonical,
        Err(_) => resolve_missing(&absolute),
    };
    resolved.to_string_lossy().into_owned()
}

/// Canonicalize the nearest existing ancestor and re-attach the remaining
/// components, cleaned lexically. Used for paths that do not exist yet.
fn resolve_missing(path: &Path) -> PathBuf {
    let cleaned = lexical_clean(path);
    for ancestor in cleaned.ancestors().skip(1) {
        if let Ok(canonical) = dunce::canonicalize(ancestor) {
            if let Ok(rest) = cleaned.strip_prefix(ancestor) {
                return canonical.join(rest);
            }
            break;
        }
    }
    cleaned
}

/// Remove `.` and `..` components without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
