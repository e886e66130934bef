//! Directory lifecycle helpers.
//!
//! The run exclusively owns its working root; these helpers guarantee it
//! starts clean without ever failing on an already-absent path.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use thiserror::Error;

/// Errors from directory lifecycle operations.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The user declined interactive removal of a non-empty directory.
    #[error("Removal of non-empty directory declined: {path}")]
    Declined { path: String },
}

impl FsError {
    fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for directory operations.
pub type FsResult<T> = Result<T, FsError>;

/// Recursively remove `dir` if it exists. Absence is not an error.
///
/// Idempotent: calling it twice leaves the filesystem unchanged.
pub fn remove(dir: &Path) -> FsResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .map_err(|e| FsError::io(format!("removing {}", dir.display()), e))?;
        tracing::info!("Removed directory {}", dir.display());
    } else {
        tracing::info!("Directory {} already absent", dir.display());
    }
    Ok(())
}

/// Remove `dir` with a safety check on non-empty directories.
///
/// - Absent: warn and return.
/// - Present and empty: remove silently.
/// - Present and non-empty: warn, then either ask for confirmation
///   (`prompt = true`, declining is an error) or remove without asking.
pub fn safe_remove(dir: &Path, prompt: bool) -> FsResult<()> {
    if !dir.exists() {
        tracing::warn!("Directory {} does not exist, nothing to remove", dir.display());
        return Ok(());
    }

    if is_dir_empty(dir).map_err(|e| FsError::io(format!("reading {}", dir.display()), e))? {
        fs::remove_dir_all(dir)
            .map_err(|e| FsError::io(format!("removing {}", dir.display()), e))?;
        return Ok(());
    }

    tracing::warn!("Directory {} is not empty", dir.display());

    if prompt && !confirm(&format!("Remove {} recursively? [y/N] ", dir.display())) {
        return Err(FsError::Declined {
            path: dir.display().to_string(),
        });
    }

    fs::remove_dir_all(dir).map_err(|e| FsError::io(format!("removing {}", dir.display()), e))?;
    tracing::info!("Removed non-empty directory {}", dir.display());
    Ok(())
}

/// Check whether a directory has no entries.
fn is_dir_empty(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

/// Ask a yes/no question on the controlling terminal.
fn confirm(question: &str) -> bool {
    print!("{}", question);
    let _ = io::stdout().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn remove_is_idempotent() {
        let root = tempdir().unwrap();
        let target = root.path().join("scratch");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("file.txt"), "data").unwrap();

        remove(&target).unwrap();
        assert!(!target.exists());

        // Second call on the absent path must not error.
        remove(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn safe_remove_absent_is_ok() {
        let root = tempdir().unwrap();
        safe_remove(&root.path().join("missing"), false).unwrap();
    }

    #[test]
    fn safe_remove_empty_dir() {
        let root = tempdir().unwrap();
        let target = root.path().join("empty");
        fs::create_dir(&target).unwrap();

        safe_remove(&target, false).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn safe_remove_non_empty_without_prompt() {
        let root = tempdir().unwrap();
        let target = root.path().join("full");
        fs::create_dir_all(target.join("nested")).unwrap();
        fs::write(target.join("nested").join("file.txt"), "data").unwrap();

        safe_remove(&target, false).unwrap();
        assert!(!target.exists());
    }
}
