//! Atomic-rename checkpoint persistence, shared by the crawler and every
//! verifier phase (spec section 9: "use atomic rename for checkpoint
//! files").

use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CoreError, CoreResult};

/// Write `value` as pretty JSON to `path` via write-temp-then-rename, so a
/// reader never observes a partially written checkpoint.
pub fn write_checkpoint<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = tmp_path_for(path);
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp_path, body)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read a checkpoint back, returning `None` if the file does not exist yet.
pub fn read_checkpoint<T: DeserializeOwned>(path: &Path) -> CoreResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let body = fs::read(path)?;
    let value = serde_json::from_slice(&body)?;
    Ok(Some(value))
}

/// Delete a checkpoint file if present. A no-op if it doesn't exist.
pub fn clear_checkpoint(path: &Path) -> CoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CoreError::Io(e)),
    }
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut tmp = path.to_path_buf();
    let file_name = tmp
        .file_name()
        .map(|n| format!("{}.tmp", n.to_string_lossy()))
        .unwrap_or_else(|| "checkpoint.tmp".to_string());
    tmp.set_file_name(file_name);
    tmp
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Progress {
        last_completed_year: i32,
        last_completed_page: u32,
    }

    #[test]
    fn round_trips_through_atomic_rename() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");

        assert!(read_checkpoint::<Progress>(&path).unwrap().is_none());

        let progress = Progress {
            last_completed_year: 2001,
            last_completed_page: 4,
        };
        write_checkpoint(&path, &progress).unwrap();

        let loaded: Progress = read_checkpoint(&path).unwrap().unwrap();
        assert_eq!(loaded, progress);

        // no leftover temp file
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        clear_checkpoint(&path).unwrap();
        write_checkpoint(&path, &42u32).unwrap();
        clear_checkpoint(&path).unwrap();
        assert!(read_checkpoint::<u32>(&path).unwrap().is_none());
    }
}
