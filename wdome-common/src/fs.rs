//! Atomic file write using the write-rename pattern.
//!
//! Data goes to `{path}.tmp`, is flushed with `sync_all()`, then renamed over the
//! final path. A crash mid-write leaves the previous file untouched.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically writes `data` to `path`.
///
/// Parent directories are created when missing.
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = tmp_path_for(path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    fs::rename(&tmp_path, path)?;

    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        atomic_write(&path, b"hello").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"hello");
        assert!(!tmp_path_for(&path).exists(), "Temp file should not remain");
    }

    #[test]
    fn test_atomic_write_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        atomic_write(&path, b"version 1").unwrap();
        atomic_write(&path, b"version 2").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"version 2");
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/state.json");

        atomic_write(&path, b"nested").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"nested");
    }
}
