//! Candidate directories for persistent state.
//!
//! The config file and the host key both live in the first directory of
//! root, home, current directory that accepts a write probe.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// File created and removed to test a directory for writability.
const PROBE_FILE: &str = ".write_test";

/// Get the home directory.
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Default candidate directories: `/`, then `$HOME`, then the working directory.
#[must_use]
pub fn default_candidates() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("/")];
    dirs.extend(home_dir());
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    dirs
}

/// Check whether a file can be created in `dir`.
#[must_use]
pub fn is_writable(dir: &Path) -> bool {
    let probe = dir.join(PROBE_FILE);
    let created = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
        .is_ok();
    if created {
        let _ = std::fs::remove_file(&probe);
    }
    created
}

/// First candidate that passes the write probe.
#[must_use]
pub fn first_writable(candidates: &[PathBuf]) -> Option<&Path> {
    candidates
        .iter()
        .map(PathBuf::as_path)
        .find(|dir| is_writable(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_writable(dir.path()));
        assert!(!dir.path().join(PROBE_FILE).exists());
    }

    #[test]
    fn missing_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = vec![dir.path().join("does-not-exist"), dir.path().to_path_buf()];
        assert_eq!(first_writable(&candidates), Some(dir.path()));
    }

    #[test]
    fn order_is_respected() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let candidates = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        assert_eq!(first_writable(&candidates), Some(a.path()));
    }

    #[test]
    fn nothing_writable() {
        let candidates = vec![PathBuf::from("/nonexistent/shellgate/a")];
        assert_eq!(first_writable(&candidates), None);
    }

    #[test]
    fn defaults_start_at_root() {
        let dirs = default_candidates();
        assert_eq!(dirs[0], PathBuf::from("/"));
    }
}
