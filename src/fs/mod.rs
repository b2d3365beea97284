// src/fs/mod.rs

//! Filesystem capability used to observe and load query sources.
//!
//! Source watchers never touch `std::fs` directly; they are handed an
//! `Arc<dyn FileSystem>` so tests can swap in [`mock::MockFileSystem`] and
//! move modification times by hand.

use std::fmt::Debug;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Last modification time of the file at `path`.
    fn modified(&self, path: &Path) -> Result<SystemTime>;

    fn exists(&self, path: &Path) -> bool;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        let meta = fs::metadata(path).with_context(|| format!("stat {:?}", path))?;
        meta.modified()
            .with_context(|| format!("reading modification time of {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn real_fs_reports_mtime_and_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "SELECT 1 AS value").unwrap();

        let fs = RealFileSystem;
        assert!(fs.exists(file.path()));
        assert!(fs.modified(file.path()).is_ok());
        assert_eq!(fs.read_to_string(file.path()).unwrap(), "SELECT 1 AS value");
    }

    #[test]
    fn real_fs_stat_of_missing_file_fails() {
        let fs = RealFileSystem;
        let err = fs.modified(Path::new("/definitely/not/here.sql")).unwrap_err();
        assert!(format!("{err:#}").contains("here.sql"));
    }
}
