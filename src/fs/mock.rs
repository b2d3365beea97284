// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
struct MockFile {
    content: String,
    modified: SystemTime,
}

/// In-memory filesystem with explicit modification times.
///
/// Clones share the same underlying state, so a test can keep one handle and
/// give another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockFile>>>,
    failing_stat: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file with the given content and a fixed mtime.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>, modified: SystemTime) {
        self.files.lock().insert(
            path.as_ref().to_path_buf(),
            MockFile {
                content: content.into(),
                modified,
            },
        );
    }

    /// Rewrite a file's content and advance its mtime by `by`.
    ///
    /// Missing files are created with an mtime of `UNIX_EPOCH + by`.
    pub fn touch(&self, path: impl AsRef<Path>, content: impl Into<String>, by: Duration) {
        let mut files = self.files.lock();
        let entry = files
            .entry(path.as_ref().to_path_buf())
            .or_insert_with(|| MockFile {
                content: String::new(),
                modified: SystemTime::UNIX_EPOCH,
            });
        entry.content = content.into();
        entry.modified += by;
    }

    /// Change only the modification time.
    pub fn set_modified(&self, path: impl AsRef<Path>, modified: SystemTime) {
        if let Some(file) = self.files.lock().get_mut(path.as_ref()) {
            file.modified = modified;
        }
    }

    /// Make `modified()` fail for `path` until [`Self::restore_stat`] is called.
    pub fn fail_stat(&self, path: impl AsRef<Path>) {
        self.failing_stat.lock().insert(path.as_ref().to_path_buf());
    }

    pub fn restore_stat(&self, path: impl AsRef<Path>) {
        self.failing_stat.lock().remove(path.as_ref());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.files.lock().remove(path.as_ref());
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.files.lock();
        match files.get(path) {
            Some(file) => Ok(file.content.clone()),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        if self.failing_stat.lock().contains(path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        let files = self.files.lock();
        match files.get(path) {
            Some(file) => Ok(file.modified),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_advances_mtime_and_replaces_content() {
        let fs = MockFileSystem::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        fs.add_file("q.sql", "SELECT 1", t0);

        fs.touch("q.sql", "SELECT 2", Duration::from_secs(5));

        assert_eq!(fs.read_to_string(Path::new("q.sql")).unwrap(), "SELECT 2");
        assert_eq!(
            fs.modified(Path::new("q.sql")).unwrap(),
            t0 + Duration::from_secs(5)
        );
    }

    #[test]
    fn failing_stat_is_reversible() {
        let fs = MockFileSystem::new();
        fs.add_file("q.sql", "SELECT 1", SystemTime::UNIX_EPOCH);
        fs.fail_stat("q.sql");
        assert!(fs.modified(Path::new("q.sql")).is_err());
        fs.restore_stat("q.sql");
        assert!(fs.modified(Path::new("q.sql")).is_ok());
    }
}
