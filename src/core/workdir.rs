//! Per-run working directories.
//!
//! Each run owns one fresh temp directory holding the sliced scene and all
//! render output. It is removed on drop unless the run persists it; a
//! successful run must persist it, since the artifact locator points inside.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::slice::SCENE_FILE_NAME;

/// Exclusively-owned scratch directory for one run
#[derive(Debug)]
pub struct WorkingDirectory {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl WorkingDirectory {
    /// Create a new directory named `<prefix><random>` under `root`, or under
    /// the system temp dir when `root` is `None`.
    pub fn create(prefix: &str, root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);

        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where slice extraction writes the scene file
    pub fn scene_path(&self) -> PathBuf {
        self.path.join(SCENE_FILE_NAME)
    }

    /// Keep the directory on disk after this value is dropped
    pub fn persist(mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            self.path = dir.keep();
        }
        self.path.clone()
    }
}
