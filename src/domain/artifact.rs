//! The rendered video produced by a successful run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

/// Resolved location of a rendered artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReference {
    /// Absolute path to the video file
    pub path: PathBuf,
}

impl ArtifactReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sink-resolvable locator for the artifact (a `file://` URI).
    ///
    /// Falls back to the plain path when it cannot be expressed as a URI,
    /// which only happens for relative paths.
    pub fn locator(&self) -> String {
        Url::from_file_path(&self.path)
            .map(String::from)
            .unwrap_or_else(|_| self.path.display().to_string())
    }
}
