//! Tool and working-directory settings for the pipeline.

use std::path::PathBuf;

use crate::adapters::DEFAULT_LAUNCHER;

/// Default prefix for per-run temp directories
pub const DEFAULT_WORKDIR_PREFIX: &str = "manim-preview-";

/// Which external tools to run and where runs keep their files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Named-environment launcher (used only when a request names an environment)
    pub launcher: String,

    /// Interpreter that runs the slice transformer script
    pub interpreter: String,

    /// Path to the slice transformer script. The default is relative, so it
    /// only resolves when the caller runs from the directory holding the
    /// script; set `tools.transformer` to an absolute path otherwise.
    pub transformer: PathBuf,

    /// Render engine executable
    pub renderer: String,

    /// Prefix for per-run working directories
    pub workdir_prefix: String,

    /// Parent for working directories (system temp dir when unset)
    pub temp_root: Option<PathBuf>,

    /// Leave failed runs' working directories on disk
    pub keep_failed_workdir: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            launcher: DEFAULT_LAUNCHER.to_string(),
            interpreter: "python".to_string(),
            transformer: PathBuf::from("transformer.py"),
            renderer: "manim".to_string(),
            workdir_prefix: DEFAULT_WORKDIR_PREFIX.to_string(),
            temp_root: None,
            keep_failed_workdir: false,
        }
    }
}

impl PipelineSettings {
    /// Whether the transformer script is missing from disk, resolved
    /// against the current directory when relative
    pub fn transformer_missing(&self) -> bool {
        !self.transformer.is_file()
    }

    /// Sets the transformer script path.
    pub fn transformer(mut self, path: impl Into<PathBuf>) -> Self {
        self.transformer = path.into();
        self
    }

    /// Sets the interpreter that runs the transformer.
    pub fn interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Sets the render engine executable.
    pub fn renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = renderer.into();
        self
    }

    /// Sets the named-environment launcher.
    pub fn launcher(mut self, launcher: impl Into<String>) -> Self {
        self.launcher = launcher.into();
        self
    }

    /// Places working directories under `root`.
    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Keeps working directories of failed runs.
    pub fn keep_failed_workdir(mut self, keep: bool) -> Self {
        self.keep_failed_workdir = keep;
        self
    }
}
