//! Render stage and artifact discovery.
//!
//! Runs the render engine inside the working directory and streams its
//! output to the display sink. The engine resolves the scene relative to its
//! cwd, so only the scene's base name is passed. On success the video is
//! looked up under `media/videos/<scene stem>/480p15/`.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::adapters::{resolve_tool, Invocation, OutputChunk, ProcessRunner, RunOptions};
use crate::display::DisplaySink;
use crate::domain::ArtifactReference;

use super::error::{PipelineError, Stage};
use super::settings::PipelineSettings;

/// Low-quality preview flags passed to the render engine
pub const RENDER_FLAGS: &[&str] = &["-pql"];

/// Output directory label the engine uses for the flags above
pub const QUALITY_PROFILE: &str = "480p15";

/// Rendered video file names
pub const ARTIFACT_PATTERN: &str = "*.mp4";

/// Second pipeline step: scene file -> video artifact
pub struct RenderStage<'a> {
    runner: &'a dyn ProcessRunner,
    settings: &'a PipelineSettings,
    sink: &'a dyn DisplaySink,
}

impl<'a> RenderStage<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        settings: &'a PipelineSettings,
        sink: &'a dyn DisplaySink,
    ) -> Self {
        Self {
            runner,
            settings,
            sink,
        }
    }

    /// `<renderer> -pql <scene base name>`, environment applied
    pub fn invocation(&self, scene_path: &Path, environment: Option<&str>) -> Invocation {
        let scene_name = scene_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        resolve_tool(&self.settings.renderer, environment, &self.settings.launcher)
            .args(RENDER_FLAGS.iter().copied())
            .arg(scene_name)
    }

    /// Render `scene_path` inside `workdir` and locate the produced video
    #[instrument(skip(self, scene_path, workdir), fields(workdir = %workdir.display()))]
    pub async fn run(
        &self,
        scene_path: &Path,
        workdir: &Path,
        environment: Option<&str>,
    ) -> Result<ArtifactReference, PipelineError> {
        let invocation = self.invocation(scene_path, environment);
        info!(command = %invocation, "Rendering scene");

        let sink = self.sink;
        let on_output = |chunk: OutputChunk| sink.append_log(chunk.text());

        let result = self
            .runner
            .run(&invocation, RunOptions::default().cwd(workdir), &on_output)
            .await
            .map_err(|e| PipelineError::from_runner(Stage::Render, e))?;

        if !result.success() {
            return Err(PipelineError::RenderFailed {
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }

        match find_artifact(&artifact_dir(workdir, scene_path)).await {
            Err(PipelineError::ArtifactNotFound { dir, reason, .. }) => {
                Err(PipelineError::ArtifactNotFound {
                    dir,
                    reason,
                    stderr: result.stderr,
                })
            }
            found => found,
        }
    }
}

/// `<workdir>/media/videos/<scene stem>/480p15`
pub fn artifact_dir(workdir: &Path, scene_path: &Path) -> PathBuf {
    let stem = scene_path.file_stem().unwrap_or_default();

    workdir
        .join("media")
        .join("videos")
        .join(stem)
        .join(QUALITY_PROFILE)
}

/// Locate the rendered video in `dir`.
///
/// Exactly one `*.mp4` file is expected. With several, the lexicographically
/// first file name wins and a warning is logged.
pub async fn find_artifact(dir: &Path) -> Result<ArtifactReference, PipelineError> {
    let not_found = |reason: String| PipelineError::ArtifactNotFound {
        dir: dir.to_path_buf(),
        reason,
        stderr: String::new(),
    };

    let pattern = Pattern::new(ARTIFACT_PATTERN).map_err(|e| not_found(e.to_string()))?;

    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| not_found(format!("cannot read directory: {}", e)))?;

    let mut candidates = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| not_found(format!("cannot read directory: {}", e)))?
    {
        // Follows symlinks, so a linked video still counts
        let is_file = fs::metadata(entry.path())
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);

        if let Some(name) = entry.file_name().to_str() {
            if is_file && pattern.matches(name) {
                candidates.push(entry.path());
            }
        }
    }

    candidates.sort();

    match candidates.len() {
        0 => Err(not_found(format!("no file matching {}", ARTIFACT_PATTERN))),
        1 => Ok(ArtifactReference::new(candidates.remove(0))),
        count => {
            let chosen = candidates.remove(0);
            warn!(
                count,
                chosen = %chosen.display(),
                "Multiple rendered videos found, using the first by name"
            );
            Ok(ArtifactReference::new(chosen))
        }
    }
}
