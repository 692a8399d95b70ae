//! Slice extraction stage.
//!
//! Pipes the full source text into the transformer script, which writes a
//! self-contained scene for the target line to the output path.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, instrument};

use crate::adapters::{resolve_tool, Invocation, OutputChunk, ProcessRunner, RunOptions};
use crate::domain::PipelineRequest;

use super::error::{PipelineError, Stage};
use super::settings::PipelineSettings;

/// File name of the sliced scene inside the working directory
pub const SCENE_FILE_NAME: &str = "temp_scene.py";

/// First pipeline step: source text -> scene file on disk
pub struct SliceExtractionStage<'a> {
    runner: &'a dyn ProcessRunner,
    settings: &'a PipelineSettings,
}

impl<'a> SliceExtractionStage<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, settings: &'a PipelineSettings) -> Self {
        Self { runner, settings }
    }

    /// `<interpreter> <transformer> <output_path> <line>`, environment applied
    pub fn invocation(&self, request: &PipelineRequest, output_path: &Path) -> Invocation {
        resolve_tool(
            &self.settings.interpreter,
            request.environment(),
            &self.settings.launcher,
        )
        .arg(self.settings.transformer.to_string_lossy())
        .arg(output_path.to_string_lossy())
        .arg(request.target_line().to_string())
    }

    /// Run the transformer; returns the scene path once it exists on disk
    #[instrument(skip(self, request), fields(line = request.target_line().get()))]
    pub async fn run(
        &self,
        request: &PipelineRequest,
        output_path: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let invocation = self.invocation(request, output_path);
        info!(command = %invocation, "Extracting slice");

        let on_output = |chunk: OutputChunk| debug!(output = %chunk.text(), "Transformer output");
        let options = RunOptions::default().input_text(request.source_text());

        let result = self
            .runner
            .run(&invocation, options, &on_output)
            .await
            .map_err(|e| PipelineError::from_runner(Stage::SliceExtraction, e))?;

        if !result.success() {
            return Err(PipelineError::SliceExtractionFailed {
                stderr: result.stderr,
            });
        }

        // Exit 0 is not enough: rendering needs the file
        if !fs::try_exists(output_path).await.unwrap_or(false) {
            let mut stderr = result.stderr;
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&format!(
                "transformer exited successfully but did not write {}\n",
                output_path.display()
            ));
            return Err(PipelineError::SliceExtractionFailed { stderr });
        }

        Ok(output_path.to_path_buf())
    }
}
