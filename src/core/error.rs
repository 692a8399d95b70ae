//! Pipeline error taxonomy.
//!
//! Every variant is terminal for the run that produced it: nothing is
//! retried and no fallback command is attempted.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::RunnerError;

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SliceExtraction,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::SliceExtraction => write!(f, "slice extraction"),
            Stage::Render => write!(f, "render"),
        }
    }
}

/// Errors that end a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "Failed to start {stage} process with command \"{command}\": {message}. \
         Check if the tool or environment launcher is on your PATH."
    )]
    Launch {
        stage: Stage,
        command: String,
        message: String,
    },

    #[error("Slice extraction failed: {}", summarize(.stderr))]
    SliceExtractionFailed { stderr: String },

    #[error("Rendering failed with exit code {exit_code}: {}", summarize(.stderr))]
    RenderFailed { exit_code: i32, stderr: String },

    #[error(
        "Rendering finished, but no video file was found in {}: {reason}{}",
        .dir.display(),
        render_output(.stderr)
    )]
    ArtifactNotFound {
        dir: PathBuf,
        reason: String,
        stderr: String,
    },

    #[error("Failed to create working directory: {0}")]
    WorkingDirectory(#[source] io::Error),

    #[error("A render is already in progress for this orchestrator")]
    RunInFlight,
}

impl PipelineError {
    /// Map a runner failure into the error class of `stage`
    pub fn from_runner(stage: Stage, error: RunnerError) -> Self {
        match error {
            RunnerError::Launch { command, source } => PipelineError::Launch {
                stage,
                command,
                message: source.to_string(),
            },
            io_error @ RunnerError::Io { .. } => {
                let stderr = io_error.to_string();
                match stage {
                    Stage::SliceExtraction => PipelineError::SliceExtractionFailed { stderr },
                    Stage::Render => PipelineError::RenderFailed {
                        exit_code: -1,
                        stderr,
                    },
                }
            }
        }
    }

    /// Stage the error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Launch { stage, .. } => Some(*stage),
            PipelineError::SliceExtractionFailed { .. } => Some(Stage::SliceExtraction),
            PipelineError::RenderFailed { .. } | PipelineError::ArtifactNotFound { .. } => {
                Some(Stage::Render)
            }
            PipelineError::WorkingDirectory(_) | PipelineError::RunInFlight => None,
        }
    }

    /// Captured diagnostics to keep visible in the log
    pub fn stderr(&self) -> Option<&str> {
        match self {
            PipelineError::SliceExtractionFailed { stderr }
            | PipelineError::RenderFailed { stderr, .. }
            | PipelineError::ArtifactNotFound { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Last non-blank stderr line, which is where tracebacks put the actual error
fn summarize(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no diagnostics on stderr")
}

/// Suffix naming the renderer's last stderr line, empty when it was silent
fn render_output(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(" (render output: {})", summarize(stderr))
    }
}
