//! Run state and per-run records.
//!
//! A Run represents a single execution of the slice -> render pipeline.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::ArtifactReference;

/// Outcome of one external process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageResult {
    /// Exit code (-1 when the child was killed by a signal)
    pub exit_code: i32,

    /// Everything the child wrote to stdout
    pub stdout: String,

    /// Everything the child wrote to stderr
    pub stderr: String,
}

impl StageResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// State of a pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing has started yet
    #[default]
    Idle,

    /// Slice extraction is running
    Slicing,

    /// The render engine is running
    Rendering,

    /// Artifact resolved and delivered
    Succeeded,

    /// Either stage failed
    Failed,
}

impl RunState {
    /// Whether `next` is a legal transition from this state.
    ///
    /// Terminal states only leave through a fresh start.
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;

        matches!(
            (self, next),
            (Idle | Succeeded | Failed, Slicing)
                | (Slicing, Rendering)
                | (Slicing | Rendering, Failed)
                | (Rendering, Succeeded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

/// A pipeline execution run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Current state of the run
    pub state: RunState,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished (if applicable)
    pub completed_at: Option<DateTime<Utc>>,

    /// Working directory owned by this run
    pub workdir: Option<PathBuf>,

    /// Rendered video, set on success
    pub artifact: Option<ArtifactReference>,

    /// User-facing error message, set on failure
    pub error: Option<String>,
}

impl Run {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            state: RunState::Idle,
            started_at: Utc::now(),
            completed_at: None,
            workdir: None,
            artifact: None,
            error: None,
        }
    }

    pub fn succeed(&mut self, artifact: ArtifactReference) {
        self.state = RunState::Succeeded;
        self.artifact = Some(artifact);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = RunState::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}
