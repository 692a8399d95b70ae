//! Core orchestration logic.
//!
//! This module contains:
//! - SliceExtractionStage: source text -> scene file
//! - RenderStage: scene file -> video, with artifact discovery
//! - WorkingDirectory: per-run scratch space
//! - Orchestrator: sequences the stages and drives the display sink

pub mod error;
pub mod orchestrator;
pub mod render;
pub mod settings;
pub mod slice;
pub mod workdir;

// Re-export commonly used types
pub use error::{PipelineError, Stage};
pub use orchestrator::Orchestrator;
pub use render::{artifact_dir, find_artifact, RenderStage, QUALITY_PROFILE, RENDER_FLAGS};
pub use settings::{PipelineSettings, DEFAULT_WORKDIR_PREFIX};
pub use slice::{SliceExtractionStage, SCENE_FILE_NAME};
pub use workdir::WorkingDirectory;
