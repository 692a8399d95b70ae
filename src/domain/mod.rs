//! Domain types for the slice-preview pipeline.
//!
//! This module contains the core data structures:
//! - Request: What to render (source text, target line, environment)
//! - Run: Pipeline execution state
//! - Artifact: The rendered video located after a successful render
//! - Events: Panel events delivered to a display sink

pub mod artifact;
pub mod events;
pub mod request;
pub mod run;

// Re-export commonly used types
pub use artifact::ArtifactReference;
pub use events::{DisplayEvent, Notification, NotificationLevel};
pub use request::{PipelineRequest, RequestError, TriggerInput, SUPPORTED_LANGUAGE};
pub use run::{Run, RunState, StageResult};
