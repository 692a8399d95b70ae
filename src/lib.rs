//! slice-preview - render one animation slice of a scene script
//!
//! Takes a scene script and a cursor line, has an external transformer cut a
//! self-contained scene out of it, renders that scene with an external
//! engine, and streams logs and the resulting video to a display sink.
//!
//! # Architecture
//!
//! The pipeline is two external processes run strictly in sequence:
//! - Slice extraction: source text on stdin -> scene file in a fresh temp dir
//! - Render: engine runs in that temp dir; its output streams to the sink
//! - The video is then located under `media/videos/<scene>/480p15/`
//!
//! # Modules
//!
//! - `adapters`: Process plumbing (command resolution, streaming runner)
//! - `core`: Orchestration logic (stages, working directory, Orchestrator)
//! - `display`: Display sinks (console, JSON lines, in-memory)
//! - `domain`: Data structures (PipelineRequest, Run, DisplayEvent)
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Render the slice around line 42
//! slice-preview render scenes/intro.py --line 42
//!
//! # Same, inside a conda environment, emitting panel messages as JSON lines
//! slice-preview render scenes/intro.py --line 42 --env manim --format jsonl
//!
//! # Show the commands without running them
//! slice-preview plan --line 42 --env manim
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod display;
pub mod domain;

// Re-export main types at crate root for convenience
pub use core::{Orchestrator, PipelineError, PipelineSettings};
pub use display::DisplaySink;
pub use domain::{DisplayEvent, PipelineRequest, Run, RunState};
