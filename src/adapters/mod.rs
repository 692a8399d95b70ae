//! Adapter interfaces for external processes.
//!
//! Adapters own the process plumbing: resolving which program to run
//! (directly or through a named environment) and running it with streamed
//! output. Pipeline semantics live in `core`.

pub mod command;
pub mod process;

pub use command::{resolve_tool, Invocation, RunOptions, DEFAULT_LAUNCHER};
pub use process::{OutputChunk, ProcessRunner, RunnerError, TokioProcessRunner};
