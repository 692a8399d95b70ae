//! Streaming subprocess runner.
//!
//! Spawns one external command, feeds it optional stdin text, and reports
//! stdout/stderr chunks as they arrive. Knows nothing about pipeline stages.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::StageResult;

use super::command::{Invocation, RunOptions};

const READ_BUFFER_BYTES: usize = 8 * 1024;

/// A chunk of child output, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    Stdout(String),
    Stderr(String),
}

impl OutputChunk {
    pub fn text(&self) -> &str {
        match self {
            OutputChunk::Stdout(text) | OutputChunk::Stderr(text) => text,
        }
    }
}

/// Errors that stop a process run before it produces a result
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The executable could not be started (not found, not runnable)
    #[error("Failed to start process with command \"{command}\": {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The process started but its pipes or exit status could not be read
    #[error("I/O error while running \"{command}\": {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Runs external commands.
///
/// A non-zero exit is a normal result, reported through
/// [`StageResult::exit_code`]. `on_output` is called serially, zero or more
/// times, before the future completes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        invocation: &Invocation,
        options: RunOptions,
        on_output: &(dyn Fn(OutputChunk) + Send + Sync),
    ) -> Result<StageResult, RunnerError>;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        options: RunOptions,
        on_output: &(dyn Fn(OutputChunk) + Send + Sync),
    ) -> Result<StageResult, RunnerError> {
        let command_line = invocation.to_string();

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(if options.input_text.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref cwd) = options.cwd {
            command.current_dir(cwd);
        }

        debug!(command = %command_line, cwd = ?options.cwd, "Spawning process");

        let mut child = command.spawn().map_err(|source| RunnerError::Launch {
            command: command_line.clone(),
            source,
        })?;

        // Write stdin from its own task so a chatty child can never block on
        // a full stdout pipe while we are still writing.
        let writer = match (child.stdin.take(), options.input_text) {
            (Some(mut stdin), Some(input)) => Some(tokio::spawn(async move {
                stdin.write_all(input.as_bytes()).await?;
                drop(stdin);
                Ok::<(), io::Error>(())
            })),
            _ => None,
        };

        let io_error = |source: io::Error| RunnerError::Io {
            command: command_line.clone(),
            source,
        };
        let missing_pipe = |name: &str| {
            io_error(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("child {} was not captured", name),
            ))
        };

        let mut stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let mut out = StreamCollector::default();
        let mut err = StreamCollector::default();
        let mut out_buf = vec![0u8; READ_BUFFER_BYTES];
        let mut err_buf = vec![0u8; READ_BUFFER_BYTES];

        while out.open || err.open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if out.open => {
                    let n = read.map_err(io_error)?;
                    if let Some(text) = out.absorb(&out_buf[..n]) {
                        on_output(OutputChunk::Stdout(text));
                    }
                }
                read = stderr.read(&mut err_buf), if err.open => {
                    let n = read.map_err(io_error)?;
                    if let Some(text) = err.absorb(&err_buf[..n]) {
                        on_output(OutputChunk::Stderr(text));
                    }
                }
            }
        }

        let status = child.wait().await.map_err(io_error)?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!(command = %command_line, "Process exited before reading all of stdin");
                }
                Ok(Err(e)) => {
                    warn!(command = %command_line, error = %e, "Failed to write process stdin")
                }
                Err(e) => warn!(command = %command_line, error = %e, "Stdin writer task failed"),
            }
        }

        let exit_code = status.code().unwrap_or(-1);
        debug!(command = %command_line, exit_code, "Process finished");

        Ok(StageResult {
            exit_code,
            stdout: out.collected,
            stderr: err.collected,
        })
    }
}

/// Accumulates one output stream and decodes it incrementally
#[derive(Debug)]
struct StreamCollector {
    decoder: Utf8Decoder,
    collected: String,
    open: bool,
}

impl Default for StreamCollector {
    fn default() -> Self {
        Self {
            decoder: Utf8Decoder::default(),
            collected: String::new(),
            open: true,
        }
    }
}

impl StreamCollector {
    /// Take one read's worth of bytes; an empty read means EOF.
    ///
    /// Returns the newly decoded text, if any.
    fn absorb(&mut self, bytes: &[u8]) -> Option<String> {
        let text = if bytes.is_empty() {
            self.open = false;
            self.decoder.finish()
        } else {
            self.decoder.decode(bytes)
        };

        if text.is_empty() {
            return None;
        }

        self.collected.push_str(&text);
        Some(text)
    }
}

/// UTF-8 decoder that tolerates multi-byte characters split across reads
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            let err = match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => err,
            };

            let valid = err.valid_up_to();
            out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));

            match err.error_len() {
                // Incomplete sequence at the end: wait for the next read
                None => {
                    self.pending.drain(..valid);
                    break;
                }
                Some(len) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid + len);
                }
            }
        }

        out
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
