//! Pipeline requests and trigger validation.
//!
//! A trigger (CLI, editor command) hands over the full document text and a
//! cursor line. Validation happens here, before any process is spawned.

use std::num::NonZeroU32;

use thiserror::Error;

/// Language id of the only scripting language the pipeline accepts
pub const SUPPORTED_LANGUAGE: &str = "python";

/// Reasons a trigger is rejected before the pipeline starts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("This command is only available for Python files (got '{0}')")]
    UnsupportedLanguage(String),

    #[error("Target line must be a positive 1-based line number")]
    InvalidLine,
}

/// Raw input from whatever triggered the render
#[derive(Debug, Clone)]
pub struct TriggerInput {
    /// Full document text
    pub text: String,

    /// 1-based cursor line
    pub line: u32,

    /// Language id of the document (e.g. "python")
    pub language_id: String,

    /// Named execution environment, if configured
    pub environment: Option<String>,
}

/// A validated request for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    source_text: String,
    target_line: NonZeroU32,
    environment: Option<String>,
}

impl PipelineRequest {
    /// Create a request from already-validated parts
    pub fn new(source_text: impl Into<String>, target_line: NonZeroU32) -> Self {
        Self {
            source_text: source_text.into(),
            target_line,
            environment: None,
        }
    }

    /// Run both tools through the named environment.
    ///
    /// Blank names are treated as no environment.
    pub fn with_environment(mut self, environment: Option<impl AsRef<str>>) -> Self {
        self.environment = environment
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty());
        self
    }

    /// Validate a trigger and build a request from it
    pub fn from_trigger(trigger: TriggerInput) -> Result<Self, RequestError> {
        if trigger.language_id != SUPPORTED_LANGUAGE {
            return Err(RequestError::UnsupportedLanguage(trigger.language_id));
        }

        let line = NonZeroU32::new(trigger.line).ok_or(RequestError::InvalidLine)?;

        Ok(Self::new(trigger.text, line).with_environment(trigger.environment))
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn target_line(&self) -> NonZeroU32 {
        self.target_line
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }
}
