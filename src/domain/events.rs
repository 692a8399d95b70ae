//! Events delivered to a display sink.
//!
//! Panel events form a closed set. Their serialized `type` tags match the
//! message names the preview panel understands, so the JSON-lines sink can
//! forward them unchanged.

use serde::{Deserialize, Serialize};

/// Panel events, orchestrator -> sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DisplayEvent {
    /// A run started; hide the previous video and show the spinner
    #[serde(rename = "showLoading")]
    Loading,

    /// A chunk of engine output
    #[serde(rename = "addLog")]
    LogAppended { message: String },

    /// Clear the log area
    #[serde(rename = "clearLog")]
    LogCleared,

    /// The rendered video is ready at `uri`
    #[serde(rename = "updateVideo")]
    ArtifactReady { uri: String },
}

impl DisplayEvent {
    pub fn log(message: impl Into<String>) -> Self {
        Self::LogAppended {
            message: message.into(),
        }
    }

    pub fn artifact(uri: impl Into<String>) -> Self {
        Self::ArtifactReady { uri: uri.into() }
    }
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// One-line notice shown outside the panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}
