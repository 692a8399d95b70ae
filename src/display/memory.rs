//! In-memory sink that records everything it receives.
//!
//! Useful for tests and for embedding the pipeline where events are
//! inspected after the run instead of displayed live.

use std::sync::Mutex;

use crate::domain::{DisplayEvent, Notification, NotificationLevel};

use super::DisplaySink;

/// Records panel events and notifications in arrival order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DisplayEvent>>,
    notifications: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all panel events so far
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Snapshot of all notifications so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Error notifications only
    pub fn errors(&self) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter(|n| n.level == NotificationLevel::Error)
            .map(|n| n.message)
            .collect()
    }

    /// Concatenation of every appended log chunk
    pub fn log_text(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::LogAppended { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Locators of every artifact shown
    pub fn artifacts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::ArtifactReady { uri } => Some(uri),
                _ => None,
            })
            .collect()
    }
}

impl DisplaySink for MemorySink {
    fn dispatch(&self, event: DisplayEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification);
    }
}
