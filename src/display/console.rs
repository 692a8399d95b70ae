//! Terminal sink: logs stream to stderr, the artifact path goes to stdout.

use std::io::Write;
use std::sync::Mutex;

use crate::domain::{DisplayEvent, Notification, NotificationLevel};

use super::DisplaySink;

/// Sink for interactive terminal use
#[derive(Debug, Default)]
pub struct ConsoleSink {
    /// Serializes writes from concurrent runs
    lock: Mutex<()>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySink for ConsoleSink {
    fn dispatch(&self, event: DisplayEvent) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match event {
            DisplayEvent::Loading => eprintln!("Rendering..."),
            DisplayEvent::LogAppended { message } => {
                let mut stderr = std::io::stderr().lock();
                let _ = stderr.write_all(message.as_bytes());
                let _ = stderr.flush();
            }
            // Terminal output is append-only
            DisplayEvent::LogCleared => {}
            DisplayEvent::ArtifactReady { uri } => println!("{}", uri),
        }
    }

    fn notify(&self, notification: Notification) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match notification.level {
            NotificationLevel::Info => eprintln!("info: {}", notification.message),
            NotificationLevel::Error => eprintln!("error: {}", notification.message),
        }
    }
}
