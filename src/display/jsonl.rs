//! JSON-lines sink for editor front-ends.
//!
//! Each panel event is written as one JSON object per line, using the same
//! `type` tags the preview panel consumes. Notifications are written as
//! `{"type":"notification","level":...,"message":...}`.

use std::io::{self, Write};
use std::sync::Mutex;

use serde_json::json;
use tracing::warn;

use crate::domain::{DisplayEvent, Notification};

use super::DisplaySink;

/// Writes panel messages as newline-delimited JSON
pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Sink writing to the process stdout
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    fn write_line(&self, value: &serde_json::Value) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Err(e) = write_json_line(&mut *writer, value) {
            warn!(error = %e, "Failed to write display message");
        }
    }
}

fn write_json_line(writer: &mut dyn Write, value: &serde_json::Value) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

impl DisplaySink for JsonLinesSink {
    fn dispatch(&self, event: DisplayEvent) {
        match serde_json::to_value(&event) {
            Ok(value) => self.write_line(&value),
            Err(e) => warn!(error = %e, "Failed to serialize display event"),
        }
    }

    fn notify(&self, notification: Notification) {
        self.write_line(&json!({
            "type": "notification",
            "level": notification.level,
            "message": notification.message,
        }));
    }
}
