//! Display sinks.
//!
//! A sink is whatever presents a run to the user: an editor panel, a
//! terminal, a test recorder. The orchestrator only talks to the
//! [`DisplaySink`] trait and never holds a global panel reference.

pub mod console;
pub mod jsonl;
pub mod memory;

use tracing::{error, info};

use crate::domain::{DisplayEvent, Notification, NotificationLevel};

pub use console::ConsoleSink;
pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;

/// Receives panel events and notifications from the orchestrator
pub trait DisplaySink: Send + Sync {
    /// Deliver one panel event
    fn dispatch(&self, event: DisplayEvent);

    /// Show a one-line notice outside the panel
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => info!(message = %notification.message, "Notification"),
            NotificationLevel::Error => error!(message = %notification.message, "Notification"),
        }
    }

    fn show_loading(&self) {
        self.dispatch(DisplayEvent::Loading);
    }

    fn append_log(&self, text: &str) {
        self.dispatch(DisplayEvent::log(text));
    }

    fn clear_log(&self) {
        self.dispatch(DisplayEvent::LogCleared);
    }

    fn show_artifact(&self, locator: &str) {
        self.dispatch(DisplayEvent::artifact(locator));
    }
}

/// Output style for the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SinkFormat {
    /// Human-readable terminal output
    #[default]
    Console,

    /// One JSON panel message per line on stdout
    Jsonl,
}
