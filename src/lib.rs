pub mod commands;
pub mod config;
pub mod error;
pub mod forms;
pub mod frame;
pub mod gui;
pub mod paths;
pub mod runtime;
pub mod schedule;
pub mod screen;
pub mod session;
pub mod video;

#[cfg(test)]
mod testing;

// Re-export main types
pub use commands::{AppCommand, Controller, Notice};
pub use config::Config;
pub use error::RecorderError;
pub use gui::BroadcastMeApp;
pub use session::RecordingSession;
