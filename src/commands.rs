//! Toolkit-free dispatch of UI commands onto the recording session.

use log::{error, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::error::RecorderError;
use crate::schedule::CaptureSchedule;
use crate::session::{RecordingSession, RenameOutcome};

pub const READY_STATUS: &str = "Ready to record. Use 'File' menu to control.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    StartRecording,
    StopRecording,
    Rename(String),
    ChangeOutputPath(PathBuf),
}

/// What the UI should show after a command or tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Status(String),
    Warning(String),
    Error(String),
}

impl From<RecorderError> for Notice {
    fn from(err: RecorderError) -> Self {
        if err.is_warning() {
            Notice::Warning(err.to_string())
        } else {
            Notice::Error(err.to_string())
        }
    }
}

/// Owns the session and its capture schedule on the UI thread.
pub struct Controller {
    session: RecordingSession,
    schedule: CaptureSchedule,
    status: String,
}

impl Controller {
    pub fn new(session: RecordingSession) -> Self {
        let schedule = CaptureSchedule::new(session.config().capture_interval());
        Self {
            session,
            schedule,
            status: READY_STATUS.to_string(),
        }
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    pub fn dispatch(&mut self, command: AppCommand, now: Instant) -> Notice {
        let notice = match command {
            AppCommand::StartRecording => self.start(now),
            AppCommand::StopRecording => self.stop(),
            AppCommand::Rename(name) => self.rename(&name),
            AppCommand::ChangeOutputPath(dir) => self.change_output_path(dir),
        };

        if let Notice::Status(text) = &notice {
            self.status = text.clone();
        }
        notice
    }

    /// Runs the capture loop if a tick is due. Errors end the session.
    pub fn tick(&mut self, now: Instant) -> Option<Notice> {
        if !self.schedule.poll(now) {
            return None;
        }

        match self.session.record_frame() {
            Ok(_) => None,
            Err(err) => {
                self.schedule.stop();
                self.status = format!("Recording Stopped: {}", self.session.output_path().display());
                Some(Notice::Error(err.to_string()))
            }
        }
    }

    /// How long the event loop may sleep before the next capture.
    pub fn time_until_next_tick(&self, now: Instant) -> Option<Duration> {
        self.schedule.time_until_next(now)
    }

    fn start(&mut self, now: Instant) -> Notice {
        if self.session.is_recording() {
            return Notice::Status(self.status.clone());
        }

        match self.session.start() {
            Ok(_) => {
                self.schedule.start(now);
                Notice::Status("Recording...".to_string())
            }
            Err(err) => {
                error!("Failed to start recording: {}", err);
                err.into()
            }
        }
    }

    fn stop(&mut self) -> Notice {
        self.schedule.stop();
        match self.session.stop() {
            Ok(Some(finished)) => {
                Notice::Status(format!("Recording Stopped: {}", finished.path.display()))
            }
            Ok(None) => Notice::Status(self.status.clone()),
            Err(err) => {
                error!("Failed to stop recording: {}", err);
                self.status = format!("Recording Stopped: {}", self.session.output_path().display());
                err.into()
            }
        }
    }

    fn rename(&mut self, name: &str) -> Notice {
        match self.session.rename(name) {
            Ok(RenameOutcome::Renamed(path)) => {
                Notice::Status(format!("Filename set to: {}", display_name(&path)))
            }
            Ok(RenameOutcome::Deferred(path)) => {
                Notice::Status(format!("New filename will be: {}", display_name(&path)))
            }
            Err(err) => {
                warn!("Rename rejected: {}", err);
                err.into()
            }
        }
    }

    fn change_output_path(&mut self, dir: PathBuf) -> Notice {
        match self.session.change_output_directory(&dir) {
            Ok(folder) => Notice::Status(format!("Output path changed to: {}", folder.display())),
            Err(err) => {
                error!("Failed to change output path: {}", err);
                err.into()
            }
        }
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
