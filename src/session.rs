use log::{debug, error, info, warn};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::RecorderError;
use crate::frame::rgba_to_bgr24;
use crate::paths::{ensure_directory, ensure_output_folder, normalize_file_name};
use crate::screen::ScreenSource;
use crate::video::{FrameSink, SinkFactory, SinkSettings};

/// Result of a rename request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The recorded file was moved on disk.
    Renamed(PathBuf),
    /// Nothing to move yet; the name is applied when the next recording stops.
    Deferred(PathBuf),
}

/// A recording that has been stopped and settled on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRecording {
    pub path: PathBuf,
    pub frames: u64,
}

struct ActiveRecording {
    sink: Box<dyn FrameSink>,
    path: PathBuf,
    dimensions: (u32, u32),
    frames: u64,
}

/// Owns recording state, the output location and the open sink.
///
/// A sink is open exactly while the session is recording.
pub struct RecordingSession {
    config: Config,
    screen: Box<dyn ScreenSource>,
    sinks: Box<dyn SinkFactory>,
    output_dir: PathBuf,
    output_path: PathBuf,
    pending_name: Option<String>,
    active: Option<ActiveRecording>,
}

impl RecordingSession {
    pub fn new(
        config: Config,
        output_dir: PathBuf,
        screen: Box<dyn ScreenSource>,
        sinks: Box<dyn SinkFactory>,
    ) -> Result<Self, RecorderError> {
        config.validate()?;
        let output_path = output_dir.join(config.default_file_name());

        Ok(Self {
            config,
            screen,
            sinks,
            output_dir,
            output_path,
            pending_name: None,
            active: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn pending_name(&self) -> Option<&str> {
        self.pending_name.as_deref()
    }

    /// Path the open sink is writing to, if recording.
    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    pub fn frames_written(&self) -> u64 {
        self.active.as_ref().map_or(0, |a| a.frames)
    }

    /// Opens a sink at `<output_dir>/<default file name>`.
    ///
    /// Returns false without side effects when already recording.
    pub fn start(&mut self) -> Result<bool, RecorderError> {
        if self.is_recording() {
            debug!("start ignored: already recording");
            return Ok(false);
        }

        ensure_directory(&self.output_dir)?;
        let path = self.output_dir.join(self.config.default_file_name());

        let dimensions = self.screen.resolution().map_err(RecorderError::Resolution)?;
        let settings = SinkSettings::from_config(&self.config, dimensions);
        let sink = self
            .sinks
            .open(&path, &settings)
            .map_err(RecorderError::Encode)?;

        info!(
            "Recording started: {} ({}x{} @ {} fps)",
            path.display(),
            dimensions.0,
            dimensions.1,
            self.config.frame_rate
        );
        self.output_path = path.clone();
        self.active = Some(ActiveRecording {
            sink,
            path,
            dimensions,
            frames: 0,
        });
        Ok(true)
    }

    /// Closes the sink and settles the file. `Ok(None)` when not recording.
    pub fn stop(&mut self) -> Result<Option<FinishedRecording>, RecorderError> {
        let Some(active) = self.active.take() else {
            debug!("stop ignored: not recording");
            return Ok(None);
        };

        let finished = active.sink.finish();
        let path = self.settle(active.path);
        let frames = finished.map_err(RecorderError::Encode)?;

        info!("Recording stopped: {} ({} frames)", path.display(), frames);
        Ok(Some(FinishedRecording { path, frames }))
    }

    /// Moves a finished file to `<output_dir>/<pending or default name>`.
    fn settle(&mut self, written: PathBuf) -> PathBuf {
        let file_name = self
            .pending_name
            .take()
            .unwrap_or_else(|| self.config.default_file_name());
        let target = self.output_dir.join(file_name);

        if target != written && target.exists() {
            warn!(
                "Not moving recording {}: {} already exists",
                written.display(),
                target.display()
            );
        } else if target != written {
            match fs::rename(&written, &target) {
                Ok(()) => {
                    info!("Moved recording {} -> {}", written.display(), target.display());
                    self.output_path = target;
                    return self.output_path.clone();
                }
                Err(e) => warn!(
                    "Could not move recording {} to {}: {}",
                    written.display(),
                    target.display(),
                    e
                ),
            }
        }

        self.output_path = written;
        self.output_path.clone()
    }

    pub fn rename(&mut self, new_name: &str) -> Result<RenameOutcome, RecorderError> {
        let file_name = normalize_file_name(new_name, &self.config.extension_suffix())?;
        let target = self.output_dir.join(&file_name);

        if self.is_recording() {
            info!("Rename to {} deferred until recording stops", file_name);
            self.pending_name = Some(file_name);
            return Ok(RenameOutcome::Deferred(target));
        }

        // fs::rename replaces an existing target; never clobber another recording
        if target != self.output_path && target.exists() {
            return Err(RecorderError::Rename {
                from: self.output_path.clone(),
                to: target,
                source: io::Error::new(ErrorKind::AlreadyExists, "a file with that name already exists"),
            });
        }

        match fs::rename(&self.output_path, &target) {
            Ok(()) => {
                info!("Renamed {} -> {}", self.output_path.display(), target.display());
                self.output_path = target.clone();
                self.pending_name = None;
                Ok(RenameOutcome::Renamed(target))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No recording at {} yet, new filename will be {}", self.output_path.display(), file_name);
                self.output_path = target.clone();
                self.pending_name = Some(file_name);
                Ok(RenameOutcome::Deferred(target))
            }
            Err(source) => Err(RecorderError::Rename {
                from: self.output_path.clone(),
                to: target,
                source,
            }),
        }
    }

    /// Switches output to `<new_dir>/<folder_name>`, creating it if needed.
    ///
    /// An open sink keeps writing where it started; the file moves on `stop`.
    pub fn change_output_directory(&mut self, new_dir: &Path) -> Result<&Path, RecorderError> {
        let folder = ensure_output_folder(new_dir, &self.config.folder_name)?;

        info!("Output path changed to {}", folder.display());
        self.output_path = folder.join(self.config.default_file_name());
        self.output_dir = folder;
        self.pending_name = None;
        Ok(&self.output_dir)
    }

    /// Captures one screenshot and appends it to the open sink.
    ///
    /// Returns false when not recording. On failure the recording is stopped.
    pub fn record_frame(&mut self) -> Result<bool, RecorderError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(false);
        };

        let (width, height) = active.dimensions;
        let written = self
            .screen
            .capture()
            .map_err(RecorderError::Capture)
            .and_then(|image| {
                let bgr = rgba_to_bgr24(&image, width, height);
                active.sink.write_frame(&bgr).map_err(RecorderError::Encode)
            });

        match written {
            Ok(()) => {
                active.frames += 1;
                debug!("Frame {} written", active.frames);
                Ok(true)
            }
            Err(err) => {
                error!("Frame capture failed, stopping recording: {}", err);
                if let Err(stop_err) = self.stop() {
                    error!("Failed to finalize recording: {}", stop_err);
                }
                Err(err)
            }
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!("Failed to finalize recording on exit: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeScreen, FakeSinkFactory};
    use anyhow::Result;
    use tempfile::TempDir;

    // session drops first so it finalizes before the temp dir goes away
    struct Harness {
        session: RecordingSession,
        screen: FakeScreen,
        sinks: FakeSinkFactory,
        docs: TempDir,
    }

    fn harness() -> Result<Harness> {
        let docs = tempfile::tempdir()?;
        let config = Config::default();
        let dir = ensure_output_folder(docs.path(), &config.folder_name)?;
        let screen = FakeScreen::new(64, 48);
        let sinks = FakeSinkFactory::new();
        let session = RecordingSession::new(
            config,
            dir,
            Box::new(screen.clone()),
            Box::new(sinks.clone()),
        )?;
        Ok(Harness {
            docs,
            screen,
            sinks,
            session,
        })
    }

    #[test]
    fn five_ticks_produce_five_frames_at_screen_resolution() -> Result<()> {
        let mut h = harness()?;
        let expected = h.docs.path().join("BroadcastME").join("broadcastme_recorded.avi");

        assert!(h.session.start()?);
        assert_eq!(h.session.active_path(), Some(expected.as_path()));
        for _ in 0..5 {
            assert!(h.session.record_frame()?);
        }
        let finished = h.session.stop()?.expect("recording was active");

        assert_eq!(finished.path, expected);
        assert_eq!(finished.frames, 5);
        let sink = h.sinks.last().expect("sink opened");
        assert_eq!(sink.path, expected);
        let settings = sink.settings.expect("settings recorded");
        assert_eq!((settings.width, settings.height), (64, 48));
        assert_eq!(settings.frame_rate, 10);
        assert_eq!(settings.codec_tag, "XVID");
        assert!(sink.frames.iter().all(|f| f.len() == 64 * 48 * 3));
        // red in, blue-last out
        assert_eq!(&sink.frames[0][..3], &[0, 0, 255]);
        Ok(())
    }

    #[test]
    fn start_then_stop_leaves_empty_container() -> Result<()> {
        let mut h = harness()?;
        h.session.start()?;
        let finished = h.session.stop()?.expect("recording was active");

        assert!(!h.session.is_recording());
        assert_eq!(finished.frames, 0);
        assert!(finished.path.exists());
        assert!(h.sinks.last().map_or(false, |s| s.finished));
        Ok(())
    }

    #[test]
    fn start_while_recording_opens_no_second_sink() -> Result<()> {
        let mut h = harness()?;
        assert!(h.session.start()?);
        assert!(!h.session.start()?);
        assert_eq!(h.sinks.open_count(), 1);
        Ok(())
    }

    #[test]
    fn stop_when_idle_is_noop() -> Result<()> {
        let mut h = harness()?;
        let before = h.session.output_path().to_path_buf();
        assert!(h.session.stop()?.is_none());
        assert_eq!(h.session.output_path(), before);
        assert_eq!(h.sinks.open_count(), 0);
        Ok(())
    }

    #[test]
    fn record_frame_when_idle_captures_nothing() -> Result<()> {
        let mut h = harness()?;
        assert!(!h.session.record_frame()?);
        assert_eq!(h.screen.capture_count(), 0);
        Ok(())
    }

    #[test]
    fn failed_open_keeps_session_idle() -> Result<()> {
        let mut h = harness()?;
        h.sinks.set_fail_open(true);
        assert!(matches!(h.session.start(), Err(RecorderError::Encode(_))));
        assert!(!h.session.is_recording());
        Ok(())
    }

    #[test]
    fn rename_before_any_recording_is_deferred() -> Result<()> {
        let mut h = harness()?;
        let outcome = h.session.rename("demo")?;

        let target = h.session.output_dir().join("demo.avi");
        assert_eq!(outcome, RenameOutcome::Deferred(target.clone()));
        assert_eq!(h.session.output_path(), target);
        assert_eq!(h.session.pending_name(), Some("demo.avi"));
        assert!(!target.exists());
        Ok(())
    }

    #[test]
    fn deferred_name_applies_when_next_recording_stops() -> Result<()> {
        let mut h = harness()?;
        h.session.rename("talk")?;
        h.session.start()?;
        h.session.record_frame()?;
        let finished = h.session.stop()?.expect("recording was active");

        let target = h.session.output_dir().join("talk.avi");
        assert_eq!(finished.path, target);
        assert!(target.exists());
        assert!(!h.session.output_dir().join("broadcastme_recorded.avi").exists());
        assert_eq!(h.session.pending_name(), None);
        Ok(())
    }

    #[test]
    fn rename_after_recording_moves_file() -> Result<()> {
        let mut h = harness()?;
        h.session.start()?;
        let old = h.session.stop()?.expect("recording was active").path;

        let outcome = h.session.rename("final.avi")?;
        let target = h.session.output_dir().join("final.avi");
        assert_eq!(outcome, RenameOutcome::Renamed(target.clone()));
        assert!(target.exists());
        assert!(!old.exists());
        assert_eq!(h.session.output_path(), target);
        Ok(())
    }

    #[test]
    fn empty_rename_is_a_warning_and_changes_nothing() -> Result<()> {
        let mut h = harness()?;
        let before = h.session.output_path().to_path_buf();

        let err = h.session.rename("   ").unwrap_err();
        assert!(err.is_warning());
        assert_eq!(h.session.output_path(), before);
        Ok(())
    }

    #[test]
    fn rename_failure_leaves_path_unchanged() -> Result<()> {
        let mut h = harness()?;
        h.session.start()?;
        h.session.stop()?;
        let before = h.session.output_path().to_path_buf();

        // a non-empty directory cannot be replaced by a file
        let blocker = h.session.output_dir().join("taken.avi");
        fs::create_dir(&blocker)?;
        fs::write(blocker.join("inner"), b"x")?;

        let err = h.session.rename("taken").unwrap_err();
        assert!(matches!(err, RecorderError::Rename { .. }));
        assert!(!err.is_warning());
        assert_eq!(h.session.output_path(), before);
        assert!(before.exists());
        Ok(())
    }

    #[test]
    fn rename_onto_existing_recording_is_refused() -> Result<()> {
        let mut h = harness()?;
        let keep = h.session.output_dir().join("keep.avi");
        fs::write(&keep, b"PRECIOUS")?;
        h.session.start()?;
        h.session.stop()?;
        let before = h.session.output_path().to_path_buf();

        let err = h.session.rename("keep").unwrap_err();
        match &err {
            RecorderError::Rename { source, .. } => assert_eq!(source.kind(), ErrorKind::AlreadyExists),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read(&keep)?, b"PRECIOUS");
        assert_eq!(h.session.output_path(), before);
        assert!(before.exists());
        Ok(())
    }

    #[test]
    fn settle_keeps_file_in_place_when_target_exists() -> Result<()> {
        let mut h = harness()?;
        h.session.start()?;
        let written = h.session.active_path().map(Path::to_path_buf).expect("active");
        h.session.rename("keep")?;
        let keep = h.session.output_dir().join("keep.avi");
        fs::write(&keep, b"PRECIOUS")?;

        let finished = h.session.stop()?.expect("recording was active");
        assert_eq!(finished.path, written);
        assert!(written.exists());
        assert_eq!(fs::read(&keep)?, b"PRECIOUS");
        assert_eq!(h.session.pending_name(), None);
        Ok(())
    }

    #[test]
    fn change_output_directory_creates_subfolder() -> Result<()> {
        let mut h = harness()?;
        let other = tempfile::tempdir()?;

        let folder = h.session.change_output_directory(other.path())?.to_path_buf();
        assert_eq!(folder, other.path().join("BroadcastME"));
        assert!(folder.is_dir());
        assert_eq!(h.session.output_path(), folder.join("broadcastme_recorded.avi"));

        h.session.start()?;
        assert_eq!(
            h.session.active_path(),
            Some(folder.join("broadcastme_recorded.avi").as_path())
        );
        Ok(())
    }

    #[test]
    fn mid_session_directory_change_moves_file_on_stop() -> Result<()> {
        let mut h = harness()?;
        let other = tempfile::tempdir()?;
        h.session.start()?;
        let written = h.session.active_path().map(Path::to_path_buf).expect("active");

        h.session.change_output_directory(other.path())?;
        assert_eq!(h.session.active_path(), Some(written.as_path()));
        h.session.record_frame()?;
        let finished = h.session.stop()?.expect("recording was active");

        let target = other.path().join("BroadcastME").join("broadcastme_recorded.avi");
        assert_eq!(finished.path, target);
        assert!(target.exists());
        assert!(!written.exists());
        Ok(())
    }

    #[test]
    fn mid_session_rename_does_not_touch_open_file() -> Result<()> {
        let mut h = harness()?;
        h.session.start()?;
        let written = h.session.active_path().map(Path::to_path_buf).expect("active");

        let outcome = h.session.rename("live")?;
        assert!(matches!(outcome, RenameOutcome::Deferred(_)));
        assert!(written.exists());

        let finished = h.session.stop()?.expect("recording was active");
        assert_eq!(finished.path, h.session.output_dir().join("live.avi"));
        Ok(())
    }

    #[test]
    fn capture_failure_stops_recording() -> Result<()> {
        let mut h = harness()?;
        h.session.start()?;
        h.session.record_frame()?;
        h.screen.set_fail_capture(true);

        let err = h.session.record_frame().unwrap_err();
        assert!(matches!(err, RecorderError::Capture(_)));
        assert!(!h.session.is_recording());
        let sink = h.sinks.last().expect("sink opened");
        assert!(sink.finished);
        assert_eq!(sink.frames.len(), 1);
        Ok(())
    }

    #[test]
    fn write_failure_stops_recording() -> Result<()> {
        let mut h = harness()?;
        h.session.start()?;
        h.sinks.set_fail_write(true);

        assert!(matches!(h.session.record_frame(), Err(RecorderError::Encode(_))));
        assert!(!h.session.is_recording());
        Ok(())
    }
}
