// Fake capture and encoding backends for tests that run without a display or ffmpeg.

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::screen::ScreenSource;
use crate::video::{FrameSink, SinkFactory, SinkSettings};

/// Screen that returns solid frames of a fixed size.
#[derive(Debug, Clone)]
pub struct FakeScreen {
    width: u32,
    height: u32,
    fail_capture: Arc<AtomicBool>,
    captures: Arc<AtomicU32>,
}

impl FakeScreen {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fail_capture: Arc::new(AtomicBool::new(false)),
            captures: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn set_fail_capture(&self, fail: bool) {
        self.fail_capture.store(fail, Ordering::SeqCst);
    }

    pub fn capture_count(&self) -> u32 {
        self.captures.load(Ordering::SeqCst)
    }
}

impl ScreenSource for FakeScreen {
    fn resolution(&mut self) -> Result<(u32, u32)> {
        Ok((self.width, self.height))
    }

    fn capture(&mut self) -> Result<RgbaImage> {
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(anyhow!("fake capture failure"));
        }
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(RgbaImage::from_pixel(self.width, self.height, Rgba([255, 0, 0, 255])))
    }
}

/// What a fake sink saw during one recording.
#[derive(Debug, Clone, Default)]
pub struct RecordedSink {
    pub path: PathBuf,
    pub settings: Option<SinkSettings>,
    pub frames: Vec<Vec<u8>>,
    pub finished: bool,
}

/// Sink factory that creates the output file and keeps every frame in memory.
#[derive(Debug, Clone, Default)]
pub struct FakeSinkFactory {
    sinks: Arc<Mutex<Vec<Arc<Mutex<RecordedSink>>>>>,
    fail_open: Arc<AtomicBool>,
    fail_write: Arc<AtomicBool>,
}

impl FakeSinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    pub fn last(&self) -> Option<RecordedSink> {
        self.sinks.lock().last().map(|sink| sink.lock().clone())
    }
}

impl SinkFactory for FakeSinkFactory {
    fn open(&self, path: &Path, settings: &SinkSettings) -> Result<Box<dyn FrameSink>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(anyhow!("fake encoder unavailable"));
        }
        fs::write(path, b"RIFF")?;

        let record = Arc::new(Mutex::new(RecordedSink {
            path: path.to_path_buf(),
            settings: Some(settings.clone()),
            ..RecordedSink::default()
        }));
        self.sinks.lock().push(Arc::clone(&record));

        Ok(Box::new(FakeSink {
            record,
            fail_write: Arc::clone(&self.fail_write),
        }))
    }
}

struct FakeSink {
    record: Arc<Mutex<RecordedSink>>,
    fail_write: Arc<AtomicBool>,
}

impl FrameSink for FakeSink {
    fn write_frame(&mut self, bgr: &[u8]) -> Result<()> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(anyhow!("fake write failure"));
        }
        self.record.lock().frames.push(bgr.to_vec());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<u64> {
        let mut record = self.record.lock();
        record.finished = true;
        Ok(record.frames.len() as u64)
    }
}
