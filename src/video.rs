use anyhow::{anyhow, bail, Context, Result};
use log::{error, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::runtime::runtime_handle;

const STDERR_TAIL_LINES: usize = 20;
const EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Encoding parameters for one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSettings {
    pub codec_tag: String,
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
    pub quantizer: u8,
}

impl SinkSettings {
    pub fn from_config(config: &Config, (width, height): (u32, u32)) -> Self {
        Self {
            codec_tag: config.codec_tag.clone(),
            frame_rate: config.frame_rate,
            width,
            height,
            quantizer: config.get_quantizer(),
        }
    }

    /// Bytes in one BGR24 frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// An open video destination frames are appended to.
pub trait FrameSink {
    /// Appends one BGR24 frame of exactly `SinkSettings::frame_len` bytes.
    fn write_frame(&mut self, bgr: &[u8]) -> Result<()>;

    /// Flushes and closes the container, returning the number of frames written.
    fn finish(self: Box<Self>) -> Result<u64>;
}

pub trait SinkFactory {
    fn open(&self, path: &Path, settings: &SinkSettings) -> Result<Box<dyn FrameSink>>;
}

/// Spawns the system `ffmpeg` and feeds it raw frames on stdin.
pub struct FfmpegSinkFactory {
    ffmpeg_path: String,
}

impl FfmpegSinkFactory {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl SinkFactory for FfmpegSinkFactory {
    fn open(&self, path: &Path, settings: &SinkSettings) -> Result<Box<dyn FrameSink>> {
        ensure_ffmpeg_available(&self.ffmpeg_path)?;
        let sink = FfmpegSink::spawn(&self.ffmpeg_path, path, settings)?;
        Ok(Box::new(sink))
    }
}

pub struct FfmpegSink {
    path: PathBuf,
    process: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<tokio::task::JoinHandle<()>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    frame_len: usize,
    frames: u64,
}

impl FfmpegSink {
    fn spawn(ffmpeg_path: &str, path: &Path, settings: &SinkSettings) -> Result<Self> {
        let mut child = Command::new(ffmpeg_path)
            .args(ffmpeg_args(settings, path))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg process")?;

        info!(
            "ffmpeg started: {} ({}x{} @ {} fps, {})",
            path.display(),
            settings.width,
            settings.height,
            settings.frame_rate,
            settings.codec_tag
        );

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdin was not captured"))?;

        // Drain stderr in background to avoid pipe blockage
        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let stderr_task = child.stderr.take().map(|stderr| {
            let tail = Arc::clone(&stderr_tail);
            runtime_handle().spawn_blocking(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    warn!("ffmpeg: {}", line);
                    let mut tail = tail.lock();
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            })
        });

        Ok(Self {
            path: path.to_path_buf(),
            process: Some(child),
            stdin: Some(stdin),
            stderr_task,
            stderr_tail,
            frame_len: settings.frame_len(),
            frames: 0,
        })
    }

    fn stderr_summary(&self) -> String {
        let tail = self.stderr_tail.lock();
        if tail.is_empty() {
            "no output".to_string()
        } else {
            tail.iter().cloned().collect::<Vec<_>>().join("; ")
        }
    }

    /// Closes stdin and waits for ffmpeg, killing it after `EXIT_TIMEOUT`.
    fn shutdown(&mut self) -> Result<()> {
        // EOF on stdin tells ffmpeg to write the trailer
        drop(self.stdin.take());

        let Some(mut child) = self.process.take() else {
            return Ok(());
        };

        let waited = wait_with_timeout(&mut child, EXIT_TIMEOUT);
        if waited.is_err() {
            reap(&mut child);
        }

        if let Some(task) = self.stderr_task.take() {
            if let Err(e) = runtime_handle().block_on(task) {
                warn!("ffmpeg stderr reader ended abnormally: {}", e);
            }
        }

        let status = waited.context("Failed to wait for ffmpeg")?;
        if !status.success() {
            bail!(
                "ffmpeg exited with {} while writing {}: {}",
                status,
                self.path.display(),
                self.stderr_summary()
            );
        }

        info!("ffmpeg exited with status {}", status);
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, bgr: &[u8]) -> Result<()> {
        if bgr.len() != self.frame_len {
            bail!("Frame is {} bytes, expected {}", bgr.len(), self.frame_len);
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("ffmpeg input already closed"))?;
        stdin
            .write_all(bgr)
            .with_context(|| format!("ffmpeg stopped accepting frames: {}", self.stderr_summary()))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<u64> {
        self.shutdown()?;
        Ok(self.frames)
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!("Failed to stop ffmpeg process: {}", err);
        }
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }

        if Instant::now() > deadline {
            warn!("ffmpeg did not exit gracefully, sending kill signal");
            child.kill()?;
            return child.wait();
        }

        thread::sleep(Duration::from_millis(50));
    }
}

/// Last resort after a failed wait, so no zombie is left behind.
fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill ffmpeg: {}", e);
    }
    if let Err(e) = child.wait() {
        warn!("Failed to reap ffmpeg: {}", e);
    }
}

fn ensure_ffmpeg_available(path: &str) -> Result<()> {
    Command::new(path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("Failed to launch ffmpeg binary at '{}'", path))?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("ffmpeg binary '{}' returned non-zero status", path))
}

fn ffmpeg_args(settings: &SinkSettings, output: &Path) -> Vec<OsString> {
    let even_scale_filter = "scale=trunc(iw/2)*2:trunc(ih/2)*2";
    let mut args: Vec<OsString> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "warning",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "bgr24",
    ]
    .iter()
    .map(OsString::from)
    .collect();

    args.push("-video_size".into());
    args.push(format!("{}x{}", settings.width, settings.height).into());
    args.push("-framerate".into());
    args.push(settings.frame_rate.to_string().into());
    args.push("-i".into());
    args.push("-".into());
    args.push("-vf".into());
    args.push(even_scale_filter.into());
    args.push("-c:v".into());
    args.push("mpeg4".into());
    args.push("-vtag".into());
    args.push(settings.codec_tag.clone().into());
    args.push("-q:v".into());
    args.push(settings.quantizer.to_string().into());
    args.push("-pix_fmt".into());
    args.push("yuv420p".into());
    args.push(output.as_os_str().to_owned());
    args
}
