use std::time::Duration;

use crate::error::RecorderError;

#[derive(Debug, Clone)]
pub struct Config {
    pub frame_rate: u32,
    pub folder_name: String,
    pub base_name: String,
    pub extension: String,
    pub codec_tag: String,
    pub video_quality: VideoQuality,
    pub screen_index: Option<usize>,
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoQuality {
    Low,
    Medium,
    High,
    Ultra,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_rate: 10,
            folder_name: "BroadcastME".to_string(),
            base_name: "broadcastme_recorded".to_string(),
            extension: "avi".to_string(),
            codec_tag: "XVID".to_string(),
            video_quality: VideoQuality::High,
            screen_index: None,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.frame_rate == 0 || self.frame_rate > 1000 {
            return Err(RecorderError::InvalidConfig(format!(
                "frame rate must be between 1 and 1000, got {}",
                self.frame_rate
            )));
        }
        if self.codec_tag.len() != 4 || !self.codec_tag.is_ascii() {
            return Err(RecorderError::InvalidConfig(format!(
                "codec tag must be four ASCII characters, got {:?}",
                self.codec_tag
            )));
        }
        if self.folder_name.is_empty() || self.base_name.is_empty() || self.extension.is_empty() {
            return Err(RecorderError::InvalidConfig(
                "folder, base name and extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Interval between capture ticks, `1000 / frame_rate` milliseconds.
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(u64::from(1000 / self.frame_rate.max(1)))
    }

    pub fn default_file_name(&self) -> String {
        format!("{}.{}", self.base_name, self.extension)
    }

    pub fn extension_suffix(&self) -> String {
        format!(".{}", self.extension)
    }

    /// mpeg4 quantizer scale passed as `-q:v` (lower is better).
    pub fn get_quantizer(&self) -> u8 {
        match self.video_quality {
            VideoQuality::Low => 10,
            VideoQuality::Medium => 6,
            VideoQuality::High => 4,
            VideoQuality::Ultra => 2,
        }
    }
}
