use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, RgbaImage};
use log::info;
use screenshots::Screen;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Source of full-screen rasters for the capture loop.
pub trait ScreenSource {
    /// Frame dimensions the sink should be opened with.
    fn resolution(&mut self) -> Result<(u32, u32)>;

    fn capture(&mut self) -> Result<RgbaImage>;
}

pub struct ScreenshotSource {
    screen_index: Option<usize>,
    screen: Option<Screen>,
}

impl ScreenshotSource {
    /// `None` selects the primary display.
    pub fn new(screen_index: Option<usize>) -> Self {
        Self {
            screen_index,
            screen: None,
        }
    }

    fn screen(&mut self) -> Result<&Screen> {
        if self.screen.is_none() {
            let screens = catch_unwind(AssertUnwindSafe(Screen::all))
                .map_err(|_| anyhow!("Screen capture backend crashed (missing Wayland screencopy support?)"))?
                .context("Failed to enumerate screens")?;

            let screen = match self.screen_index {
                Some(index) => screens
                    .get(index)
                    .cloned()
                    .ok_or_else(|| anyhow!("Invalid screen index {}", index))?,
                None => screens
                    .iter()
                    .find(|s| s.display_info.is_primary)
                    .or_else(|| screens.first())
                    .cloned()
                    .ok_or_else(|| anyhow!("No screens detected"))?,
            };
            info!(
                "Capturing screen {} ({}x{})",
                screen.display_info.id, screen.display_info.width, screen.display_info.height
            );
            self.screen = Some(screen);
        }

        self.screen
            .as_ref()
            .ok_or_else(|| anyhow!("No screens detected"))
    }
}

impl ScreenSource for ScreenshotSource {
    fn resolution(&mut self) -> Result<(u32, u32)> {
        // Re-enumerate so a monitor change between sessions is picked up.
        self.screen = None;
        let image = self
            .capture()
            .context("Failed to capture screen to determine resolution")?;
        Ok(image.dimensions())
    }

    fn capture(&mut self) -> Result<RgbaImage> {
        let screen = self.screen()?;
        let image = catch_unwind(AssertUnwindSafe(|| screen.capture()))
            .map_err(|_| anyhow!("Screen capture unsupported by compositor (missing ZwlrScreencopy?)"))?
            .context("Failed to capture screen")?;

        let (width, height) = image.dimensions();
        ImageBuffer::from_raw(width, height, image.into_raw())
            .ok_or_else(|| anyhow!("Failed to create image buffer"))
    }
}
