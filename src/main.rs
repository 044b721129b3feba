use anyhow::Result;
use eframe::egui;
use log::{error, info};

use broadcastme::paths::resolve_default_directory;
use broadcastme::screen::ScreenshotSource;
use broadcastme::video::FfmpegSinkFactory;
use broadcastme::{BroadcastMeApp, Config, Controller, RecordingSession};

fn main() -> Result<()> {
    // Initialize logging (default to info if RUST_LOG is not set)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting BroadcastMe");

    let config = Config::default();
    let output_dir = match resolve_default_directory(&config) {
        Ok(dir) => dir,
        Err(err) => {
            error!("Cannot prepare output folder: {}", err);
            rfd::MessageDialog::new()
                .set_level(rfd::MessageLevel::Error)
                .set_title("Error")
                .set_description(err.to_string())
                .set_buttons(rfd::MessageButtons::Ok)
                .show();
            std::process::exit(1);
        }
    };
    info!("Saving recordings to {}", output_dir.display());

    let session = RecordingSession::new(
        config.clone(),
        output_dir,
        Box::new(ScreenshotSource::new(config.screen_index)),
        Box::new(FfmpegSinkFactory::new(config.ffmpeg_path.clone())),
    )?;
    let controller = Controller::new(session);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([500.0, 200.0])
            .with_title("BroadcastMe - Screen Recorder"),
        ..Default::default()
    };

    if let Err(err) = eframe::run_native(
        "BroadcastMe",
        native_options,
        Box::new(move |cc| Ok(Box::new(BroadcastMeApp::new(cc, controller)))),
    ) {
        error!("Failed to launch application: {}", err);
    }

    Ok(())
}
