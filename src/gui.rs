use egui::{Align2, CentralPanel, Color32, RichText, Stroke, TopBottomPanel};
use log::{info, warn};
use std::path::PathBuf;
use std::task::Poll;
use std::time::{Duration, Instant};
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::commands::{AppCommand, Controller, Notice};
use crate::forms::ModalForm;
use crate::runtime::runtime_handle;

#[derive(Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Start,
    Stop,
    Rename,
    ChangeOutputPath,
    About,
}

/// A folder chooser running on a blocking worker so capture ticks keep firing.
pub struct FolderRequest {
    receiver: oneshot::Receiver<Option<PathBuf>>,
}

impl FolderRequest {
    pub fn spawn<F>(start_dir: PathBuf, pick: F) -> Self
    where
        F: FnOnce(PathBuf) -> Option<PathBuf> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        runtime_handle().spawn_blocking(move || {
            let _ = sender.send(pick(start_dir));
        });
        Self { receiver }
    }

    /// `Ready(None)` when the dialog was cancelled or its worker died.
    pub fn poll(&mut self) -> Poll<Option<PathBuf>> {
        match self.receiver.try_recv() {
            Ok(picked) => Poll::Ready(picked),
            Err(TryRecvError::Empty) => Poll::Pending,
            Err(TryRecvError::Closed) => {
                warn!("Folder picker ended without a result");
                Poll::Ready(None)
            }
        }
    }
}

fn native_folder_dialog(start_dir: PathBuf) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select Output Folder")
        .set_directory(start_dir)
        .pick_folder()
}

pub struct BroadcastMeApp {
    controller: Controller,
    form: Option<ModalForm>,
    notice: Option<Notice>,
    folder_request: Option<FolderRequest>,
}

impl BroadcastMeApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, controller: Controller) -> Self {
        Self {
            controller,
            form: None,
            notice: None,
            folder_request: None,
        }
    }

    fn run(&mut self, command: AppCommand) {
        info!("Command: {:?}", command);
        match self.controller.dispatch(command, Instant::now()) {
            Notice::Status(_) => {}
            notice => self.notice = Some(notice),
        }
    }

    fn handle_menu(&mut self, action: MenuAction) {
        match action {
            MenuAction::Start => self.run(AppCommand::StartRecording),
            MenuAction::Stop => self.run(AppCommand::StopRecording),
            MenuAction::Rename => {
                let current = self
                    .controller
                    .session()
                    .output_path()
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.form = Some(ModalForm::rename(&current));
            }
            MenuAction::ChangeOutputPath => self.pick_output_directory(),
            MenuAction::About => self.form = Some(ModalForm::about()),
        }
    }

    fn pick_output_directory(&mut self) {
        if self.folder_request.is_some() {
            return;
        }
        let start_dir = self.controller.session().output_dir().to_path_buf();
        self.folder_request = Some(FolderRequest::spawn(start_dir, native_folder_dialog));
    }

    fn poll_folder_request(&mut self, ctx: &egui::Context) {
        let Some(request) = self.folder_request.as_mut() else {
            return;
        };

        match request.poll() {
            Poll::Pending => ctx.request_repaint_after(Duration::from_millis(100)),
            Poll::Ready(picked) => {
                self.folder_request = None;
                if let Some(dir) = picked {
                    self.run(AppCommand::ChangeOutputPath(dir));
                }
            }
        }
    }

    fn draw_form(&mut self, ctx: &egui::Context) {
        let Some(form) = self.form.as_mut() else {
            return;
        };

        let mut open = true;
        let mut confirmed = false;
        egui::Window::new(form.title.clone())
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label(form.prompt.as_str());
                if let Some(input) = form.input.as_mut() {
                    let response = ui.text_edit_singleline(input);
                    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                        confirmed = true;
                    }
                }
                if ui.button(form.confirm_label.as_str()).clicked() {
                    confirmed = true;
                }
            });

        if confirmed {
            if let Some(command) = self.form.take().and_then(ModalForm::confirm) {
                self.run(command);
            }
        } else if !open {
            self.form = None;
        }
    }

    fn draw_notice(&mut self, ctx: &egui::Context) {
        let (title, text, color) = match &self.notice {
            Some(Notice::Warning(text)) => ("Warning", text.clone(), Color32::from_rgb(255, 180, 0)),
            Some(Notice::Error(text)) => ("Error", text.clone(), Color32::from_rgb(240, 71, 71)),
            Some(Notice::Status(text)) => ("BroadcastMe", text.clone(), Color32::WHITE),
            None => return,
        };

        let mut dismissed = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.colored_label(color, text);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });

        if dismissed {
            self.notice = None;
        }
    }
}

impl eframe::App for BroadcastMeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_style(broadcast_style());

        if let Some(notice) = self.controller.tick(Instant::now()) {
            self.notice = Some(notice);
        }

        let mut clicked = None;
        TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Start Recording").clicked() {
                        clicked = Some(MenuAction::Start);
                    }
                    if ui.button("Stop Recording").clicked() {
                        clicked = Some(MenuAction::Stop);
                    }
                    if ui.button("Rename").clicked() {
                        clicked = Some(MenuAction::Rename);
                    }
                    if ui.button("Change Output Path").clicked() {
                        clicked = Some(MenuAction::ChangeOutputPath);
                    }
                });
                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        clicked = Some(MenuAction::About);
                    }
                });
            });
        });

        CentralPanel::default().show(ctx, |ui| {
            ui.label(
                RichText::new(self.controller.status())
                    .color(Color32::WHITE)
                    .size(16.0)
                    .strong(),
            );

            let session = self.controller.session();
            if session.is_recording() {
                ui.colored_label(
                    Color32::from_rgb(240, 71, 71),
                    format!("● REC  {} frames", session.frames_written()),
                );
            }
            ui.colored_label(
                Color32::from_rgb(185, 187, 190),
                format!("Output: {}", session.output_path().display()),
            );
        });

        if let Some(action) = clicked {
            self.handle_menu(action);
        }

        self.poll_folder_request(ctx);
        self.draw_form(ctx);
        self.draw_notice(ctx);

        if let Some(wait) = self.controller.time_until_next_tick(Instant::now()) {
            ctx.request_repaint_after(wait);
        }
    }
}

fn broadcast_style() -> egui::Style {
    let mut style = egui::Style::default();

    style.visuals.panel_fill = Color32::BLACK;
    style.visuals.window_fill = Color32::BLACK;
    style.visuals.extreme_bg_color = Color32::from_gray(128);
    style.visuals.window_stroke = Stroke::new(1.0, Color32::from_gray(90));

    style.visuals.widgets.inactive.bg_fill = Color32::DARK_GRAY;
    style.visuals.widgets.inactive.fg_stroke.color = Color32::WHITE;
    style.visuals.widgets.noninteractive.fg_stroke.color = Color32::WHITE;

    style.spacing.item_spacing = egui::Vec2::new(8.0, 8.0);
    style.spacing.window_margin = egui::Margin::same(8);

    style
}
