use eframe::egui;
use eframe::egui::{CentralPanel, Grid, RichText, TopBottomPanel};
use rfd::FileDialog;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use epub2mp3::config::DEFAULT_WORDS_PER_PART;
use epub2mp3::session::{run_job, CancelHandle, JobEvent, JobRequest, SessionConfig};

#[derive(Debug, Clone)]
enum JobStatus {
    Idle,
    Running,
    Completed(usize),
    Error(String),
}

/// Parameters the launcher remembers between jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct LauncherSettings {
    destination: Option<PathBuf>,
    artist: String,
    album: String,
    track: String,
    offset: usize,
    limit_end: bool,
    end: usize,
    split_parts: bool,
    words_per_part: i64,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            destination: None,
            artist: String::new(),
            album: String::new(),
            track: String::new(),
            offset: 0,
            limit_end: false,
            end: 0,
            split_parts: true,
            words_per_part: DEFAULT_WORDS_PER_PART as i64,
        }
    }
}

impl LauncherSettings {
    fn request(&self, document: PathBuf, destination: PathBuf) -> JobRequest {
        let text = |value: &str| Some(value.trim().to_string()).filter(|v| !v.is_empty());
        JobRequest {
            document,
            destination,
            artist: text(&self.artist),
            album: text(&self.album),
            track: text(&self.track),
            offset: Some(self.offset),
            end: self.limit_end.then_some(self.end),
            words_per_part: self.split_parts.then_some(self.words_per_part),
        }
    }
}

struct LauncherApp {
    document: Option<PathBuf>,
    settings: LauncherSettings,
    session_config: Result<SessionConfig, String>,
    status: JobStatus,
    log: String,
    files: Vec<PathBuf>,
    events: Option<mpsc::Receiver<JobEvent>>,
    cancel: Option<CancelHandle>,
}

impl LauncherApp {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            document: None,
            settings: LauncherSettings::default(),
            session_config: SessionConfig::sibling_converter().map_err(|e| e.to_string()),
            status: JobStatus::Idle,
            log: String::new(),
            files: Vec::new(),
            events: None,
            cancel: None,
        }
    }

    fn poll_events(&mut self) {
        let Some(receiver) = &self.events else { return };
        let mut disconnected = false;
        loop {
            match receiver.try_recv() {
                Ok(JobEvent::Log(line)) => {
                    self.log.push_str(&line);
                    self.log.push('\n');
                }
                Ok(JobEvent::Finished(Some(files))) => {
                    self.status = JobStatus::Completed(files.len());
                    self.files = files;
                }
                Ok(JobEvent::Finished(None)) => {
                    self.status = JobStatus::Error("conversion failed, see the log".into());
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            self.events = None;
            self.cancel = None;
            if matches!(self.status, JobStatus::Running) {
                self.status = JobStatus::Error("conversion stopped unexpectedly".into());
            }
        }
    }

    fn draw_file_selection(&mut self, ui: &mut egui::Ui) {
        ui.heading("📂 Files");

        Grid::new("file_grid").num_columns(3).show(ui, |ui| {
            ui.label("Input EPUB:");
            if ui.button("📖 Select EPUB File").clicked() {
                if let Some(path) = FileDialog::new()
                    .add_filter("EPUB files", &["epub"])
                    .add_filter("Text files", &["txt"])
                    .pick_file()
                {
                    self.document = Some(path);
                }
            }
            ui.label(
                self.document
                    .as_ref()
                    .and_then(|p| p.file_name())
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "No file selected".into()),
            );
            ui.end_row();

            ui.label("Save MP3s to:");
            if ui.button("📁 Select Output Folder").clicked() {
                if let Some(path) = FileDialog::new().pick_folder() {
                    self.settings.destination = Some(path);
                }
            }
            ui.label(
                self.settings
                    .destination
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "No folder selected".into()),
            );
            ui.end_row();
        });
    }

    fn draw_metadata(&mut self, ui: &mut egui::Ui) {
        ui.heading("🏷️ Tags");

        Grid::new("tag_grid").num_columns(2).show(ui, |ui| {
            ui.label("Artist:");
            ui.add(egui::TextEdit::singleline(&mut self.settings.artist).hint_text("e.g., Jane Doe"));
            ui.end_row();

            ui.label("Album Title:");
            ui.add(
                egui::TextEdit::singleline(&mut self.settings.album)
                    .hint_text("e.g., The Adventures of Alpha"),
            );
            ui.end_row();

            ui.label("Track Title:");
            ui.add(egui::TextEdit::singleline(&mut self.settings.track).hint_text("e.g., Chapter 1"));
            ui.end_row();
        });
    }

    fn draw_range(&mut self, ui: &mut egui::Ui) {
        ui.heading("✂️ Range and Parts");

        Grid::new("range_grid").num_columns(2).show(ui, |ui| {
            ui.label("Word Offset:");
            ui.add(egui::DragValue::new(&mut self.settings.offset));
            ui.end_row();

            ui.checkbox(&mut self.settings.limit_end, "End Word Offset:");
            ui.add_enabled(
                self.settings.limit_end,
                egui::DragValue::new(&mut self.settings.end),
            );
            ui.end_row();

            ui.checkbox(&mut self.settings.split_parts, "Words per Part:");
            ui.add_enabled(
                self.settings.split_parts,
                egui::DragValue::new(&mut self.settings.words_per_part),
            );
            ui.end_row();
        });
        ui.label(RichText::new("4500 words is roughly 30 minutes of audio").color(egui::Color32::GRAY));
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("🚀 Conversion");

        let running = matches!(self.status, JobStatus::Running);
        let can_start = !running
            && self.document.is_some()
            && self.settings.destination.is_some()
            && self.session_config.is_ok();

        ui.horizontal(|ui| {
            if ui
                .add_enabled(can_start, egui::Button::new("▶️ Start Conversion"))
                .clicked()
            {
                self.start_job(ui.ctx().clone());
            }
            if running && ui.button("⏹️ Stop Conversion").clicked() {
                self.stop_job();
            }
        });

        if let Err(e) = &self.session_config {
            ui.label(RichText::new(format!("❌ Converter not found: {}", e)).color(egui::Color32::RED));
        }

        match &self.status {
            JobStatus::Idle => {
                ui.label(RichText::new("Ready to convert").color(egui::Color32::GRAY));
            }
            JobStatus::Running => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(RichText::new("Converting...").color(egui::Color32::BLUE));
                });
            }
            JobStatus::Completed(count) => {
                ui.label(
                    RichText::new(format!("✅ Conversion completed: {} file(s)", count))
                        .color(egui::Color32::GREEN),
                );
            }
            JobStatus::Error(error) => {
                ui.label(RichText::new(format!("❌ Error: {}", error)).color(egui::Color32::RED));
            }
        }
    }

    fn draw_output(&mut self, ui: &mut egui::Ui) {
        ui.heading("📜 Conversion Log");
        egui::ScrollArea::vertical()
            .id_source("log_scroll")
            .max_height(240.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                ui.add(
                    egui::TextEdit::multiline(&mut self.log.as_str())
                        .font(egui::TextStyle::Monospace)
                        .desired_rows(10)
                        .desired_width(f32::INFINITY),
                );
            });

        if !self.files.is_empty() {
            ui.heading("🎧 Audiobook Files");
            for file in &self.files {
                ui.label(file.display().to_string());
            }
        }
    }

    fn start_job(&mut self, ctx: egui::Context) {
        let (Some(document), Some(destination), Ok(config)) = (
            self.document.clone(),
            self.settings.destination.clone(),
            self.session_config.clone(),
        ) else {
            return;
        };
        let request = self.settings.request(document, destination);
        let stream = run_job(&config, &request);

        let (sender, receiver) = mpsc::channel();
        self.events = Some(receiver);
        self.cancel = Some(stream.cancel_handle());
        self.log.clear();
        self.files.clear();
        self.status = JobStatus::Running;

        thread::spawn(move || {
            // Dropping the stream stops the converter and removes its working directory.
            for event in stream {
                if sender.send(event).is_err() {
                    break;
                }
                ctx.request_repaint();
            }
        });
    }

    fn stop_job(&mut self) {
        // The stream kills the converter on its next poll, even if it is silent.
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.events = None;
        self.status = JobStatus::Error("stopped by user".into());
    }

    fn save_settings(&self) {
        if let Ok(json) = serde_json::to_string_pretty(&self.settings) {
            if let Some(path) = FileDialog::new()
                .add_filter("JSON", &["json"])
                .set_file_name("epub2mp3_launcher.json")
                .save_file()
            {
                if let Err(e) = std::fs::write(&path, json) {
                    log::warn!("could not save settings to {}: {}", path.display(), e);
                }
            }
        }
    }

    fn load_settings(&mut self) {
        let Some(path) = FileDialog::new().add_filter("JSON", &["json"]).pick_file() else {
            return;
        };
        match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str::<LauncherSettings>(&content).map_err(|e| e.to_string()))
        {
            Ok(settings) => self.settings = settings,
            Err(e) => log::warn!("could not load settings from {}: {}", path.display(), e),
        }
    }
}

impl eframe::App for LauncherApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();

        TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("📚 EPUB to Audiobook Converter");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("💾 Save Settings").clicked() {
                        self.save_settings();
                    }
                    if ui.button("📁 Load Settings").clicked() {
                        self.load_settings();
                    }
                });
            });
            ui.separator();
        });

        CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.draw_file_selection(ui);
                ui.separator();
                self.draw_metadata(ui);
                ui.separator();
                self.draw_range(ui);
                ui.separator();
                self.draw_controls(ui);
                ui.separator();
                self.draw_output(ui);
            });
        });
    }
}

fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 720.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "EPUB to Audiobook Converter",
        options,
        Box::new(|cc| Box::new(LauncherApp::new(cc))),
    )
}
