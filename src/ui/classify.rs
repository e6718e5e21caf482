use eframe::egui;
use std::path::PathBuf;
use tokio::runtime::Handle;

use super::result_panel::ClassificationPanel;
use super::View;
use crate::classifier::{ClassificationClient, ImagePayload};

const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

pub struct ClassifyView {
    panel: ClassificationPanel,
    last_upload: Option<PathBuf>,
}

impl ClassifyView {
    pub fn new() -> Self {
        Self {
            panel: ClassificationPanel::new(),
            last_upload: None,
        }
    }

    pub fn poll(&mut self) {
        self.panel.poll();
    }

    pub fn reset(&mut self) {
        self.panel.reset();
    }

    pub fn upload(
        &mut self,
        path: PathBuf,
        client: &ClassificationClient,
        runtime: &Handle,
        ctx: &egui::Context,
    ) {
        let Some(ticket) = self.panel.begin() else {
            return;
        };
        log::info!("Uploading {}", path.display());
        self.last_upload = Some(path.clone());

        let client = client.clone();
        self.panel.spawn(ticket, runtime, ctx, async move {
            let payload = ImagePayload::from_path(&path)
                .await
                .map_err(|e| format!("Could not read {}: {}", path.display(), e))?;
            client.classify(payload).await.map_err(|e| e.to_string())
        });
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        ctx: &egui::Context,
        client: &ClassificationClient,
        runtime: &Handle,
    ) -> Option<View> {
        let mut navigate = None;
        let mut picked = None;

        ui.vertical_centered(|ui| {
            ui.heading("Classify Waste");
        });
        ui.add_space(12.0);

        ui.columns(2, |columns| {
            egui::Frame::group(columns[0].style()).show(&mut columns[0], |ui| {
                ui.vertical_centered(|ui| {
                    ui.strong("Upload Image");
                    ui.add_space(8.0);
                    let button = egui::Button::new("Choose image...");
                    if ui.add_enabled(!self.panel.is_loading(), button).clicked() {
                        picked = rfd::FileDialog::new()
                            .add_filter("Image Files", &IMAGE_EXTENSIONS)
                            .pick_file();
                    }
                    if let Some(name) = self.last_upload.as_ref().and_then(|p| p.file_name()) {
                        ui.weak(name.to_string_lossy().into_owned());
                    }
                });
            });

            egui::Frame::group(columns[1].style()).show(&mut columns[1], |ui| {
                ui.vertical_centered(|ui| {
                    ui.strong("Live Camera");
                    ui.add_space(8.0);
                    if ui.button("Open Camera").clicked() {
                        navigate = Some(View::Camera);
                    }
                });
            });
        });

        if let Some(path) = picked {
            self.upload(path, client, runtime, ctx);
        }

        ui.add_space(12.0);
        self.panel.show(ui);

        navigate
    }
}

impl Default for ClassifyView {
    fn default() -> Self {
        Self::new()
    }
}
