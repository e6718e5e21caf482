use crossbeam::channel::{bounded, Receiver, TryRecvError};
use eframe::egui;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::result_panel::ClassificationPanel;
use super::texture::{center_rect_in_rect, fit_image_in_rect, PreviewTexture};
use super::{circular_button, View};
use crate::capture::capture;
use crate::classifier::{ClassificationClient, ImagePayload};
use crate::config::CameraConfig;
use crate::media::{CaptureSession, MediaAccessError, VideoSource, VideoStream};

type OpenResult = Result<Box<dyn VideoStream>, MediaAccessError>;

const CAPTURE_BUTTON_RADIUS: f32 = 44.0;

/// Live camera view. The session is opened on mount and closed on unmount.
pub struct CameraView {
    source: Arc<dyn VideoSource>,
    session: CaptureSession,
    pending_open: Option<Receiver<OpenResult>>,
    open_task: Option<JoinHandle<()>>,
    panel: ClassificationPanel,
    preview: PreviewTexture,
    last_preview: Option<Instant>,
    preview_interval: Duration,
    jpeg_quality: u8,
}

impl CameraView {
    pub fn new(source: Arc<dyn VideoSource>, config: &CameraConfig) -> Self {
        Self {
            source,
            session: CaptureSession::new(),
            pending_open: None,
            open_task: None,
            panel: ClassificationPanel::new(),
            preview: PreviewTexture::new("camera_preview"),
            last_preview: None,
            preview_interval: Duration::from_millis(config.preview_interval_ms),
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_active()
    }

    pub fn is_opening(&self) -> bool {
        self.pending_open.is_some()
    }

    pub fn mount(&mut self, runtime: &Handle, ctx: &egui::Context) {
        log::info!("Opening camera ({})", self.source.name());
        self.cancel_open();
        self.panel.reset();

        let (tx, rx) = bounded::<OpenResult>(1);
        let source = Arc::clone(&self.source);
        let ctx = ctx.clone();
        let task = runtime.spawn(async move {
            let result = source.request_video_stream().await;
            // If the view is gone the stream comes back here and is dropped, stopping it
            if let Err(returned) = tx.send(result) {
                drop(returned.into_inner());
                log::info!("Camera opened after the view was closed; released it");
            }
            ctx.request_repaint();
        });
        self.pending_open = Some(rx);
        self.open_task = Some(task);
    }

    // Aborting drops the request future, and with it any stream it already holds
    fn cancel_open(&mut self) {
        self.pending_open = None;
        if let Some(task) = self.open_task.take() {
            if !task.is_finished() {
                log::info!("Abandoning camera open in progress");
            }
            task.abort();
        }
    }

    /// Releases the camera before returning.
    pub fn unmount(&mut self) {
        self.cancel_open();
        self.session.close();
        self.panel.reset();
        self.preview.clear();
        self.last_preview = None;
    }

    pub fn poll(&mut self) {
        if let Some(rx) = &self.pending_open {
            match rx.try_recv() {
                Ok(Ok(stream)) => {
                    self.session.bind(stream);
                    self.pending_open = None;
                    self.open_task = None;
                }
                Ok(Err(e)) => {
                    self.panel.report_failure(e.to_string());
                    self.pending_open = None;
                    self.open_task = None;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.panel.report_failure("Camera request ended without a stream");
                    self.pending_open = None;
                    self.open_task = None;
                }
            }
        }

        if self.session.is_bound() && !self.session.is_active() {
            log::warn!("Camera stream ended unexpectedly");
            self.session.close();
            self.preview.clear();
            // A request already in flight keeps its captured frame
            if !self.panel.is_loading() {
                self.panel.report_failure("Camera stream ended");
            }
        }
        self.panel.poll();
    }

    pub fn retry(&mut self, runtime: &Handle, ctx: &egui::Context) {
        self.cancel_open();
        self.session.close();
        self.mount(runtime, ctx);
    }

    pub fn capture_and_classify(
        &mut self,
        client: &ClassificationClient,
        runtime: &Handle,
        ctx: &egui::Context,
    ) {
        let Some(ticket) = self.panel.begin() else {
            return;
        };

        match capture(&self.session, self.jpeg_quality) {
            Ok(image) => {
                let client = client.clone();
                self.panel.spawn(ticket, runtime, ctx, async move {
                    client
                        .classify(ImagePayload::Captured(image))
                        .await
                        .map_err(|e| e.to_string())
                });
            }
            Err(e) => self.panel.fail(ticket, e.to_string()),
        }
    }

    fn update_preview(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        let due = self
            .last_preview
            .map_or(true, |last| now.duration_since(last) >= self.preview_interval);

        if due {
            if let Some(frame) = self.session.current_frame() {
                self.preview.update(ctx, &frame);
                self.last_preview = Some(now);
            }
        }
        ctx.request_repaint_after(self.preview_interval);
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        ctx: &egui::Context,
        client: &ClassificationClient,
        runtime: &Handle,
    ) -> Option<View> {
        let mut navigate = None;

        if self.session.is_active() {
            self.update_preview(ctx);
        }

        ui.horizontal(|ui| {
            if ui.button("← Back").clicked() {
                navigate = Some(View::Classify);
            }
            ui.heading("Waste Classification");
        });
        ui.separator();

        let preview_height = (ui.available_height() * 0.65).max(120.0);
        let (rect, _) = ui.allocate_exact_size(
            egui::vec2(ui.available_width(), preview_height),
            egui::Sense::hover(),
        );
        ui.painter().rect_filled(rect, 8.0, egui::Color32::from_rgb(40, 40, 40));

        match self.preview.texture() {
            Some(texture) if self.session.is_active() => {
                let display_size = fit_image_in_rect(texture.size_vec2(), rect.size());
                let centered = center_rect_in_rect(display_size, rect);
                ui.allocate_ui_at_rect(centered, |ui| {
                    ui.add(egui::Image::new(texture).fit_to_exact_size(display_size));
                });
            }
            _ => {
                let text = if self.is_opening() {
                    "Starting camera..."
                } else {
                    "No camera available"
                };
                ui.allocate_ui_at_rect(rect, |ui| {
                    ui.centered_and_justified(|ui| {
                        ui.label(text);
                    });
                });
            }
        }

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            let enabled = self.session.is_active() && !self.panel.is_loading();
            if circular_button(ui, CAPTURE_BUTTON_RADIUS, "Capture", enabled) {
                self.capture_and_classify(client, runtime, ctx);
            }
            if !self.session.is_active() && !self.is_opening() && ui.button("Retry camera").clicked() {
                self.retry(runtime, ctx);
            }
        });

        ui.add_space(8.0);
        self.panel.show(ui);

        navigate
    }
}
