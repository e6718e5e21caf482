use eframe::egui;
use log::info;
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::classifier::ClassificationClient;
use crate::config::Config;
use crate::media::VideoSource;

pub mod camera;
pub mod classify;
pub mod home;
pub mod result_panel;
pub mod texture;

use camera::CameraView;
use classify::ClassifyView;
use home::HomeView;

// ============================================================================
// ROUTING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Classify,
    Camera,
}

impl View {
    pub fn title(&self) -> &'static str {
        match self {
            View::Home => "Home",
            View::Classify => "Classify",
            View::Camera => "Camera",
        }
    }

    pub fn all() -> [View; 3] {
        [View::Home, View::Classify, View::Camera]
    }
}

// ============================================================================
// MAIN APP STRUCT
// ============================================================================

pub struct WasteClassifierApp {
    current_view: View,
    home: HomeView,
    classify: ClassifyView,
    camera: CameraView,
    client: ClassificationClient,
    runtime: Handle,
}

impl WasteClassifierApp {
    pub fn new(
        config: &Config,
        client: ClassificationClient,
        video_source: Arc<dyn VideoSource>,
        runtime: Handle,
    ) -> Self {
        Self {
            current_view: View::Home,
            home: HomeView::new(),
            classify: ClassifyView::new(),
            camera: CameraView::new(video_source, &config.camera),
            client,
            runtime,
        }
    }

    /// Runs the exit step of the current view, then the entry step of the next.
    pub fn navigate(&mut self, ctx: &egui::Context, to: View) {
        if to == self.current_view {
            return;
        }
        info!("Navigating {:?} -> {:?}", self.current_view, to);

        match self.current_view {
            View::Home => {}
            View::Classify => self.classify.reset(),
            View::Camera => self.camera.unmount(),
        }

        self.current_view = to;

        match to {
            View::Home => self.home.restart(),
            View::Classify => {}
            View::Camera => self.camera.mount(&self.runtime, ctx),
        }
    }

    fn render_nav_bar(&mut self, ctx: &egui::Context) {
        let mut target = None;
        egui::TopBottomPanel::top("nav_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Waste Classifier");
                ui.separator();
                for view in View::all() {
                    if ui
                        .selectable_label(self.current_view == view, view.title())
                        .clicked()
                    {
                        target = Some(view);
                    }
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.weak(self.client.endpoint().as_str());
                });
            });
        });

        if let Some(view) = target {
            self.navigate(ctx, view);
        }
    }
}

// ============================================================================
// MAIN UPDATE LOOP
// ============================================================================

impl eframe::App for WasteClassifierApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ESC key to exit (for kiosk mode with keyboard)
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        self.classify.poll();
        self.camera.poll();

        self.render_nav_bar(ctx);

        let navigate = egui::CentralPanel::default()
            .show(ctx, |ui| match self.current_view {
                View::Home => self.home.show(ui, ctx),
                View::Classify => self.classify.show(ui, ctx, &self.client, &self.runtime),
                View::Camera => self.camera.show(ui, ctx, &self.client, &self.runtime),
            })
            .inner;

        if let Some(view) = navigate {
            self.navigate(ctx, view);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.camera.unmount();
        info!("Camera released on exit");
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Round touch button; returns true when clicked while enabled.
pub fn circular_button(ui: &mut egui::Ui, radius: f32, text: &str, enabled: bool) -> bool {
    let size = egui::vec2(radius * 2.0, radius * 2.0);
    let sense = if enabled {
        egui::Sense::click()
    } else {
        egui::Sense::hover()
    };
    let (rect, response) = ui.allocate_exact_size(size, sense);

    if ui.is_rect_visible(rect) {
        let painter = ui.painter();
        let center = rect.center();
        let base_fill = egui::Color32::from_rgb(70, 130, 90);

        let (fill_color, stroke_color) = if !enabled {
            (egui::Color32::from_rgb(80, 80, 85), egui::Color32::from_rgb(100, 100, 110))
        } else if response.is_pointer_button_down_on() {
            let r = base_fill.r().saturating_sub(30);
            let g = base_fill.g().saturating_sub(30);
            let b = base_fill.b().saturating_sub(30);
            (egui::Color32::from_rgb(r, g, b), egui::Color32::from_rgb(120, 120, 130))
        } else if response.hovered() {
            let r = base_fill.r().saturating_add(20);
            let g = base_fill.g().saturating_add(20);
            let b = base_fill.b().saturating_add(20);
            (egui::Color32::from_rgb(r, g, b), egui::Color32::from_rgb(150, 150, 160))
        } else {
            (base_fill, egui::Color32::from_rgb(100, 100, 110))
        };

        // Shadow for depth
        painter.circle(
            center + egui::vec2(3.0, 3.0),
            radius,
            egui::Color32::from_black_alpha(80),
            egui::Stroke::NONE,
        );
        painter.circle(center, radius, fill_color, egui::Stroke::new(3.0, stroke_color));

        let font_id = egui::FontId::proportional(radius / 3.0);
        let galley = painter.layout_no_wrap(text.to_string(), font_id, egui::Color32::WHITE);
        let text_pos = center - galley.size() / 2.0;
        painter.galley(text_pos, galley);

        if enabled && response.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }
    }

    enabled && response.clicked()
}
