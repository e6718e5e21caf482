use crossbeam::channel::{unbounded, Receiver, Sender};
use eframe::egui;
use std::future::Future;
use tokio::runtime::Handle;

use crate::classifier::ClassificationResult;
use crate::presentation::{Presentation, PresentationState, ResultView, Ticket};

type Outcome = (Ticket, Result<ClassificationResult, String>);

const ERROR_COLOR: egui::Color32 = egui::Color32::from_rgb(200, 60, 60);
const SUCCESS_COLOR: egui::Color32 = egui::Color32::from_rgb(60, 150, 80);

/// Per-view owner of the presentation state and its in-flight request.
pub struct ClassificationPanel {
    presentation: Presentation,
    outcome_tx: Sender<Outcome>,
    outcome_rx: Receiver<Outcome>,
}

impl ClassificationPanel {
    pub fn new() -> Self {
        let (outcome_tx, outcome_rx) = unbounded();
        Self {
            presentation: Presentation::new(),
            outcome_tx,
            outcome_rx,
        }
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn is_loading(&self) -> bool {
        self.presentation.is_loading()
    }

    /// Enters `Loading`, or returns `None` while a request is already running.
    pub fn begin(&mut self) -> Option<Ticket> {
        self.presentation.submit().ok()
    }

    pub fn fail(&mut self, ticket: Ticket, message: String) {
        self.presentation.resolve(ticket, Err(message));
    }

    pub fn report_failure(&mut self, message: impl Into<String>) {
        self.presentation.report_failure(message);
    }

    pub fn reset(&mut self) {
        self.presentation.reset();
    }

    /// Runs `work` on the runtime and feeds its outcome back on a later frame.
    pub fn spawn<F>(&self, ticket: Ticket, runtime: &Handle, ctx: &egui::Context, work: F)
    where
        F: Future<Output = Result<ClassificationResult, String>> + Send + 'static,
    {
        let tx = self.outcome_tx.clone();
        let ctx = ctx.clone();
        runtime.spawn(async move {
            let outcome = work.await;
            if tx.send((ticket, outcome)).is_err() {
                log::debug!("Classification finished after its view was dropped");
            }
            ctx.request_repaint();
        });
    }

    /// Applies every outcome that arrived since the last frame.
    pub fn poll(&mut self) {
        while let Ok((ticket, outcome)) = self.outcome_rx.try_recv() {
            self.presentation.resolve(ticket, outcome);
        }
    }

    pub fn show(&self, ui: &mut egui::Ui) {
        match self.presentation.state() {
            PresentationState::Idle => {}
            PresentationState::Loading => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Classifying...");
                });
            }
            PresentationState::Error(message) => {
                egui::Frame::group(ui.style()).show(ui, |ui| {
                    ui.colored_label(ERROR_COLOR, format!("Error: {}", message));
                });
            }
            PresentationState::Success(result) => {
                let view = ResultView::new(result);
                egui::Frame::group(ui.style()).show(ui, |ui| {
                    ui.heading("Classification Result:");
                    ui.label(&view.class_line);
                    let color = if result.biodegradable {
                        SUCCESS_COLOR
                    } else {
                        ui.visuals().text_color()
                    };
                    ui.colored_label(color, &view.biodegradable_line);
                    if let Some(lines) = &view.nutrient_lines {
                        ui.add_space(6.0);
                        ui.strong("Nutrient Levels:");
                        for line in lines {
                            ui.label(format!("• {}", line));
                        }
                    }
                    if let Some(at) = self.presentation.resolved_at() {
                        ui.add_space(4.0);
                        ui.weak(format!("Classified at {}", at.format("%H:%M:%S")));
                    }
                });
            }
        }
    }
}

impl Default for ClassificationPanel {
    fn default() -> Self {
        Self::new()
    }
}
