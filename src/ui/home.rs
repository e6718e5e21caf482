use eframe::egui;
use std::time::Instant;

use super::View;
use crate::tips::{TipCarousel, AUTOPLAY_INTERVAL, TIPS};

pub struct HomeView {
    carousel: TipCarousel,
}

impl HomeView {
    pub fn new() -> Self {
        Self {
            carousel: TipCarousel::new(&TIPS, AUTOPLAY_INTERVAL, Instant::now()),
        }
    }

    pub fn restart(&mut self) {
        self.carousel.select(0, Instant::now());
    }

    pub fn show(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) -> Option<View> {
        let mut navigate = None;
        let now = Instant::now();
        self.carousel.tick(now);
        ctx.request_repaint_after(self.carousel.time_until_next(now));

        ui.vertical_centered(|ui| {
            ui.heading("Welcome to Waste Classifier");
            ui.add_space(24.0);

            if let Some(tip) = self.carousel.current() {
                egui::Frame::group(ui.style())
                    .inner_margin(egui::Margin::symmetric(24.0, 16.0))
                    .show(ui, |ui| {
                        ui.set_width(ui.available_width().min(520.0));
                        ui.vertical_centered(|ui| {
                            ui.label(egui::RichText::new(tip.icon).size(48.0));
                            ui.heading(tip.title);
                            ui.label(tip.description);
                        });
                    });
            }

            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui.small_button("◀").clicked() {
                    self.carousel.show_previous(now);
                }
                for index in 0..self.carousel.len() {
                    let dot = if index == self.carousel.index() { "●" } else { "○" };
                    if ui.selectable_label(false, dot).clicked() {
                        self.carousel.select(index, now);
                    }
                }
                if ui.small_button("▶").clicked() {
                    self.carousel.show_next(now);
                }
            });

            ui.add_space(24.0);
            if ui.button("Classify Waste").clicked() {
                navigate = Some(View::Classify);
            }
        });

        navigate
    }
}

impl Default for HomeView {
    fn default() -> Self {
        Self::new()
    }
}
