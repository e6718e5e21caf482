use anyhow::Result;
use eframe::egui;
use log::info;
use tokio::runtime::Handle;

use waste_classifier::classifier::ClassificationClient;
use waste_classifier::config::Config;
use waste_classifier::media::{self, VideoSource};
use waste_classifier::ui::WasteClassifierApp;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("♻ Starting Waste Classifier");

    // Load configuration
    let config = Config::load()?;
    info!(
        "Configuration loaded: endpoint {}, camera {}x{}",
        config.classifier.endpoint_url, config.camera.width, config.camera.height
    );

    // Initialize components
    let client = ClassificationClient::new(&config.classifier)?;
    let video_source = media::create_source(&config.camera);
    info!("Camera source: {}", video_source.name());
    let runtime = Handle::current();

    let mut viewport = egui::ViewportBuilder::default()
        .with_inner_size([config.display.width as f32, config.display.height as f32])
        .with_min_inner_size([480.0, 360.0]);
    if config.display.fullscreen {
        viewport = viewport
            .with_decorations(false)
            .with_fullscreen(true);
    }

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    info!("Launching GUI application...");

    eframe::run_native(
        "Waste Classifier",
        options,
        Box::new(move |cc| {
            setup_touch_style(&cc.egui_ctx);

            Box::new(WasteClassifierApp::new(
                &config,
                client,
                video_source,
                runtime,
            ))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run application: {}", e))?;

    info!("Application shut down gracefully");
    Ok(())
}

fn setup_touch_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();

    // Larger UI elements for touch interaction
    style.spacing.button_padding = egui::vec2(16.0, 12.0);
    style.spacing.item_spacing = egui::vec2(12.0, 8.0);
    style.spacing.window_margin = egui::Margin::same(16.0);

    style.text_styles.insert(
        egui::TextStyle::Button,
        egui::FontId::new(18.0, egui::FontFamily::Proportional),
    );
    style.text_styles.insert(
        egui::TextStyle::Body,
        egui::FontId::new(16.0, egui::FontFamily::Proportional),
    );
    style.text_styles.insert(
        egui::TextStyle::Heading,
        egui::FontId::new(24.0, egui::FontFamily::Proportional),
    );

    ctx.set_style(style);
}
