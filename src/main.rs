use anyhow::Result;
use eframe::egui;
use log::info;
use std::sync::Arc;

mod camera_controller;
mod capture;
mod config;
mod controller;
mod error;
mod gemini;
mod measurement;
mod measurement_client;
mod overlay;
mod result_view;
mod texture;
mod ui;

use crate::camera_controller::{ProcessCamera, StreamRequest};
use crate::capture::CaptureComponent;
use crate::config::Config;
use crate::controller::AppController;
use crate::gemini::GeminiModel;
use crate::measurement_client::MeasurementClient;
use crate::ui::RulerApp;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("📏 Starting Gemini Ruler");

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded: {}x{} display", config.display.width, config.display.height);
    info!(
        "Camera: {} at {}x{} @ {} fps, model: {}",
        config.camera.program,
        config.camera.width,
        config.camera.height,
        config.camera.framerate,
        config.inference.model
    );

    // Initialize components
    let backend = Arc::new(ProcessCamera::new(&config.camera));
    let capture = CaptureComponent::new(backend, StreamRequest::from_config(&config.camera));
    let client = MeasurementClient::new(Arc::new(GeminiModel::new(&config.inference)));
    let controller = AppController::new(
        capture,
        client,
        tokio::runtime::Handle::current(),
        config.camera.jpeg_quality,
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.display.width as f32, config.display.height as f32])
            .with_min_inner_size([480.0, 640.0])
            .with_fullscreen(config.display.fullscreen),
        ..Default::default()
    };

    info!("Launching GUI application...");

    // Run the application
    eframe::run_native(
        "Gemini Ruler",
        options,
        Box::new(|cc| {
            // Setup egui style for touch interface
            setup_touch_style(&cc.egui_ctx);

            Box::new(RulerApp::new(controller))
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

    // Larger text for better readability
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

    style.visuals = egui::Visuals::dark();
    ctx.set_style(style);
}
