use eframe::egui;
use std::time::Duration;

use crate::capture::CAMERA_ERROR_MESSAGE;
use crate::controller::{AppController, Phase};
use crate::measurement::MeasurementMode;
use crate::overlay::{self, OBJECT_ACCENT, PERSON_ACCENT};
use crate::result_view;
use crate::texture::FrameTextures;

// ============================================================================
// CONSTANTS FOR UI STYLING
// ============================================================================
const UI_PADDING: f32 = 20.0;
const CAPTURE_BUTTON_RADIUS: f32 = 40.0;
const BACKGROUND: egui::Color32 = egui::Color32::from_rgb(2, 6, 23);
const PANEL: egui::Color32 = egui::Color32::from_rgb(15, 23, 42);
const MUTED: egui::Color32 = egui::Color32::from_rgb(100, 116, 139);

// ============================================================================
// MAIN APP STRUCT
// ============================================================================

pub struct RulerApp {
    pub controller: AppController,
    pub textures: FrameTextures,
}

impl RulerApp {
    pub fn new(controller: AppController) -> Self {
        Self {
            controller,
            textures: FrameTextures::default(),
        }
    }
}

// ============================================================================
// MAIN UPDATE LOOP
// ============================================================================

impl eframe::App for RulerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ESC key to exit (kiosk mode with keyboard)
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        self.controller.poll();

        match self.controller.phase() {
            Phase::Camera => {
                self.update_camera_preview(ctx);
                ctx.request_repaint_after(Duration::from_millis(33));
            }
            // Keeps the scan line moving and picks up the outcome promptly
            Phase::Analyzing => ctx.request_repaint(),
            Phase::Idle | Phase::Result | Phase::Error => {
                if !self.textures.is_empty() {
                    self.textures.clear();
                }
            }
        }

        self.render_ui(ctx);
    }
}

impl RulerApp {
    fn update_camera_preview(&mut self, ctx: &egui::Context) {
        if self.controller.capture_component_mut().poll_frame() {
            match self.controller.capture_component().frame() {
                Some(frame) => self.textures.update_preview(ctx, frame),
                None => self.textures.clear_preview(),
            }
        }
    }

    fn render_ui(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(BACKGROUND).inner_margin(egui::Margin::same(UI_PADDING)))
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.vertical_centered(|ui| {
                        render_header(ui);
                        ui.add_space(24.0);

                        match self.controller.phase() {
                            Phase::Idle => self.render_idle(ui),
                            Phase::Camera | Phase::Analyzing => self.render_capture(ui, ctx),
                            Phase::Result => self.render_result(ui),
                            Phase::Error => self.render_error(ui),
                        }
                    });
                });
            });
    }
}

// ============================================================================
// IDLE: MODE SELECTION
// ============================================================================

impl RulerApp {
    fn render_idle(&mut self, ui: &mut egui::Ui) {
        let mode = self.controller.mode();

        egui::Frame::none()
            .fill(PANEL)
            .rounding(16.0)
            .inner_margin(egui::Margin::same(6.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    for &option in MeasurementMode::all() {
                        let selected = option == mode;
                        let text = egui::RichText::new(mode_label(option))
                            .strong()
                            .color(if selected { egui::Color32::WHITE } else { MUTED });
                        let fill = if selected {
                            overlay::accent(option).gamma_multiply(0.8)
                        } else {
                            egui::Color32::TRANSPARENT
                        };
                        let button = egui::Button::new(text)
                            .fill(fill)
                            .rounding(12.0)
                            .min_size(egui::vec2(140.0, 44.0));

                        if ui.add_enabled(self.controller.mode_selectable(), button).clicked() {
                            self.controller.select_mode(option);
                        }
                    }
                });
            });

        ui.add_space(24.0);

        let (title, hint) = idle_copy(mode);
        egui::Frame::none()
            .fill(PANEL)
            .rounding(32.0)
            .inner_margin(egui::Margin::same(40.0))
            .show(ui, |ui| {
                ui.set_max_width(420.0);
                ui.vertical_centered(|ui| {
                    ui.label(egui::RichText::new(title).size(22.0).strong().color(egui::Color32::WHITE));
                    ui.add_space(8.0);
                    ui.label(egui::RichText::new(hint).color(MUTED));
                    ui.add_space(24.0);

                    let button = egui::Button::new(
                        egui::RichText::new("Activate camera").strong().color(BACKGROUND),
                    )
                    .fill(egui::Color32::WHITE)
                    .rounding(16.0)
                    .min_size(egui::vec2(ui.available_width(), 52.0));
                    if ui.add(button).clicked() {
                        self.controller.activate_camera();
                    }
                });
            });
    }
}

// ============================================================================
// CAMERA + ANALYZING: PREVIEW VIEWPORT
// ============================================================================

impl RulerApp {
    fn render_capture(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let mode = self.controller.mode();
        let analyzing = self.controller.phase() == Phase::Analyzing;

        if !analyzing {
            if let Some(error) = self.controller.capture_component().error() {
                let detail = error.to_string();
                self.render_camera_error(ui, &detail);
                self.render_cancel(ui);
                return;
            }
        }

        // 3:4 portrait viewport, leaving room for the controls below
        let available = (ui.available_size() - egui::vec2(0.0, 80.0)).max(egui::vec2(120.0, 160.0));
        let viewport_size = fit_image_in_rect(egui::vec2(3.0, 4.0), available);
        let (viewport, _) = ui.allocate_exact_size(viewport_size, egui::Sense::hover());
        let painter = ui.painter_at(viewport);
        painter.rect_filled(viewport, 24.0, egui::Color32::BLACK);

        let texture = if analyzing {
            self.textures.captured.as_ref()
        } else {
            self.textures.preview.as_ref()
        };
        match texture {
            Some(texture) => {
                let display_size = fit_image_in_rect(texture.size_vec2(), viewport.size());
                let image_rect = center_rect_in_rect(display_size, viewport);
                let tint = if analyzing {
                    egui::Color32::from_white_alpha(77)
                } else {
                    egui::Color32::WHITE
                };
                painter.image(
                    texture.id(),
                    image_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    tint,
                );
            }
            None => {
                let status = if self.controller.capture_component().is_streaming() {
                    "Starting camera..."
                } else {
                    "Camera stopped"
                };
                painter.text(
                    viewport.center(),
                    egui::Align2::CENTER_CENTER,
                    status,
                    egui::FontId::proportional(18.0),
                    MUTED,
                );
            }
        }

        if analyzing {
            let time = ui.input(|i| i.time);
            paint_scan_line(&painter, viewport, time, overlay::accent(mode));

            ui.add_space(16.0);
            ui.horizontal(|ui| {
                ui.add(egui::Spinner::new().color(overlay::accent(mode)));
                ui.label(egui::RichText::new(analyzing_message(mode)).strong().color(overlay::accent(mode)));
            });
            return;
        }

        overlay::paint_guide(&painter, viewport, mode);

        // Capture button on the right edge, vertically centred
        let center = egui::pos2(
            viewport.right() - CAPTURE_BUTTON_RADIUS - UI_PADDING,
            viewport.center().y,
        );
        let button_rect = egui::Rect::from_center_size(
            center,
            egui::vec2(CAPTURE_BUTTON_RADIUS * 2.0, CAPTURE_BUTTON_RADIUS * 2.0),
        );
        let ready = self.controller.capture_component().frame().is_some();
        let clicked = ui
            .allocate_ui_at_rect(button_rect, |ui| {
                circular_button(ui, CAPTURE_BUTTON_RADIUS, "", egui::Color32::from_rgba_unmultiplied(255, 255, 255, 230), ready)
            })
            .inner;

        if clicked && self.controller.capture() {
            if let Some(frame) = self.controller.captured_frame() {
                self.textures.set_captured(ctx, frame);
            }
            self.textures.clear_preview();
        }

        ui.add_space(12.0);
        self.render_cancel(ui);
    }

    fn render_camera_error(&mut self, ui: &mut egui::Ui, detail: &str) {
        egui::Frame::none()
            .fill(egui::Color32::from_rgb(69, 10, 10))
            .stroke(egui::Stroke::new(1.0, PERSON_ACCENT.gamma_multiply(0.5)))
            .rounding(12.0)
            .inner_margin(egui::Margin::same(32.0))
            .show(ui, |ui| {
                ui.set_max_width(480.0);
                ui.vertical_centered(|ui| {
                    ui.label(egui::RichText::new(CAMERA_ERROR_MESSAGE).color(PERSON_ACCENT));
                    ui.label(egui::RichText::new(detail).small().color(MUTED));
                    ui.add_space(16.0);
                    let button = egui::Button::new(egui::RichText::new("Try again").color(egui::Color32::WHITE))
                        .fill(egui::Color32::from_rgb(220, 38, 38))
                        .rounding(8.0);
                    if ui.add(button).clicked() {
                        self.controller.retry_camera();
                    }
                });
            });
    }

    fn render_cancel(&mut self, ui: &mut egui::Ui) {
        let button = egui::Button::new(egui::RichText::new("Cancel and change mode").color(MUTED)).frame(false);
        if ui.add(button).clicked() {
            self.controller.cancel();
        }
    }
}

// ============================================================================
// RESULT + ERROR
// ============================================================================

impl RulerApp {
    fn render_result(&mut self, ui: &mut egui::Ui) {
        let reset = match self.controller.result() {
            Some(result) => result_view::show(ui, result),
            None => false,
        };
        if reset {
            self.controller.reset();
        }
    }

    fn render_error(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("⚠").size(48.0).color(PERSON_ACCENT));
        ui.add_space(12.0);
        if let Some(message) = self.controller.error_message() {
            ui.label(egui::RichText::new(message).color(MUTED));
        }
        ui.add_space(20.0);

        let button = egui::Button::new(egui::RichText::new("Try again").strong().color(egui::Color32::WHITE))
            .fill(egui::Color32::from_rgb(30, 41, 59))
            .rounding(12.0)
            .min_size(egui::vec2(180.0, 44.0));
        if ui.add(button).clicked() {
            self.controller.reset();
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn render_header(ui: &mut egui::Ui) {
    ui.label(egui::RichText::new("GEMINI VISION AI").small().strong().color(OBJECT_ACCENT));
    ui.label(egui::RichText::new("AI Ruler 3D").size(40.0).strong().color(egui::Color32::WHITE));
    ui.label(
        egui::RichText::new("Measure objects or a person's height instantly with artificial intelligence.")
            .color(MUTED),
    );
}

pub fn mode_label(mode: MeasurementMode) -> &'static str {
    match mode {
        MeasurementMode::Object => "Objects",
        MeasurementMode::Person => "People",
    }
}

pub fn idle_copy(mode: MeasurementMode) -> (&'static str, &'static str) {
    match mode {
        MeasurementMode::Object => (
            "Measure an object",
            "Point the camera at the object. Include a common item nearby for better accuracy.",
        ),
        MeasurementMode::Person => (
            "Measure height",
            "Stand the person about 2-3 meters away. Make sure both feet and head are visible.",
        ),
    }
}

pub fn analyzing_message(mode: MeasurementMode) -> &'static str {
    match mode {
        MeasurementMode::Person => "Calculating height...",
        MeasurementMode::Object => "Analyzing spatial proportions...",
    }
}

/// Vertical position of the scan line: top to bottom and back every 2 seconds.
pub fn scan_line_y(viewport: egui::Rect, time: f64) -> f32 {
    let phase = (1.0 - (time * std::f64::consts::PI).cos()) / 2.0;
    viewport.top() + viewport.height() * phase as f32
}

fn paint_scan_line(painter: &egui::Painter, viewport: egui::Rect, time: f64, color: egui::Color32) {
    let y = scan_line_y(viewport, time);
    let ends = [egui::pos2(viewport.left(), y), egui::pos2(viewport.right(), y)];
    painter.line_segment(ends, egui::Stroke::new(8.0, color.gamma_multiply(0.25)));
    painter.line_segment(ends, egui::Stroke::new(3.0, color));
}

/// Circular button; disabled buttons are drawn dimmed and ignore clicks.
fn circular_button(ui: &mut egui::Ui, radius: f32, text: &str, base_fill: egui::Color32, enabled: bool) -> bool {
    let size = egui::vec2(radius * 2.0, radius * 2.0);
    let sense = if enabled { egui::Sense::click() } else { egui::Sense::hover() };
    let (rect, response) = ui.allocate_exact_size(size, sense);

    if ui.is_rect_visible(rect) {
        let painter = ui.painter();
        let center = rect.center();

        let fill_color = if !enabled {
            base_fill.gamma_multiply(0.3)
        } else if response.is_pointer_button_down_on() {
            // Pressed state - darker
            egui::Color32::from_rgb(
                base_fill.r().saturating_sub(30),
                base_fill.g().saturating_sub(30),
                base_fill.b().saturating_sub(30),
            )
        } else {
            base_fill
        };
        let ring = if enabled && response.hovered() { OBJECT_ACCENT } else { BACKGROUND };

        // Shadow for depth
        painter.circle(center + egui::vec2(3.0, 3.0), radius, egui::Color32::from_black_alpha(80), egui::Stroke::NONE);
        painter.circle(center, radius, fill_color, egui::Stroke::NONE);
        painter.circle_stroke(center, radius * 0.8, egui::Stroke::new(4.0, ring));
        painter.circle_filled(center, radius * 0.6, BACKGROUND);
        painter.rect_filled(
            egui::Rect::from_center_size(center, egui::vec2(radius * 0.3, radius * 0.3)),
            2.0,
            fill_color,
        );

        if !text.is_empty() {
            let galley = painter.layout_no_wrap(text.to_string(), egui::FontId::proportional(radius / 3.0), egui::Color32::WHITE);
            painter.galley(center - galley.size() / 2.0, galley);
        }

        if enabled && response.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }
    }

    response.clicked()
}

// Helper functions for image centering
fn fit_image_in_rect(image_size: egui::Vec2, container_size: egui::Vec2) -> egui::Vec2 {
    let scale = (container_size.x / image_size.x).min(container_size.y / image_size.y);
    image_size * scale
}

fn center_rect_in_rect(content_size: egui::Vec2, container: egui::Rect) -> egui::Rect {
    let offset = (container.size() - content_size) * 0.5;
    egui::Rect::from_min_size(container.min + offset, content_size)
}
