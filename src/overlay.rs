//! Advisory framing guides drawn over the live camera preview.
//!
//! Nothing here is enforced; the guides only help the user frame the shot the
//! way the model's instructions assume.

use eframe::egui;

use crate::measurement::MeasurementMode;

pub const OBJECT_ACCENT: egui::Color32 = egui::Color32::from_rgb(34, 211, 238);
pub const PERSON_ACCENT: egui::Color32 = egui::Color32::from_rgb(239, 68, 68);

pub fn accent(mode: MeasurementMode) -> egui::Color32 {
    match mode {
        MeasurementMode::Object => OBJECT_ACCENT,
        MeasurementMode::Person => PERSON_ACCENT,
    }
}

pub fn guide_hint(mode: MeasurementMode) -> &'static str {
    match mode {
        MeasurementMode::Person => "Align the feet with the bottom marker",
        MeasurementMode::Object => "Frame the object in the centre",
    }
}

/// Square reticle centred in the preview.
pub fn reticle_rect(preview: egui::Rect) -> egui::Rect {
    let side = preview.width().min(preview.height()) * 0.45;
    egui::Rect::from_center_size(preview.center(), egui::vec2(side, side))
}

/// Box holding the silhouette: 80% of the preview height, 1:2 aspect.
pub fn silhouette_rect(preview: egui::Rect) -> egui::Rect {
    let height = preview.height() * 0.8;
    egui::Rect::from_center_size(preview.center(), egui::vec2(height / 2.0, height))
}

pub fn paint_guide(painter: &egui::Painter, preview: egui::Rect, mode: MeasurementMode) {
    match mode {
        MeasurementMode::Object => paint_reticle(painter, preview),
        MeasurementMode::Person => paint_silhouette(painter, preview),
    }
    paint_hint(painter, preview, mode);
}

fn paint_reticle(painter: &egui::Painter, preview: egui::Rect) {
    let rect = reticle_rect(preview);
    let stroke = egui::Stroke::new(2.0, OBJECT_ACCENT.gamma_multiply(0.5));

    let corners = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
        rect.left_top(),
    ];
    painter.extend(egui::Shape::dashed_line(&corners, stroke, 10.0, 6.0));
    painter.circle_filled(rect.center(), 4.0, OBJECT_ACCENT);
}

fn paint_silhouette(painter: &egui::Painter, preview: egui::Rect) {
    let frame = silhouette_rect(preview);
    // Figure drawn in a 100x200 design space
    let map = |x: f32, y: f32| {
        egui::pos2(
            frame.min.x + x / 100.0 * frame.width(),
            frame.min.y + y / 200.0 * frame.height(),
        )
    };
    let scale = frame.height() / 200.0;
    let stroke = egui::Stroke::new(1.5, PERSON_ACCENT.gamma_multiply(0.4));

    painter.circle_stroke(map(50.0, 35.0), 15.0 * scale, stroke);

    let limbs = [
        ((35.0, 55.0), (65.0, 55.0)), // shoulders
        ((35.0, 55.0), (20.0, 120.0)),
        ((65.0, 55.0), (80.0, 120.0)),
        ((50.0, 50.0), (50.0, 110.0)),
        ((50.0, 110.0), (30.0, 185.0)),
        ((50.0, 110.0), (70.0, 185.0)),
    ];
    for ((x1, y1), (x2, y2)) in limbs {
        painter.extend(egui::Shape::dashed_line(&[map(x1, y1), map(x2, y2)], stroke, 6.0, 4.0));
    }

    // Feet line, wider than the figure
    let feet_y = frame.bottom();
    let half = frame.width() * 0.6;
    painter.line_segment(
        [
            egui::pos2(frame.center().x - half, feet_y),
            egui::pos2(frame.center().x + half, feet_y),
        ],
        egui::Stroke::new(2.0, PERSON_ACCENT),
    );
    painter.text(
        egui::pos2(frame.center().x, feet_y + 8.0),
        egui::Align2::CENTER_TOP,
        "FEET POSITION",
        egui::FontId::proportional(12.0),
        PERSON_ACCENT,
    );
}

fn paint_hint(painter: &egui::Painter, preview: egui::Rect, mode: MeasurementMode) {
    let galley = painter.layout_no_wrap(
        guide_hint(mode).to_string(),
        egui::FontId::proportional(16.0),
        egui::Color32::from_white_alpha(210),
    );
    let size = galley.size() + egui::vec2(32.0, 14.0);
    let pill = egui::Rect::from_center_size(
        egui::pos2(preview.center().x, preview.top() + 16.0 + size.y / 2.0),
        size,
    );

    painter.rect(
        pill,
        size.y / 2.0,
        egui::Color32::from_black_alpha(160),
        egui::Stroke::new(1.0, accent(mode).gamma_multiply(0.3)),
    );
    painter.galley(pill.center() - galley.size() / 2.0, galley);
}
