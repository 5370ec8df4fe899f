use eframe::egui;

use crate::measurement::{MeasurementMode, MeasurementResult};
use crate::overlay::accent;

/// Mode-specific wording for the result card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultLabels {
    pub heading: &'static str,
    pub subject: &'static str,
    pub width: &'static str,
    pub height: &'static str,
    pub depth: &'static str,
}

pub fn labels_for(mode: MeasurementMode) -> ResultLabels {
    match mode {
        MeasurementMode::Person => ResultLabels {
            heading: "Height measurement",
            subject: "Person identified:",
            width: "Arm span",
            height: "Total height",
            depth: "Profile",
        },
        MeasurementMode::Object => ResultLabels {
            heading: "Measurement results",
            subject: "Object detected:",
            width: "Width",
            height: "Height",
            depth: "Depth",
        },
    }
}

/// People are always labelled as such; objects use the model's name.
pub fn subject_name(result: &MeasurementResult) -> &str {
    match result.mode {
        MeasurementMode::Person => "Human",
        MeasurementMode::Object => &result.object_name,
    }
}

/// Whole numbers without decimals, everything else to one decimal place.
pub fn format_cm(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

/// Render the result card. Returns true when the user asked for a new measurement.
pub fn show(ui: &mut egui::Ui, result: &MeasurementResult) -> bool {
    let labels = labels_for(result.mode);
    let highlight = accent(result.mode);
    let mut reset = false;

    egui::Frame::none()
        .fill(egui::Color32::from_rgb(30, 41, 59))
        .rounding(24.0)
        .inner_margin(egui::Margin::same(28.0))
        .show(ui, |ui| {
            ui.set_max_width(640.0);

            ui.horizontal(|ui| {
                ui.heading(egui::RichText::new(labels.heading).color(egui::Color32::WHITE).strong());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(egui::RichText::new("AI ESTIMATE").color(highlight).small().strong());
                });
            });

            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(labels.subject).color(egui::Color32::GRAY));
                ui.label(egui::RichText::new(subject_name(result)).color(egui::Color32::WHITE).strong());
            });

            ui.add_space(16.0);
            ui.columns(3, |columns| {
                value_card(&mut columns[0], labels.width, result.width_cm, false, highlight);
                value_card(&mut columns[1], labels.height, result.height_cm, true, highlight);
                value_card(&mut columns[2], labels.depth, result.depth_cm, false, highlight);
            });

            ui.add_space(16.0);
            ui.vertical_centered(|ui| {
                ui.label(
                    egui::RichText::new(format!("\"{}\"", result.explanation))
                        .italics()
                        .color(egui::Color32::from_rgb(165, 243, 252)),
                );
            });

            ui.add_space(20.0);
            let button = egui::Button::new(
                egui::RichText::new("New measurement").color(egui::Color32::WHITE).strong(),
            )
            .fill(egui::Color32::from_rgb(8, 145, 178))
            .rounding(16.0)
            .min_size(egui::vec2(ui.available_width(), 52.0));
            if ui.add(button).clicked() {
                reset = true;
            }
        });

    reset
}

fn value_card(ui: &mut egui::Ui, label: &str, value: f64, primary: bool, highlight: egui::Color32) {
    let (fill, label_color, size) = if primary {
        (highlight.gamma_multiply(0.15), highlight, 36.0)
    } else {
        (egui::Color32::from_rgb(15, 23, 42), egui::Color32::GRAY, 28.0)
    };

    egui::Frame::none()
        .fill(fill)
        .rounding(16.0)
        .inner_margin(egui::Margin::same(16.0))
        .show(ui, |ui| {
            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new(label.to_uppercase()).color(label_color).small().strong());
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(format_cm(value)).size(size).color(egui::Color32::WHITE).strong());
                    ui.label(egui::RichText::new("cm").color(egui::Color32::GRAY));
                });
            });
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_follow_mode() {
        let person = labels_for(MeasurementMode::Person);
        assert_eq!(person.height, "Total height");
        assert_eq!(person.width, "Arm span");

        let object = labels_for(MeasurementMode::Object);
        assert_eq!(object.depth, "Depth");
        assert_ne!(person.heading, object.heading);
    }

    #[test]
    fn test_person_subject_ignores_model_name() {
        let mut result = MeasurementResult {
            width_cm: 45.0,
            height_cm: 175.0,
            depth_cm: 25.0,
            object_name: "Man in blue shirt".to_string(),
            explanation: "Door frame used as reference".to_string(),
            mode: MeasurementMode::Person,
        };
        assert_eq!(subject_name(&result), "Human");

        result.mode = MeasurementMode::Object;
        assert_eq!(subject_name(&result), "Man in blue shirt");
    }

    #[test]
    fn test_format_cm() {
        assert_eq!(format_cm(30.0), "30");
        assert_eq!(format_cm(178.46), "178.5");
        assert_eq!(format_cm(45.0), "45");
    }
}
