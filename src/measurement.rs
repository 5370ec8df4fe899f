use serde::{Deserialize, Serialize};

/// What the user is pointing the camera at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementMode {
    #[default]
    Object,
    Person,
}

impl std::fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl MeasurementMode {
    pub fn all() -> &'static [MeasurementMode] {
        &[MeasurementMode::Object, MeasurementMode::Person]
    }

    pub fn name(&self) -> &'static str {
        match self {
            MeasurementMode::Object => "object",
            MeasurementMode::Person => "person",
        }
    }
}

/// A single encoded still frame, handed to the measurement client exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

impl CapturedImage {
    pub const JPEG: &'static str = "image/jpeg";

    pub fn jpeg(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            mime_type: Self::JPEG,
            width,
            height,
        }
    }
}

/// Dimensions estimated by the model, in centimeters.
///
/// `mode` is never read from the model's answer; the client stamps the mode
/// the request was made with.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementResult {
    pub width_cm: f64,
    pub height_cm: f64,
    pub depth_cm: f64,
    pub object_name: String,
    pub explanation: String,
    pub mode: MeasurementMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MeasurementMode::Person).unwrap(), "\"person\"");
        let mode: MeasurementMode = serde_json::from_str("\"object\"").unwrap();
        assert_eq!(mode, MeasurementMode::Object);
    }

    #[test]
    fn test_default_mode_is_object() {
        assert_eq!(MeasurementMode::default(), MeasurementMode::Object);
        assert_eq!(MeasurementMode::all().len(), 2);
    }

    #[test]
    fn test_jpeg_constructor() {
        let image = CapturedImage::jpeg(vec![0xFF, 0xD8], 4, 3);
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!((image.width, image.height), (4, 3));
    }
}
