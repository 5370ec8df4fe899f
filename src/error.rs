use thiserror::Error;

/// Camera failures. All of these are recoverable from the capture screen.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera access was denied: {0}")]
    PermissionDenied(String),

    #[error("no camera available: {0}")]
    NoDevice(String),

    #[error("camera stream failed: {0}")]
    Stream(String),

    #[error("no frame received from the camera yet")]
    NoFrame,

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] image::ImageError),
}

/// Everything that can go wrong between a captured image and a result.
#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("API credential not set (environment variable {0})")]
    MissingCredential(String),

    #[error("request to inference service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("inference service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("the model returned no text")]
    EmptyResponse,

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("model output is not a JSON object")]
    NotAnObject,

    #[error("model output is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("model output field `{0}` has the wrong type")]
    InvalidField(&'static str),
}

impl MeasureError {
    /// True when the failure comes from local setup rather than the service.
    pub fn is_configuration(&self) -> bool {
        matches!(self, MeasureError::MissingCredential(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(MeasureError::MissingCredential("API_KEY".into()).is_configuration());
        assert!(!MeasureError::EmptyResponse.is_configuration());
        assert!(!MeasureError::MissingField("depth_cm").is_configuration());
    }

    #[test]
    fn test_messages_name_the_field() {
        let err = MeasureError::MissingField("depth_cm");
        assert!(err.to_string().contains("depth_cm"));
    }
}
