use async_trait::async_trait;
use log::{debug, info};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::MeasureError;
use crate::measurement::{CapturedImage, MeasurementMode, MeasurementResult};

const PERSON_INSTRUCTION: &str = "\
Act as an expert in biometrics and computer vision.
Analyze the image and estimate the HEIGHT (stature) of the visible person in CENTIMETERS.
The user was told to align the person's FEET with a horizontal guide line at the bottom of the camera frame. \
Use that alignment and the floor plane to calibrate your estimate.
Find the top of the head and use scale references in the environment (doors, light switches, standard furniture) \
to determine the height.
Return the result as JSON. Even though the subject is a person, fill in approximate width (shoulders) \
and depth (profile).";

const OBJECT_INSTRUCTION: &str = "\
Act as an expert in spatial measurement.
Analyze the image and estimate the physical dimensions (width, height and depth) of the main object in CENTIMETERS.
Look for context clues (tiles, coins, furniture) to determine the scale.
Return the result as JSON.";

/// Keys every model answer must carry.
pub const REQUIRED_FIELDS: [&str; 5] = ["width_cm", "height_cm", "depth_cm", "object_name", "explanation"];

/// Natural-language instruction sent alongside the image.
pub fn instruction_for(mode: MeasurementMode) -> &'static str {
    match mode {
        MeasurementMode::Person => PERSON_INSTRUCTION,
        MeasurementMode::Object => OBJECT_INSTRUCTION,
    }
}

/// Output schema in the inference API's OpenAPI subset.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "width_cm": { "type": "NUMBER", "description": "Width or arm span in cm" },
            "height_cm": { "type": "NUMBER", "description": "Height or stature in cm" },
            "depth_cm": { "type": "NUMBER", "description": "Depth or thickness in cm" },
            "object_name": { "type": "STRING", "description": "Name or identification of the person or object" },
            "explanation": { "type": "STRING", "description": "Reasoning used for the estimate" }
        },
        "required": REQUIRED_FIELDS,
    })
}

/// Everything the external model receives for one measurement.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub instruction: &'static str,
    pub image: CapturedImage,
    pub response_schema: Value,
}

/// The opaque model: (instruction, image, schema) -> text.
///
/// `Ok(None)` means the call succeeded but produced no usable text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, request: &InferenceRequest) -> Result<Option<String>, MeasureError>;
}

/// Stateless measurement client. One call to [`analyze`](Self::analyze) is one
/// request to the model; nothing is cached or retried.
#[derive(Clone)]
pub struct MeasurementClient {
    model: Arc<dyn VisionModel>,
}

impl MeasurementClient {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    pub async fn analyze(
        &self,
        image: CapturedImage,
        mode: MeasurementMode,
    ) -> Result<MeasurementResult, MeasureError> {
        info!(
            "Requesting {} measurement for {}x{} image ({} bytes)",
            mode,
            image.width,
            image.height,
            image.bytes.len()
        );

        let request = InferenceRequest {
            instruction: instruction_for(mode),
            image,
            response_schema: response_schema(),
        };

        let text = self
            .model
            .generate(&request)
            .await?
            .filter(|text| !text.trim().is_empty())
            .ok_or(MeasureError::EmptyResponse)?;

        debug!("Model answered: {}", text);
        let result = parse_measurement(&text, mode)?;
        info!(
            "Measured {}: {} x {} x {} cm",
            result.object_name, result.width_cm, result.height_cm, result.depth_cm
        );
        Ok(result)
    }
}

/// Parse the model's JSON answer into a complete result stamped with `mode`.
///
/// Any missing or mistyped field fails the whole parse. A `mode` key in the
/// answer, if present, is ignored.
pub fn parse_measurement(text: &str, mode: MeasurementMode) -> Result<MeasurementResult, MeasureError> {
    let value: Value = serde_json::from_str(text.trim())?;
    let object = value.as_object().ok_or(MeasureError::NotAnObject)?;

    Ok(MeasurementResult {
        width_cm: number_field(object, "width_cm")?,
        height_cm: number_field(object, "height_cm")?,
        depth_cm: number_field(object, "depth_cm")?,
        object_name: string_field(object, "object_name")?,
        explanation: string_field(object, "explanation")?,
        mode,
    })
}

fn field<'a>(object: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, MeasureError> {
    match object.get(name) {
        Some(Value::Null) | None => Err(MeasureError::MissingField(name)),
        Some(value) => Ok(value),
    }
}

fn number_field(object: &Map<String, Value>, name: &'static str) -> Result<f64, MeasureError> {
    field(object, name)?
        .as_f64()
        .ok_or(MeasureError::InvalidField(name))
}

fn string_field(object: &Map<String, Value>, name: &'static str) -> Result<String, MeasureError> {
    field(object, name)?
        .as_str()
        .map(str::to_string)
        .ok_or(MeasureError::InvalidField(name))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted model for tests; records every request it receives.
    pub(crate) struct FakeModel {
        answer: Mutex<Option<Result<Option<String>, MeasureError>>>,
        pub requests: Mutex<Vec<InferenceRequest>>,
    }

    impl FakeModel {
        pub(crate) fn answering(text: &str) -> Arc<Self> {
            Self::with(Ok(Some(text.to_string())))
        }

        pub(crate) fn with(answer: Result<Option<String>, MeasureError>) -> Arc<Self> {
            Arc::new(Self {
                answer: Mutex::new(Some(answer)),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl VisionModel for FakeModel {
        async fn generate(&self, request: &InferenceRequest) -> Result<Option<String>, MeasureError> {
            self.requests.lock().unwrap().push(request.clone());
            self.answer
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(MeasureError::EmptyResponse))
        }
    }

    pub(crate) fn sample_image() -> CapturedImage {
        CapturedImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9], 640, 480)
    }

    const BOX_ANSWER: &str = r#"{"width_cm":30,"height_cm":45,"depth_cm":20,"object_name":"Caixa","explanation":"Compared with floor tiles"}"#;

    #[tokio::test]
    async fn test_object_measurement_succeeds() {
        let model = FakeModel::answering(BOX_ANSWER);
        let client = MeasurementClient::new(model.clone());

        let result = client.analyze(sample_image(), MeasurementMode::Object).await.unwrap();

        assert_eq!(result.width_cm, 30.0);
        assert_eq!(result.height_cm, 45.0);
        assert_eq!(result.depth_cm, 20.0);
        assert_eq!(result.object_name, "Caixa");
        assert_eq!(result.mode, MeasurementMode::Object);
        assert_eq!(model.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mode_is_stamped_not_echoed() {
        let answer = r#"{"width_cm":45,"height_cm":178.5,"depth_cm":25,"object_name":"Adult","explanation":"door frame","mode":"object"}"#;
        let client = MeasurementClient::new(FakeModel::answering(answer));

        let result = client.analyze(sample_image(), MeasurementMode::Person).await.unwrap();

        assert_eq!(result.mode, MeasurementMode::Person);
        assert_eq!(result.height_cm, 178.5);
    }

    #[tokio::test]
    async fn test_instruction_follows_mode() {
        let model = FakeModel::answering(BOX_ANSWER);
        let client = MeasurementClient::new(model.clone());
        client.analyze(sample_image(), MeasurementMode::Person).await.unwrap();

        let requests = model.requests.lock().unwrap();
        assert!(requests[0].instruction.contains("FEET"));
        assert!(requests[0].instruction.contains("doors"));
        assert_eq!(requests[0].image.mime_type, "image/jpeg");

        assert!(instruction_for(MeasurementMode::Object).contains("coins"));
        assert!(!instruction_for(MeasurementMode::Object).contains("FEET"));
    }

    #[test]
    fn test_each_missing_field_fails() {
        let full: Value = serde_json::from_str(BOX_ANSWER).unwrap();
        for name in REQUIRED_FIELDS {
            let mut partial = full.clone();
            partial.as_object_mut().unwrap().remove(name);
            let err = parse_measurement(&partial.to_string(), MeasurementMode::Object).unwrap_err();
            assert!(matches!(err, MeasureError::MissingField(field) if field == name));
        }
    }

    #[test]
    fn test_null_field_counts_as_missing() {
        let text = r#"{"width_cm":1,"height_cm":2,"depth_cm":null,"object_name":"x","explanation":"y"}"#;
        let err = parse_measurement(text, MeasurementMode::Person).unwrap_err();
        assert!(matches!(err, MeasureError::MissingField("depth_cm")));
    }

    #[test]
    fn test_wrong_types_fail() {
        let text = r#"{"width_cm":"thirty","height_cm":2,"depth_cm":3,"object_name":"x","explanation":"y"}"#;
        assert!(matches!(
            parse_measurement(text, MeasurementMode::Object),
            Err(MeasureError::InvalidField("width_cm"))
        ));

        let text = r#"{"width_cm":1,"height_cm":2,"depth_cm":3,"object_name":7,"explanation":"y"}"#;
        assert!(matches!(
            parse_measurement(text, MeasurementMode::Object),
            Err(MeasureError::InvalidField("object_name"))
        ));
    }

    #[test]
    fn test_non_json_is_an_error_not_a_panic() {
        let err = parse_measurement("Sorry, I cannot measure that.", MeasurementMode::Object).unwrap_err();
        assert!(matches!(err, MeasureError::InvalidJson(_)));

        let err = parse_measurement("[1, 2, 3]", MeasurementMode::Object).unwrap_err();
        assert!(matches!(err, MeasureError::NotAnObject));
    }

    #[tokio::test]
    async fn test_empty_text_fails() {
        let client = MeasurementClient::new(FakeModel::with(Ok(None)));
        let err = client.analyze(sample_image(), MeasurementMode::Object).await.unwrap_err();
        assert!(matches!(err, MeasureError::EmptyResponse));

        let client = MeasurementClient::new(FakeModel::answering("   "));
        let err = client.analyze(sample_image(), MeasurementMode::Object).await.unwrap_err();
        assert!(matches!(err, MeasureError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let client = MeasurementClient::new(FakeModel::with(Err(MeasureError::Status {
            status: 503,
            body: "overloaded".into(),
        })));
        let err = client.analyze(sample_image(), MeasurementMode::Person).await.unwrap_err();
        assert!(matches!(err, MeasureError::Status { status: 503, .. }));
    }

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, REQUIRED_FIELDS);
        assert_eq!(schema["properties"]["depth_cm"]["type"], "NUMBER");
        assert_eq!(schema["properties"]["explanation"]["type"], "STRING");
    }
}
