//! Client for Google's Gemini `generateContent` endpoint.
//!
//! Only the slice of the API this application needs is modelled: one user
//! turn carrying a text part and an inline image, JSON-constrained output and
//! a thinking budget.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::InferenceConfig;
use crate::error::MeasureError;
use crate::measurement_client::{InferenceRequest, VisionModel};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
    /// Set on reasoning summaries, which are not part of the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    /// Base64 encoded payload.
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
    pub thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentRequest {
    pub fn build(request: &InferenceRequest, thinking_budget: u32) -> Self {
        let image = Part {
            inline_data: Some(Blob {
                mime_type: request.image.mime_type.to_string(),
                data: general_purpose::STANDARD.encode(&request.image.bytes),
            }),
            ..Default::default()
        };
        let instruction = Part {
            text: Some(request.instruction.to_string()),
            ..Default::default()
        };

        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![instruction, image],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: request.response_schema.clone(),
                thinking_config: ThinkingConfig { thinking_budget },
            },
        }
    }
}

impl GenerateContentResponse {
    /// Answer text of the first candidate, thoughts excluded.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// [`VisionModel`] backed by the hosted Gemini API.
pub struct GeminiModel {
    http: Client,
    base_url: String,
    model: String,
    api_key_env: String,
    thinking_budget: u32,
    timeout: Option<Duration>,
}

impl GeminiModel {
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
            thinking_budget: config.thinking_budget,
            timeout: config.request_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    // Read on every call so a key exported after startup is picked up.
    fn api_key(&self) -> Result<String, MeasureError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(MeasureError::MissingCredential(self.api_key_env.clone())),
        }
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    async fn generate(&self, request: &InferenceRequest) -> Result<Option<String>, MeasureError> {
        let api_key = self.api_key()?;
        let body = GenerateContentRequest::build(request, self.thinking_budget);

        info!("Calling {} ({} byte image)", self.model, request.image.bytes.len());
        let mut call = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body);
        if let Some(timeout) = self.timeout {
            call = call.timeout(timeout);
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), response.text().await));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        debug!("Received {} candidate(s)", parsed.candidates.len());
        Ok(parsed.text())
    }
}

fn status_error<E: std::fmt::Display>(status: u16, body: Result<String, E>) -> MeasureError {
    let body = body.unwrap_or_else(|e| {
        debug!("Could not read error body for HTTP {}: {}", status, e);
        format!("<unreadable body: {}>", e)
    });
    MeasureError::Status { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::measurement::{CapturedImage, MeasurementMode};
    use crate::measurement_client::{instruction_for, response_schema};

    fn request() -> InferenceRequest {
        InferenceRequest {
            instruction: instruction_for(MeasurementMode::Object),
            image: CapturedImage::jpeg(vec![1, 2, 3], 2, 2),
            response_schema: response_schema(),
        }
    }

    #[test]
    fn test_request_wire_format() {
        let body = serde_json::to_value(GenerateContentRequest::build(&request(), 4000)).unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], instruction_for(MeasurementMode::Object));
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
        assert!(parts[0].get("inlineData").is_none());

        let generation = &body["generationConfig"];
        assert_eq!(generation["responseMimeType"], "application/json");
        assert_eq!(generation["thinkingConfig"]["thinkingBudget"], 4000);
        assert_eq!(generation["responseSchema"]["required"][2], "depth_cm");
    }

    #[test]
    fn test_response_text_skips_thoughts() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "thinking about tiles", "thought": true},
                        {"text": "{\"width_cm\": 30,"},
                        {"text": " \"height_cm\": 45}"}
                    ]
                }
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text().unwrap(), "{\"width_cm\": 30, \"height_cm\": 45}");
    }

    #[test]
    fn test_response_without_text() {
        let response: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(response.text(), None);

        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert_eq!(response.text(), None);

        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn test_endpoint() {
        let mut config = Config::default().inference;
        config.base_url = "https://example.test/".to_string();
        config.model = "gemini-2.5-pro".to_string();
        let model = GeminiModel::new(&config);
        assert_eq!(
            model.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_network() {
        let mut config = Config::default().inference;
        config.api_key_env = "GEMINI_RULER_TEST_UNSET_KEY".to_string();
        config.base_url = "http://127.0.0.1:9".to_string();
        let model = GeminiModel::new(&config);

        let err = model.generate(&request()).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_status_error_keeps_unreadable_body_reason() {
        let readable = status_error::<String>(503, Ok("model overloaded".to_string()));
        assert!(matches!(readable, MeasureError::Status { status: 503, ref body } if body == "model overloaded"));

        let unreadable = status_error(500, Err("connection reset"));
        match unreadable {
            MeasureError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("connection reset"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
