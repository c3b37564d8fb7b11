//! OpenAI Responses API generator.
//!
//! Works with OpenAI and any endpoint exposing a compatible `/v1/responses`
//! route. The Responses API keeps conversation context server-side: each
//! response has an `id`, and passing it back as `previous_response_id`
//! continues that conversation. That `id` is our continuation token.
//!
//! Output is requested in JSON mode and parsed into the structured payload.

use async_trait::async_trait;
use gencache_core::error::GeneratorError;
use gencache_core::generator::{Generator, GeneratorRequest, GeneratorResponse, Usage};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// A generator backed by the Responses API.
pub struct ResponsesGenerator {
    name: String,
    base_url: String,
    api_key: String,
    default_model: String,
    default_temperature: f32,
    max_output_tokens: u32,
    client: reqwest::Client,
}

impl ResponsesGenerator {
    /// Create a new generator.
    ///
    /// `timeout` is the transport timeout used when a request carries no
    /// `sampling.timeout_secs` of its own.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeneratorError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: "gpt-4o-mini".into(),
            default_temperature: 0.7,
            max_output_tokens: 2048,
            client,
        })
    }

    /// Create an OpenAI generator (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, GeneratorError> {
        Self::new(
            "openai",
            "https://api.openai.com/v1",
            api_key,
            Duration::from_secs(120),
        )
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Build the JSON body for one request, applying defaults for anything
    /// the request's sampling options leave unset.
    fn build_body(&self, request: &GeneratorRequest) -> serde_json::Value {
        let sampling = &request.sampling;
        let mut body = serde_json::json!({
            "model": sampling.model.as_deref().unwrap_or(&self.default_model),
            "instructions": request.system_prompt,
            "input": request.user_prompt,
            "temperature": sampling.temperature.unwrap_or(self.default_temperature),
            "max_output_tokens": sampling.max_output_tokens.unwrap_or(self.max_output_tokens),
            "text": { "format": { "type": "json_object" } },
            "store": true,
        });

        if let Some(token) = &request.continuation_token {
            body["previous_response_id"] = serde_json::json!(token);
        }

        body
    }

    /// Concatenate all `output_text` parts of the response.
    fn output_text(response: &ApiResponse) -> String {
        response
            .output
            .iter()
            .filter(|item| item.r#type == "message")
            .flat_map(|item| item.content.iter())
            .filter(|part| part.r#type == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Parse model output into a JSON payload, tolerating a Markdown fence.
    fn parse_payload(text: &str) -> Result<serde_json::Value, GeneratorError> {
        let trimmed = text.trim();
        let unfenced = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"))
            .map(str::trim)
            .unwrap_or(trimmed);

        if unfenced.is_empty() {
            return Err(GeneratorError::MalformedResponse(
                "Response contained no output text".into(),
            ));
        }

        serde_json::from_str(unfenced).map_err(|e| {
            GeneratorError::MalformedResponse(format!("Output is not valid JSON: {e}"))
        })
    }
}

#[async_trait]
impl Generator for ResponsesGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: GeneratorRequest) -> Result<GeneratorResponse, GeneratorError> {
        let url = format!("{}/responses", self.base_url);
        let body = self.build_body(&request);

        debug!(
            generator = %self.name,
            request_type = %request.request_type,
            continued = request.continuation_token.is_some(),
            "Sending generation request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(secs) = request.sampling.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GeneratorError::Timeout(e.to_string())
            } else {
                GeneratorError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(GeneratorError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(GeneratorError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Generator returned error");
            return Err(GeneratorError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GeneratorError::Timeout(e.to_string())
            } else {
                GeneratorError::MalformedResponse(format!("Failed to parse response: {e}"))
            }
        })?;

        if let Some(error) = &api_response.error {
            return Err(GeneratorError::ApiError {
                status_code: status,
                message: error.message.clone(),
            });
        }

        if api_response.status.as_deref() == Some("incomplete") {
            return Err(GeneratorError::MalformedResponse(
                "Response is incomplete (output token limit reached?)".into(),
            ));
        }

        let payload = Self::parse_payload(&Self::output_text(&api_response))?;

        let usage = api_response.usage.map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(GeneratorResponse {
            payload,
            continuation_token: Some(api_response.id),
            model: api_response.model,
            usage,
        })
    }

    async fn health_check(&self) -> Result<bool, GeneratorError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- Responses API wire types ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Vec<ApiOutputItem>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiOutputItem {
    r#type: String,
    #[serde(default)]
    content: Vec<ApiContentPart>,
}

#[derive(Debug, Deserialize)]
struct ApiContentPart {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gencache_core::request::{RequestType, SamplingOptions};

    fn generator() -> ResponsesGenerator {
        ResponsesGenerator::new("test", "http://localhost:9/v1/", "sk-test", Duration::from_secs(5))
            .unwrap()
            .with_model("gpt-test")
            .with_temperature(0.3)
            .with_max_output_tokens(512)
    }

    fn request(token: Option<&str>, sampling: SamplingOptions) -> GeneratorRequest {
        GeneratorRequest {
            request_type: RequestType::Challenge,
            system_prompt: "You write challenges.".into(),
            user_prompt: "Write one.".into(),
            continuation_token: token.map(String::from),
            sampling,
        }
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        assert_eq!(generator().base_url, "http://localhost:9/v1");
    }

    #[test]
    fn body_uses_defaults_and_continuation() {
        let body = generator().build_body(&request(Some("resp_prev"), SamplingOptions::default()));
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["instructions"], "You write challenges.");
        assert_eq!(body["input"], "Write one.");
        assert_eq!(body["max_output_tokens"], 512);
        assert_eq!(body["previous_response_id"], "resp_prev");
        assert_eq!(body["text"]["format"]["type"], "json_object");
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn body_sampling_overrides_defaults() {
        let sampling = SamplingOptions {
            model: Some("gpt-other".into()),
            temperature: Some(1.0),
            max_output_tokens: Some(64),
            timeout_secs: None,
        };
        let body = generator().build_body(&request(None, sampling));
        assert_eq!(body["model"], "gpt-other");
        assert_eq!(body["max_output_tokens"], 64);
        assert!(body.get("previous_response_id").is_none());
    }

    #[test]
    fn output_text_joins_message_parts() {
        let response: ApiResponse = serde_json::from_value(serde_json::json!({
            "id": "resp_1",
            "model": "gpt-test",
            "status": "completed",
            "output": [
                { "type": "reasoning", "content": [] },
                { "type": "message", "content": [
                    { "type": "output_text", "text": "{\"title\":" },
                    { "type": "output_text", "text": " \"Hi\"}" }
                ]}
            ],
            "usage": { "input_tokens": 10, "output_tokens": 4, "total_tokens": 14 }
        }))
        .unwrap();
        let text = ResponsesGenerator::output_text(&response);
        let payload = ResponsesGenerator::parse_payload(&text).unwrap();
        assert_eq!(payload["title"], "Hi");
    }

    #[test]
    fn fenced_output_is_parsed() {
        let payload =
            ResponsesGenerator::parse_payload("```json\n{\"score\": 80}\n```").unwrap();
        assert_eq!(payload["score"], 80);
    }

    #[test]
    fn non_json_output_is_malformed() {
        let err = ResponsesGenerator::parse_payload("Sure! Here is your challenge.").unwrap_err();
        assert!(matches!(err, GeneratorError::MalformedResponse(_)));

        let err = ResponsesGenerator::parse_payload("   ").unwrap_err();
        assert!(matches!(err, GeneratorError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let result = generator()
            .send(request(None, SamplingOptions::default()))
            .await;
        assert!(matches!(
            result,
            Err(GeneratorError::Network(_)) | Err(GeneratorError::Timeout(_))
        ));
    }
}
