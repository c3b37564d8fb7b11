//! Generator trait: the abstraction over the LLM endpoint.
//!
//! A Generator sends an assembled prompt (optionally continuing a prior
//! response) and returns a structured payload plus a new continuation token.
//!
//! Implementations: OpenAI Responses API, scripted mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;
use crate::request::{RequestType, SamplingOptions};

/// One call to the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorRequest {
    pub request_type: RequestType,

    pub system_prompt: String,

    pub user_prompt: String,

    /// Handle of the previous response in this conversation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,

    #[serde(default)]
    pub sampling: SamplingOptions,
}

/// Token usage information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// A complete response from the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorResponse {
    /// Parsed structured output.
    pub payload: serde_json::Value,

    /// Opaque handle for continuing this conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,

    /// Which model actually responded.
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The core Generator trait.
///
/// The orchestrator calls `send()` without knowing which backend answers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A human-readable name for this generator (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a prompt and get a complete structured response.
    async fn send(&self, request: GeneratorRequest) -> Result<GeneratorResponse, GeneratorError>;

    /// Health check: can we reach the endpoint?
    async fn health_check(&self) -> Result<bool, GeneratorError> {
        Ok(true)
    }
}
