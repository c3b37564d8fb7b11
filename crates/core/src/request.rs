//! Generation request types.
//!
//! A [`GenerationRequest`] is what application services hand to the
//! orchestrator. Its cache identity is `(subject_id, request_type, params)`;
//! everything else on the request (sampling, scope, prompt context, the
//! force-refresh flag) only shapes *how* a miss is generated.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Attitude scores (0-100) keyed by attitude name.
pub type Attitudes = BTreeMap<String, f64>;

/// The kind of artifact being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Challenge,
    ChallengeVariation,
    Evaluation,
    Personality,
    FocusArea,
}

impl RequestType {
    pub const ALL: [RequestType; 5] = [
        RequestType::Challenge,
        RequestType::ChallengeVariation,
        RequestType::Evaluation,
        RequestType::Personality,
        RequestType::FocusArea,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Challenge => "challenge",
            Self::ChallengeVariation => "challenge_variation",
            Self::Evaluation => "evaluation",
            Self::Personality => "personality",
            Self::FocusArea => "focus_area",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|rt| rt.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownRequestType(s.to_string()))
    }
}

// ── Domain parameters ─────────────────────────────────────────────────────

/// Parameters for a fresh challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeParams {
    pub focus_area: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// Parameters for a variation of an existing challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeVariationParams {
    pub base_challenge_id: String,
    /// The original challenge text the variation is derived from.
    pub base_challenge: String,
    /// How to vary it (e.g. "harder", "different_context").
    pub variation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

/// Parameters for evaluating a user's response to a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationParams {
    pub challenge_id: String,
    pub challenge_prompt: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rubric: Vec<String>,
}

/// Parameters for personality insight generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalityParams {
    #[serde(default)]
    pub attitudes: Attitudes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
}

/// Parameters for focus-area recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusAreaParams {
    #[serde(default)]
    pub attitudes: Attitudes,
    #[serde(default = "default_focus_count")]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub existing: Vec<String>,
}

fn default_focus_count() -> u32 {
    3
}

/// Strongly-typed domain parameters, one variant per request type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request_type", rename_all = "snake_case")]
pub enum DomainParams {
    Challenge(ChallengeParams),
    ChallengeVariation(ChallengeVariationParams),
    Evaluation(EvaluationParams),
    Personality(PersonalityParams),
    FocusArea(FocusAreaParams),
}

impl DomainParams {
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Challenge(_) => RequestType::Challenge,
            Self::ChallengeVariation(_) => RequestType::ChallengeVariation,
            Self::Evaluation(_) => RequestType::Evaluation,
            Self::Personality(_) => RequestType::Personality,
            Self::FocusArea(_) => RequestType::FocusArea,
        }
    }

    /// The variant's parameters as JSON, without the `request_type` tag.
    pub fn to_value(&self) -> serde_json::Value {
        let value = match self {
            Self::Challenge(p) => serde_json::to_value(p),
            Self::ChallengeVariation(p) => serde_json::to_value(p),
            Self::Evaluation(p) => serde_json::to_value(p),
            Self::Personality(p) => serde_json::to_value(p),
            Self::FocusArea(p) => serde_json::to_value(p),
        };
        // Plain structs with string keys always serialize.
        value.unwrap_or(serde_json::Value::Null)
    }

    /// Attitude scores carried by the parameters themselves, if any.
    pub fn attitudes(&self) -> Option<&Attitudes> {
        match self {
            Self::Personality(p) if !p.attitudes.is_empty() => Some(&p.attitudes),
            Self::FocusArea(p) if !p.attitudes.is_empty() => Some(&p.attitudes),
            _ => None,
        }
    }
}

// ── Sampling & prompt context ─────────────────────────────────────────────

/// Options passed through to the generator. Not part of cache identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Per-call timeout enforced by the generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// What the caller knows about the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub focus_areas: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attitudes: Attitudes,
}

/// One past interaction, oldest first in [`PromptContext::history`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Inputs rendered into the prompt. Not part of cache identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryItem>,
}

// ── Request ───────────────────────────────────────────────────────────────

/// A request for one generated artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub subject_id: String,

    pub params: DomainParams,

    /// Conversation namespace. Defaults to the request type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_scope: Option<String>,

    #[serde(default)]
    pub force_refresh: bool,

    #[serde(default)]
    pub sampling: SamplingOptions,

    #[serde(default)]
    pub context: PromptContext,
}

impl GenerationRequest {
    pub fn new(subject_id: impl Into<String>, params: DomainParams) -> Self {
        Self {
            subject_id: subject_id.into(),
            params,
            conversation_scope: None,
            force_refresh: false,
            sampling: SamplingOptions::default(),
            context: PromptContext::default(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.conversation_scope = Some(scope.into());
        self
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn with_context(mut self, context: PromptContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn request_type(&self) -> RequestType {
        self.params.request_type()
    }

    /// The effective conversation scope.
    pub fn scope(&self) -> String {
        match self.conversation_scope.as_deref().map(str::trim) {
            Some(scope) if !scope.is_empty() => scope.to_string(),
            _ => self.request_type().as_str().to_string(),
        }
    }

    /// Checks the request envelope. Parameter- and context-level checks
    /// belong to the prompt assembler.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.subject_id.trim().is_empty() {
            return Err(ValidationError::missing("subject_id"));
        }
        if let Some(scope) = &self.conversation_scope
            && scope.trim().is_empty()
        {
            return Err(ValidationError::invalid(
                "conversation_scope",
                "must not be blank when provided",
            ));
        }
        if let Some(t) = self.sampling.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ValidationError::invalid(
                "sampling.temperature",
                "must be between 0.0 and 2.0",
            ));
        }
        if self.sampling.timeout_secs == Some(0) {
            return Err(ValidationError::invalid(
                "sampling.timeout_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge() -> DomainParams {
        DomainParams::Challenge(ChallengeParams {
            focus_area: "prompt engineering".into(),
            difficulty: Some("medium".into()),
            challenge_type: None,
            topic: None,
        })
    }

    #[test]
    fn request_type_parses_loosely() {
        assert_eq!(
            "Challenge-Variation".parse::<RequestType>().unwrap(),
            RequestType::ChallengeVariation
        );
        assert_eq!(" focus_area ".parse::<RequestType>().unwrap(), RequestType::FocusArea);
        assert!(matches!(
            "summary".parse::<RequestType>(),
            Err(ValidationError::UnknownRequestType(_))
        ));
    }

    #[test]
    fn default_scope_is_request_type() {
        let req = GenerationRequest::new("u1", challenge());
        assert_eq!(req.scope(), "challenge");

        let scoped = GenerationRequest::new("u1", challenge()).with_scope("  onboarding ");
        assert_eq!(scoped.scope(), "onboarding");
    }

    #[test]
    fn blank_subject_rejected() {
        let req = GenerationRequest::new("   ", challenge());
        assert_eq!(
            req.validate(),
            Err(ValidationError::MissingField("subject_id".into()))
        );
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let req = GenerationRequest::new("u1", challenge()).with_sampling(SamplingOptions {
            temperature: Some(3.5),
            ..Default::default()
        });
        assert!(matches!(
            req.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn request_deserializes_from_tagged_json() {
        let json = serde_json::json!({
            "subject_id": "u42",
            "params": {
                "request_type": "evaluation",
                "challenge_id": "c1",
                "challenge_prompt": "Explain tokenization",
                "response": "Splitting text into units"
            },
            "force_refresh": true
        });
        let req: GenerationRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.request_type(), RequestType::Evaluation);
        assert!(req.force_refresh);
        assert!(req.context.user.is_none());
        assert_eq!(req.sampling, SamplingOptions::default());
    }

    #[test]
    fn params_value_omits_tag() {
        let value = challenge().to_value();
        assert!(value.get("request_type").is_none());
        assert_eq!(value["focus_area"], "prompt engineering");
    }

    #[test]
    fn focus_area_count_defaults() {
        let params: DomainParams = serde_json::from_value(serde_json::json!({
            "request_type": "focus_area",
            "attitudes": { "tech_savvy": 80 }
        }))
        .unwrap();
        match params {
            DomainParams::FocusArea(p) => {
                assert_eq!(p.count, 3);
                assert_eq!(p.attitudes["tech_savvy"], 80.0);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
