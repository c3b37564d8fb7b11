//! Prompt assembly.
//!
//! Builds the `(system_prompt, user_prompt)` pair for a request from its
//! domain parameters and prompt context. The layout is deterministic:
//! identical inputs always produce identical prompts.
//!
//! ```text
//! system:  <role>
//!          [Personalization]   (only when attitude data is present)
//!          [Output]            (the payload contract)
//!
//! user:    [Task]
//!          [Parameters]
//!          [User Profile]      (when context.user is set)
//!          [Recent History]    (last `history_window` items, oldest first)
//! ```

pub mod templates;

use gencache_config::PromptConfig;
use gencache_core::error::ValidationError;
use gencache_core::profile::{
    CommunicationStyle, DetailLevel, PersonalizationProfile, ResponseFormat,
};
use gencache_core::request::{
    Attitudes, DomainParams, HistoryItem, PromptContext, RequestType, UserProfile,
};

use crate::profile::{ProfileThresholds, PromptProfileMapper};
use crate::schema::PayloadSchema;

pub const DEFAULT_HISTORY_WINDOW: usize = 5;

/// Upper bound on `focus_area.count`.
pub const MAX_FOCUS_AREAS: u32 = 10;

/// An assembled prompt pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub system_prompt: String,
    pub user_prompt: String,
    /// The profile that shaped the system prompt, if attitude data existed.
    pub profile: Option<PersonalizationProfile>,
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    mapper: PromptProfileMapper,
    history_window: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(PromptProfileMapper::default(), DEFAULT_HISTORY_WINDOW)
    }
}

impl PromptAssembler {
    pub fn new(mapper: PromptProfileMapper, history_window: usize) -> Self {
        Self {
            mapper,
            history_window,
        }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(
            PromptProfileMapper::new(ProfileThresholds::from(&config.thresholds)),
            config.history_window,
        )
    }

    pub fn mapper(&self) -> &PromptProfileMapper {
        &self.mapper
    }

    /// Check that `params` and `context` carry everything the template for
    /// this request type needs. Has no side effects.
    pub fn validate(
        &self,
        params: &DomainParams,
        context: &PromptContext,
    ) -> Result<(), ValidationError> {
        match params {
            DomainParams::Challenge(p) => {
                require_user(context)?;
                require_text("params.focus_area", &p.focus_area)?;
            }
            DomainParams::ChallengeVariation(p) => {
                require_user(context)?;
                require_text("params.base_challenge", &p.base_challenge)?;
            }
            DomainParams::Evaluation(p) => {
                require_text("params.challenge_prompt", &p.challenge_prompt)?;
                require_text("params.response", &p.response)?;
            }
            DomainParams::Personality(_) => {}
            DomainParams::FocusArea(p) => {
                require_user(context)?;
                if !(1..=MAX_FOCUS_AREAS).contains(&p.count) {
                    return Err(ValidationError::invalid(
                        "params.count",
                        format!("must be between 1 and {MAX_FOCUS_AREAS}"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Assemble the prompt pair.
    pub fn build(
        &self,
        params: &DomainParams,
        context: &PromptContext,
    ) -> Result<AssembledPrompt, ValidationError> {
        self.validate(params, context)?;

        let template = templates::render(params);
        let schema = PayloadSchema::for_type(params.request_type());
        let profile = merged_attitudes(params, context).map(|a| self.mapper.map_profile(&a));

        let mut system_prompt = String::from(template.role);
        if let Some(profile) = &profile {
            system_prompt.push_str("\n\n[Personalization]\n");
            system_prompt.push_str(&personalization_clauses(profile));
        }
        system_prompt.push_str("\n\n[Output]\n");
        system_prompt.push_str(&schema.contract());

        let mut user_prompt = format!("[Task]\n{}", template.task);
        if !template.parameters.is_empty() {
            user_prompt.push_str("\n\n[Parameters]\n");
            for (label, value) in &template.parameters {
                user_prompt.push_str(&format!("{label}: {value}\n"));
            }
            trim_trailing_newline(&mut user_prompt);
        }
        if let Some(user) = &context.user {
            let rendered = render_user(user);
            if !rendered.is_empty() {
                user_prompt.push_str("\n\n[User Profile]\n");
                user_prompt.push_str(&rendered);
            }
        }
        let history = self.recent_history(&context.history);
        if !history.is_empty() {
            user_prompt.push_str("\n\n[Recent History]\n");
            for item in history {
                user_prompt.push_str(&render_history_item(item));
                user_prompt.push('\n');
            }
            trim_trailing_newline(&mut user_prompt);
        }

        Ok(AssembledPrompt {
            system_prompt,
            user_prompt,
            profile,
        })
    }

    /// Assemble from a request type name and untyped parameters.
    pub fn build_by_name(
        &self,
        request_type: &str,
        params: &serde_json::Value,
        context: &PromptContext,
    ) -> Result<AssembledPrompt, ValidationError> {
        let request_type: RequestType = request_type.parse()?;
        let params = typed_params(request_type, params)?;
        self.build(&params, context)
    }

    fn recent_history<'a>(&self, history: &'a [HistoryItem]) -> &'a [HistoryItem] {
        let skip = history.len().saturating_sub(self.history_window);
        &history[skip..]
    }
}

/// Attach the type tag to loose parameters and deserialize them.
pub fn typed_params(
    request_type: RequestType,
    params: &serde_json::Value,
) -> Result<DomainParams, ValidationError> {
    let mut object = match params {
        serde_json::Value::Object(map) => map.clone(),
        serde_json::Value::Null => serde_json::Map::new(),
        _ => return Err(ValidationError::invalid("params", "must be a JSON object")),
    };
    object.insert(
        "request_type".into(),
        serde_json::Value::String(request_type.as_str().into()),
    );
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| ValidationError::invalid("params", e.to_string()))
}

fn require_user(context: &PromptContext) -> Result<(), ValidationError> {
    match context.user {
        Some(_) => Ok(()),
        None => Err(ValidationError::missing("context.user")),
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::missing(field));
    }
    Ok(())
}

/// User attitudes overlaid with parameter attitudes; `None` when neither has any.
fn merged_attitudes(params: &DomainParams, context: &PromptContext) -> Option<Attitudes> {
    let mut merged = context
        .user
        .as_ref()
        .map(|u| u.attitudes.clone())
        .unwrap_or_default();
    if let Some(from_params) = params.attitudes() {
        merged.extend(from_params.iter().map(|(k, v)| (k.clone(), *v)));
    }
    (!merged.is_empty()).then_some(merged)
}

fn personalization_clauses(profile: &PersonalizationProfile) -> String {
    let detail = match profile.detail_level {
        DetailLevel::Basic => "Keep explanations short and avoid jargon.",
        DetailLevel::Detailed => "Give moderately detailed explanations with concrete examples.",
        DetailLevel::Comprehensive => {
            "Go deep: include technical nuance, edge cases and advanced concepts."
        }
    };
    let style = match profile.communication_style {
        CommunicationStyle::Casual => "Use a friendly, conversational tone.",
        CommunicationStyle::Formal => "Use a formal, precise tone.",
        CommunicationStyle::Technical => "Use technical vocabulary freely.",
    };
    let format = match profile.response_format {
        ResponseFormat::Structured => "Organize text fields as short labelled lists.",
        ResponseFormat::Conversational => "Write text fields as flowing prose.",
        ResponseFormat::Mixed => "Combine short prose with lists where helpful.",
    };
    format!(
        "Detail level: {} ({detail})\nCommunication style: {} ({style})\nResponse format: {} ({format})",
        profile.detail_level.as_str(),
        profile.communication_style.as_str(),
        profile.response_format.as_str(),
    )
}

fn render_user(user: &UserProfile) -> String {
    let mut lines = Vec::new();
    if let Some(name) = &user.display_name {
        lines.push(format!("Name: {name}"));
    }
    if let Some(level) = &user.experience_level {
        lines.push(format!("Experience: {level}"));
    }
    if let Some(role) = &user.role {
        lines.push(format!("Role: {role}"));
    }
    if !user.interests.is_empty() {
        lines.push(format!("Interests: {}", user.interests.join(", ")));
    }
    if !user.focus_areas.is_empty() {
        lines.push(format!("Focus areas: {}", user.focus_areas.join(", ")));
    }
    if !user.attitudes.is_empty() {
        lines.push(format!(
            "Attitudes: {}",
            templates::format_attitudes(&user.attitudes)
        ));
    }
    lines.join("\n")
}

fn render_history_item(item: &HistoryItem) -> String {
    let mut line = format!("- {}: {}", item.kind, item.title);
    if let Some(score) = item.score {
        line.push_str(&format!(" (score {score})"));
    }
    if let Some(at) = item.completed_at {
        line.push_str(&format!(" on {}", at.format("%Y-%m-%d")));
    }
    if let Some(summary) = &item.summary {
        line.push_str(&format!("; {summary}"));
    }
    line
}

fn trim_trailing_newline(s: &mut String) {
    while s.ends_with('\n') {
        s.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gencache_core::request::{
        ChallengeParams, EvaluationParams, FocusAreaParams, PersonalityParams,
    };

    fn user() -> UserProfile {
        UserProfile {
            display_name: Some("Ada".into()),
            experience_level: Some("intermediate".into()),
            ..Default::default()
        }
    }

    fn challenge(focus: &str) -> DomainParams {
        DomainParams::Challenge(ChallengeParams {
            focus_area: focus.into(),
            difficulty: Some("medium".into()),
            challenge_type: None,
            topic: None,
        })
    }

    fn history(n: usize) -> Vec<HistoryItem> {
        (1..=n)
            .map(|i| HistoryItem {
                kind: "challenge".into(),
                title: format!("Item {i}"),
                summary: None,
                score: None,
                completed_at: None,
            })
            .collect()
    }

    #[test]
    fn challenge_requires_user() {
        let err = PromptAssembler::default()
            .build(&challenge("ethics"), &PromptContext::default())
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("context.user".into()));
    }

    #[test]
    fn blank_focus_area_rejected() {
        let ctx = PromptContext {
            user: Some(user()),
            history: vec![],
        };
        let err = PromptAssembler::default()
            .validate(&challenge("   "), &ctx)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("params.focus_area".into()));
    }

    #[test]
    fn evaluation_needs_no_user_but_needs_response() {
        let assembler = PromptAssembler::default();
        let mut params = EvaluationParams {
            challenge_id: "c1".into(),
            challenge_prompt: "Explain temperature".into(),
            response: "It controls randomness".into(),
            rubric: vec!["accuracy".into()],
        };
        let ok = assembler.build(
            &DomainParams::Evaluation(params.clone()),
            &PromptContext::default(),
        );
        assert!(ok.is_ok());

        params.response = " ".into();
        let err = assembler
            .build(&DomainParams::Evaluation(params), &PromptContext::default())
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("params.response".into()));
    }

    #[test]
    fn focus_area_count_bounds() {
        let ctx = PromptContext {
            user: Some(user()),
            history: vec![],
        };
        let assembler = PromptAssembler::default();
        for (count, ok) in [(0, false), (1, true), (10, true), (11, false)] {
            let params = DomainParams::FocusArea(FocusAreaParams {
                attitudes: Default::default(),
                count,
                existing: vec![],
            });
            assert_eq!(assembler.validate(&params, &ctx).is_ok(), ok, "count={count}");
        }
    }

    #[test]
    fn layout_is_deterministic() {
        let ctx = PromptContext {
            user: Some(user()),
            history: history(2),
        };
        let assembler = PromptAssembler::default();
        let a = assembler.build(&challenge("ethics"), &ctx).unwrap();
        let b = assembler.build(&challenge("ethics"), &ctx).unwrap();
        assert_eq!(a, b);

        assert!(a.user_prompt.starts_with("[Task]\n"));
        let task = a.user_prompt.find("[Task]").unwrap();
        let params = a.user_prompt.find("[Parameters]").unwrap();
        let profile = a.user_prompt.find("[User Profile]").unwrap();
        let recent = a.user_prompt.find("[Recent History]").unwrap();
        assert!(task < params && params < profile && profile < recent);
        assert!(a.system_prompt.contains("[Output]"));
        assert!(a.system_prompt.contains("\"title\""));
    }

    #[test]
    fn no_attitudes_no_personalization() {
        let ctx = PromptContext {
            user: Some(user()),
            history: vec![],
        };
        let prompt = PromptAssembler::default().build(&challenge("ethics"), &ctx).unwrap();
        assert!(prompt.profile.is_none());
        assert!(!prompt.system_prompt.contains("[Personalization]"));
    }

    #[test]
    fn user_attitudes_shape_system_prompt() {
        let mut u = user();
        u.attitudes.insert("tech_savvy".into(), 95.0);
        u.attitudes.insert("early_adopter".into(), 90.0);
        u.attitudes.insert("security_conscious".into(), 85.0);
        let ctx = PromptContext {
            user: Some(u),
            history: vec![],
        };
        let prompt = PromptAssembler::default().build(&challenge("ethics"), &ctx).unwrap();
        let profile = prompt.profile.unwrap();
        assert_eq!(profile.detail_level, DetailLevel::Comprehensive);
        assert_eq!(profile.communication_style, CommunicationStyle::Formal);
        assert!(prompt.system_prompt.contains("Detail level: comprehensive"));
        assert!(prompt.system_prompt.contains("Communication style: formal"));
    }

    #[test]
    fn param_attitudes_override_user_attitudes() {
        let mut u = user();
        u.attitudes.insert("skeptical".into(), 90.0);
        let mut params = PersonalityParams::default();
        params.attitudes.insert("skeptical".into(), 10.0);
        let ctx = PromptContext {
            user: Some(u),
            history: vec![],
        };
        let prompt = PromptAssembler::default()
            .build(&DomainParams::Personality(params), &ctx)
            .unwrap();
        assert_eq!(prompt.profile.unwrap().response_format, ResponseFormat::Mixed);
    }

    #[test]
    fn history_window_keeps_most_recent() {
        let ctx = PromptContext {
            user: Some(user()),
            history: history(8),
        };
        let prompt = PromptAssembler::default().build(&challenge("ethics"), &ctx).unwrap();
        assert!(!prompt.user_prompt.contains("Item 3"));
        for i in 4..=8 {
            assert!(prompt.user_prompt.contains(&format!("- challenge: Item {i}")));
        }

        let narrow = PromptAssembler::new(PromptProfileMapper::default(), 1);
        let prompt = narrow.build(&challenge("ethics"), &ctx).unwrap();
        assert!(prompt.user_prompt.contains("Item 8"));
        assert!(!prompt.user_prompt.contains("Item 7"));
    }

    #[test]
    fn build_by_name_parses_type_and_params() {
        let ctx = PromptContext {
            user: Some(user()),
            history: vec![],
        };
        let assembler = PromptAssembler::default();
        let prompt = assembler
            .build_by_name("challenge", &serde_json::json!({"focus_area": "ethics"}), &ctx)
            .unwrap();
        assert!(prompt.user_prompt.contains("Focus area: ethics"));

        let err = assembler
            .build_by_name("summary", &serde_json::json!({}), &ctx)
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownRequestType(_)));

        let err = assembler
            .build_by_name("evaluation", &serde_json::json!({"challenge_id": 1}), &ctx)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn from_config_uses_window_and_thresholds() {
        let mut config = PromptConfig::default();
        config.history_window = 2;
        config.thresholds.significant = 10.0;
        let assembler = PromptAssembler::from_config(&config);
        assert_eq!(assembler.mapper().thresholds().significant, 10.0);
        assert_eq!(assembler.history_window, 2);
    }
}
