//! Structural checks on generator payloads.
//!
//! The generator is asked for JSON of a known shape (see
//! [`PayloadSchema::contract`]); anything that comes back without the
//! required fields is rejected before it can reach the cache.

use gencache_core::request::RequestType;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Score,
    List,
}

impl FieldKind {
    fn describe(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Score => "number 0-100",
            Self::List => "non-empty array",
        }
    }
}

/// Required top-level fields of one payload shape.
#[derive(Debug, Clone, Copy)]
pub struct PayloadSchema {
    request_type: RequestType,
    required: &'static [(&'static str, FieldKind)],
}

const CHALLENGE_FIELDS: &[(&str, FieldKind)] = &[
    ("title", FieldKind::Text),
    ("description", FieldKind::Text),
    ("difficulty", FieldKind::Text),
];

const EVALUATION_FIELDS: &[(&str, FieldKind)] =
    &[("score", FieldKind::Score), ("feedback", FieldKind::Text)];

const PERSONALITY_FIELDS: &[(&str, FieldKind)] = &[("insights", FieldKind::List)];

const FOCUS_AREA_FIELDS: &[(&str, FieldKind)] = &[("focus_areas", FieldKind::List)];

impl PayloadSchema {
    pub fn for_type(request_type: RequestType) -> Self {
        let required = match request_type {
            RequestType::Challenge | RequestType::ChallengeVariation => CHALLENGE_FIELDS,
            RequestType::Evaluation => EVALUATION_FIELDS,
            RequestType::Personality => PERSONALITY_FIELDS,
            RequestType::FocusArea => FOCUS_AREA_FIELDS,
        };
        Self {
            request_type,
            required,
        }
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Check a payload. The error names the first offending field.
    pub fn validate(&self, payload: &Value) -> Result<(), String> {
        let Some(object) = payload.as_object() else {
            return Err(format!(
                "{} payload must be a JSON object",
                self.request_type
            ));
        };

        for (field, kind) in self.required {
            let Some(value) = object.get(*field) else {
                return Err(format!("missing field '{field}'"));
            };
            let ok = match kind {
                FieldKind::Text => value.as_str().is_some_and(|s| !s.trim().is_empty()),
                FieldKind::Score => value.as_f64().is_some_and(|n| (0.0..=100.0).contains(&n)),
                FieldKind::List => value.as_array().is_some_and(|items| !items.is_empty()),
            };
            if !ok {
                return Err(format!("field '{field}' must be a {}", kind.describe()));
            }
        }
        Ok(())
    }

    /// Output instructions appended to every prompt of this type.
    pub fn contract(&self) -> String {
        let fields = self
            .required
            .iter()
            .map(|(field, kind)| format!("\"{field}\" ({})", kind.describe()))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Respond with a single JSON object and nothing else. Required fields: {fields}. \
             Additional fields are allowed."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn challenge_payload_accepted() {
        let schema = PayloadSchema::for_type(RequestType::Challenge);
        let payload = json!({
            "title": "Bias hunt",
            "description": "Find the bias in this prompt.",
            "difficulty": "medium",
            "hints": ["look at the adjectives"]
        });
        assert!(schema.validate(&payload).is_ok());
    }

    #[test]
    fn variation_shares_challenge_shape() {
        let schema = PayloadSchema::for_type(RequestType::ChallengeVariation);
        let err = schema.validate(&json!({"title": "t", "description": "d"})).unwrap_err();
        assert!(err.contains("difficulty"));
    }

    #[test]
    fn non_object_rejected() {
        let schema = PayloadSchema::for_type(RequestType::Personality);
        assert!(schema.validate(&json!(["insight"])).is_err());
        assert!(schema.validate(&json!("text")).is_err());
    }

    #[test]
    fn blank_text_rejected() {
        let schema = PayloadSchema::for_type(RequestType::Evaluation);
        let err = schema.validate(&json!({"score": 70, "feedback": "  "})).unwrap_err();
        assert!(err.contains("feedback"));
    }

    #[test]
    fn score_must_be_in_range() {
        let schema = PayloadSchema::for_type(RequestType::Evaluation);
        assert!(schema.validate(&json!({"score": 100, "feedback": "ok"})).is_ok());
        assert!(schema.validate(&json!({"score": 0.5, "feedback": "ok"})).is_ok());
        assert!(schema.validate(&json!({"score": 101, "feedback": "ok"})).is_err());
        assert!(schema.validate(&json!({"score": "high", "feedback": "ok"})).is_err());
    }

    #[test]
    fn empty_list_rejected() {
        let schema = PayloadSchema::for_type(RequestType::FocusArea);
        assert!(schema.validate(&json!({"focus_areas": []})).is_err());
        assert!(schema.validate(&json!({"focus_areas": [{"name": "ethics"}]})).is_ok());
    }

    #[test]
    fn contract_lists_required_fields() {
        let contract = PayloadSchema::for_type(RequestType::Evaluation).contract();
        assert!(contract.contains("\"score\" (number 0-100)"));
        assert!(contract.contains("\"feedback\" (string)"));
    }
}
