//! Conversation state: durable continuity between independent generations.
//!
//! One [`ConversationState`] exists per `(subject_id, scope)` pair. It only
//! remembers the continuation token of the most recent successful generation;
//! the generator keeps the actual conversational context server-side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// A durable conversation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: String,
    pub subject_id: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_continuation_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// A fresh record with no continuation token.
    pub fn new(subject_id: impl Into<String>, scope: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.into(),
            scope: scope.into(),
            last_continuation_token: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The StateStore collaborator.
///
/// Implementations: SQLite, in-memory (for testing), none (continuity off).
/// `find_or_create` must never produce two records for the same pair, even
/// under concurrent calls.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory", "none").
    fn name(&self) -> &str;

    /// Return the record for `(subject_id, scope)`, creating it if absent.
    async fn find_or_create(
        &self,
        subject_id: &str,
        scope: &str,
    ) -> Result<ConversationState, StoreError>;

    /// Get a record by ID.
    async fn get(&self, id: &str) -> Result<Option<ConversationState>, StoreError>;

    /// Overwrite the continuation token of a record. `None` clears it.
    ///
    /// Returns `false` if no record has that ID.
    async fn update_token(&self, id: &str, token: Option<&str>) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_no_token() {
        let state = ConversationState::new("u1", "challenge");
        assert!(state.last_continuation_token.is_none());
        assert_eq!(state.created_at, state.updated_at);
        assert!(!state.id.is_empty());
    }

    #[test]
    fn state_serialization_skips_missing_token() {
        let state = ConversationState::new("u1", "evaluation");
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("evaluation"));
        assert!(!json.contains("last_continuation_token"));
    }
}
