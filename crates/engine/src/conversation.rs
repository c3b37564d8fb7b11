//! Conversation continuity over a [`StateStore`].
//!
//! One durable record per `(subject_id, scope)`, holding the continuation
//! token of the last successful generation in that conversation.

use std::sync::Arc;

use gencache_core::conversation::{ConversationState, StateStore};
use gencache_core::error::{ProcessingError, StoreError};
use tracing::debug;

#[derive(Clone)]
pub struct ConversationStateManager {
    store: Arc<dyn StateStore>,
}

impl ConversationStateManager {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Find or create the record for `(subject_id, scope)`. Idempotent.
    pub async fn resolve(
        &self,
        subject_id: &str,
        scope: &str,
    ) -> Result<ConversationState, ProcessingError> {
        let state = self
            .store
            .find_or_create(subject_id, scope)
            .await
            .map_err(|e| self.store_error("resolve", e))?;
        debug!(subject_id, scope, state_id = %state.id, "Conversation resolved");
        Ok(state)
    }

    /// The last continuation token of a record. A missing record has none.
    pub async fn get_last_token(&self, state_id: &str) -> Result<Option<String>, ProcessingError> {
        let state = self
            .store
            .get(state_id)
            .await
            .map_err(|e| self.store_error("get_last_token", e))?;
        Ok(state.and_then(|s| s.last_continuation_token))
    }

    /// Overwrite the continuation token. Last write wins.
    pub async fn set_last_token(&self, state_id: &str, token: &str) -> Result<(), ProcessingError> {
        self.write_token(state_id, Some(token), "set_last_token").await?;
        debug!(state_id, "Continuation token updated");
        Ok(())
    }

    /// Forget the continuation token; the next generation starts fresh.
    pub async fn clear_last_token(&self, state_id: &str) -> Result<(), ProcessingError> {
        self.write_token(state_id, None, "clear_last_token").await?;
        debug!(state_id, "Continuation token cleared");
        Ok(())
    }

    async fn write_token(
        &self,
        state_id: &str,
        token: Option<&str>,
        operation: &'static str,
    ) -> Result<(), ProcessingError> {
        let updated = self
            .store
            .update_token(state_id, token)
            .await
            .map_err(|e| self.store_error(operation, e))?;
        if !updated {
            return Err(ProcessingError::StateNotFound(state_id.to_string()));
        }
        Ok(())
    }

    fn store_error(&self, operation: &'static str, source: StoreError) -> ProcessingError {
        ProcessingError::Store {
            store: self.store.name().to_string(),
            operation,
            source,
        }
    }
}

impl std::fmt::Debug for ConversationStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStateManager")
            .field("store", &self.store.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gencache_store::{InMemoryStateStore, NoopStateStore};

    fn manager() -> ConversationStateManager {
        ConversationStateManager::new(Arc::new(InMemoryStateStore::new()))
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let m = manager();
        let a = m.resolve("u1", "challenge").await.unwrap();
        let b = m.resolve("u1", "challenge").await.unwrap();
        let other = m.resolve("u1", "evaluation").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, other.id);
    }

    #[tokio::test]
    async fn token_round_trip_last_write_wins() {
        let m = manager();
        let state = m.resolve("u1", "challenge").await.unwrap();
        assert_eq!(m.get_last_token(&state.id).await.unwrap(), None);

        m.set_last_token(&state.id, "resp_1").await.unwrap();
        m.set_last_token(&state.id, "resp_2").await.unwrap();
        assert_eq!(
            m.get_last_token(&state.id).await.unwrap().as_deref(),
            Some("resp_2")
        );
    }

    #[tokio::test]
    async fn cleared_token_is_gone() {
        let m = manager();
        let state = m.resolve("u1", "challenge").await.unwrap();
        m.set_last_token(&state.id, "resp_1").await.unwrap();
        m.clear_last_token(&state.id).await.unwrap();
        assert_eq!(m.get_last_token(&state.id).await.unwrap(), None);

        let err = m.clear_last_token("missing").await.unwrap_err();
        assert!(matches!(err, ProcessingError::StateNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_state_has_no_token_and_cannot_be_updated() {
        let m = manager();
        assert_eq!(m.get_last_token("missing").await.unwrap(), None);
        let err = m.set_last_token("missing", "t").await.unwrap_err();
        assert!(matches!(err, ProcessingError::StateNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn noop_store_never_continues() {
        let m = ConversationStateManager::new(Arc::new(NoopStateStore));
        let state = m.resolve("u1", "challenge").await.unwrap();
        m.set_last_token(&state.id, "resp_1").await.unwrap();
        assert_eq!(m.get_last_token(&state.id).await.unwrap(), None);
        assert_eq!(m.store_name(), "none");
    }
}
