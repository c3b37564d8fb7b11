//! No-op state store. Disables conversation continuity entirely.

use async_trait::async_trait;
use gencache_core::conversation::{ConversationState, StateStore};
use gencache_core::error::StoreError;

/// A store that remembers nothing. Every resolve yields a fresh record and
/// token updates are accepted and dropped, so generations never continue a
/// prior response.
pub struct NoopStateStore;

#[async_trait]
impl StateStore for NoopStateStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn find_or_create(
        &self,
        subject_id: &str,
        scope: &str,
    ) -> Result<ConversationState, StoreError> {
        Ok(ConversationState::new(subject_id, scope))
    }

    async fn get(&self, _id: &str) -> Result<Option<ConversationState>, StoreError> {
        Ok(None)
    }

    async fn update_token(&self, _id: &str, _token: Option<&str>) -> Result<bool, StoreError> {
        Ok(true)
    }
}
