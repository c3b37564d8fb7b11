//! In-memory state store, useful for testing and ephemeral processes.

use async_trait::async_trait;
use chrono::Utc;
use gencache_core::conversation::{ConversationState, StateStore};
use gencache_core::error::StoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// Records by ID.
    states: HashMap<String, ConversationState>,
    /// `(subject_id, scope)` → record ID.
    index: HashMap<(String, String), String>,
}

/// An in-memory store. Creation happens under a single write lock, so
/// concurrent `find_or_create` calls for one pair always agree on the record.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversation records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.states.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn find_or_create(
        &self,
        subject_id: &str,
        scope: &str,
    ) -> Result<ConversationState, StoreError> {
        let key = (subject_id.to_string(), scope.to_string());

        if let Some(state) = {
            let inner = self.inner.read().await;
            inner.index.get(&key).and_then(|id| inner.states.get(id)).cloned()
        } {
            return Ok(state);
        }

        let mut inner = self.inner.write().await;
        // Another task may have created it between the two locks.
        if let Some(state) = inner.index.get(&key).and_then(|id| inner.states.get(id)) {
            return Ok(state.clone());
        }

        let state = ConversationState::new(subject_id, scope);
        inner.index.insert(key, state.id.clone());
        inner.states.insert(state.id.clone(), state.clone());
        Ok(state)
    }

    async fn get(&self, id: &str) -> Result<Option<ConversationState>, StoreError> {
        Ok(self.inner.read().await.states.get(id).cloned())
    }

    async fn update_token(&self, id: &str, token: Option<&str>) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.states.get_mut(id) {
            Some(state) => {
                state.last_continuation_token = token.map(str::to_string);
                state.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_or_create_is_idempotent() {
        let store = InMemoryStateStore::new();
        let first = store.find_or_create("u1", "challenge").await.unwrap();
        let second = store.find_or_create("u1", "challenge").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn scopes_are_independent() {
        let store = InMemoryStateStore::new();
        let a = store.find_or_create("u1", "challenge").await.unwrap();
        let b = store.find_or_create("u1", "evaluation").await.unwrap();
        let c = store.find_or_create("u2", "challenge").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn update_token_round_trip() {
        let store = InMemoryStateStore::new();
        let state = store.find_or_create("u1", "challenge").await.unwrap();
        assert!(store.update_token(&state.id, Some("resp_1")).await.unwrap());
        assert!(store.update_token(&state.id, Some("resp_2")).await.unwrap());

        let stored = store.get(&state.id).await.unwrap().unwrap();
        assert_eq!(stored.last_continuation_token.as_deref(), Some("resp_2"));
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn clearing_token_keeps_record() {
        let store = InMemoryStateStore::new();
        let state = store.find_or_create("u1", "challenge").await.unwrap();
        store.update_token(&state.id, Some("resp_1")).await.unwrap();
        assert!(store.update_token(&state.id, None).await.unwrap());

        let resolved = store.find_or_create("u1", "challenge").await.unwrap();
        assert_eq!(resolved.id, state.id);
        assert!(resolved.last_continuation_token.is_none());
    }

    #[tokio::test]
    async fn update_unknown_id_returns_false() {
        let store = InMemoryStateStore::new();
        assert!(!store.update_token("missing", Some("resp")).await.unwrap());
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_creates_share_one_record() {
        let store = InMemoryStateStore::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.find_or_create("u1", "challenge").await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.len().await, 1);
    }
}
