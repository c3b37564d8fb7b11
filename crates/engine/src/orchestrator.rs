//! The generation orchestrator.
//!
//! Composes fingerprinting, the cache, conversation continuity, prompt
//! assembly and the generator into a single `generate` call:
//!
//! ```text
//! validate ─▶ fingerprint ─▶ cache ─┬─ hit ──────────────────────────────────▶ result
//!                                   └─ miss ─▶ resolve state ─▶ build prompt
//!                                              ─▶ send ─▶ check payload
//!                                              ─▶ update token ─▶ store ─────▶ result
//! ```
//!
//! Validation failures have no side effects. Generation failures are never
//! cached. Conversation-state failures only cost continuity: the request is
//! generated without a continuation token.

use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use gencache_config::AppConfig;
use gencache_core::conversation::StateStore;
use gencache_core::error::{Error, ErrorContext, GenerationError, Result, ValidationError};
use gencache_core::generation::{Fingerprint, GenerationResult};
use gencache_core::generator::{Generator, GeneratorRequest};
use gencache_core::request::GenerationRequest;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cache::{CacheOutcome, CacheSettings, CacheStats, FlightOutput, GenerationCache};
use crate::conversation::ConversationStateManager;
use crate::fingerprint::FingerprintBuilder;
use crate::prompt::{AssembledPrompt, PromptAssembler};
use crate::schema::PayloadSchema;

#[derive(Clone)]
pub struct GenerationOrchestrator {
    cache: GenerationCache,
    conversations: ConversationStateManager,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
}

impl GenerationOrchestrator {
    /// An orchestrator with default cache and prompt settings.
    pub fn new(generator: Arc<dyn Generator>, store: Arc<dyn StateStore>) -> Self {
        Self {
            cache: GenerationCache::default(),
            conversations: ConversationStateManager::new(store),
            assembler: PromptAssembler::default(),
            generator,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        generator: Arc<dyn Generator>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        info!(
            generator = generator.name(),
            store = store.name(),
            cache_enabled = config.cache.enabled,
            "Orchestrator initialized"
        );
        Self::new(generator, store)
            .with_cache(GenerationCache::new(CacheSettings::from(&config.cache)))
            .with_assembler(PromptAssembler::from_config(&config.prompts))
    }

    /// Use a specific cache handle, e.g. one shared with another orchestrator.
    pub fn with_cache(mut self, cache: GenerationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn cache(&self) -> &GenerationCache {
        &self.cache
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Produce the result for a request, from the cache when possible.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        let request_type = request.request_type();
        let subject_id = request.subject_id.trim().to_string();
        let context = ErrorContext::new(subject_id.clone()).with_request_type(request_type);

        self.validate(&request, &context)?;

        let fingerprint = FingerprintBuilder::for_request(&request);
        let context = context.with_fingerprint(fingerprint.clone());
        let force_refresh = request.force_refresh;

        let span = info_span!(
            "generate",
            subject_id = %subject_id,
            request_type = %request_type,
            fingerprint = %fingerprint.short(),
        );

        async {
            let pipeline = Pipeline {
                conversations: self.conversations.clone(),
                assembler: self.assembler.clone(),
                generator: Arc::clone(&self.generator),
                fingerprint: fingerprint.clone(),
                subject_id: subject_id.clone(),
                request,
            };

            let outcome = self
                .cache
                .get_or_generate(&fingerprint, &subject_id, force_refresh, move || {
                    pipeline.run().in_current_span().boxed()
                })
                .await;

            match outcome {
                Ok((result, how)) => {
                    match how {
                        CacheOutcome::Hit => debug!("Served from cache"),
                        CacheOutcome::Coalesced => debug!("Served by in-flight generation"),
                        CacheOutcome::Generated => debug!(force_refresh, "Generated"),
                    }
                    Ok(result)
                }
                Err(e) => {
                    warn!(error = %e, "Generation failed");
                    Err(Error::generation(context, e))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Drop cached results for one subject, or all of them.
    pub fn clear_cache(&self, subject_id: Option<&str>) -> usize {
        match subject_id {
            Some(subject) => self.cache.invalidate(subject.trim()),
            None => self.cache.invalidate_all(),
        }
    }

    /// Forget the continuation token of `(subject_id, scope)`.
    ///
    /// Unlike `generate`, store failures are returned, not degraded.
    pub async fn reset_conversation(&self, subject_id: &str, scope: &str) -> Result<()> {
        let (subject_id, scope) = (subject_id.trim(), scope.trim());
        let context = ErrorContext::new(subject_id);
        if subject_id.is_empty() {
            return Err(Error::validation(context, ValidationError::missing("subject_id")));
        }
        if scope.is_empty() {
            return Err(Error::validation(context, ValidationError::missing("scope")));
        }
        let state = self
            .conversations
            .resolve(subject_id, scope)
            .await
            .map_err(|e| Error::processing(context.clone(), e))?;
        self.conversations
            .clear_last_token(&state.id)
            .await
            .map_err(|e| Error::processing(context, e))?;
        info!(subject_id, scope, "Conversation reset");
        Ok(())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Assemble the prompt a request would be sent with, without generating.
    pub fn preview_prompt(&self, request: &GenerationRequest) -> Result<AssembledPrompt> {
        let context = ErrorContext::new(request.subject_id.trim())
            .with_request_type(request.request_type());
        self.validate(request, &context)?;
        self.assembler
            .build(&request.params, &request.context)
            .map_err(|e| Error::validation(context, e))
    }

    fn validate(&self, request: &GenerationRequest, context: &ErrorContext) -> Result<()> {
        request
            .validate()
            .and_then(|()| self.assembler.validate(&request.params, &request.context))
            .map_err(|e| {
                debug!(error = %e, subject_id = %context.subject_id, "Request rejected");
                Error::validation(context.clone(), e)
            })
    }
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("generator", &self.generator.name())
            .field("conversations", &self.conversations)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Everything a cache miss needs, owned so it can run on its own task.
struct Pipeline {
    conversations: ConversationStateManager,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
    fingerprint: Fingerprint,
    subject_id: String,
    request: GenerationRequest,
}

impl Pipeline {
    async fn run(self) -> FlightOutput {
        let request_type = self.request.request_type();
        let (state_id, continuation_token) = self.continuation().await;

        let prompt = self
            .assembler
            .build(&self.request.params, &self.request.context)
            .map_err(GenerationError::Prompt)?;

        let continued = continuation_token.is_some();
        let response = match self
            .generator
            .send(GeneratorRequest {
                request_type,
                system_prompt: prompt.system_prompt,
                user_prompt: prompt.user_prompt,
                continuation_token,
                sampling: self.request.sampling.clone(),
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if continued && e.is_rejected_request() {
                    self.forget_continuation(state_id.as_deref()).await;
                }
                return Err(e.into());
            }
        };

        PayloadSchema::for_type(request_type)
            .validate(&response.payload)
            .map_err(GenerationError::InvalidPayload)?;

        if let (Some(state_id), Some(token)) = (&state_id, &response.continuation_token)
            && let Err(e) = self.conversations.set_last_token(state_id, token).await
        {
            warn!(error = %e, state_id = %state_id, "Could not record continuation token");
        }

        info!(
            generator = self.generator.name(),
            model = %response.model,
            continued = state_id.is_some(),
            "Generation complete"
        );

        Ok(GenerationResult {
            payload: response.payload,
            continuation_token: response.continuation_token,
            from_cache: false,
            conversation_state_id: state_id,
            fingerprint: self.fingerprint,
            request_type,
            generated_at: Utc::now(),
            usage: response.usage,
        })
    }

    /// Drop a token the generator refused so the next request starts a new
    /// conversation instead of failing the same way.
    async fn forget_continuation(&self, state_id: Option<&str>) {
        let Some(state_id) = state_id else { return };
        match self.conversations.clear_last_token(state_id).await {
            Ok(()) => warn!(state_id, "Generator rejected continuation, token cleared"),
            Err(e) => warn!(error = %e, state_id, "Could not clear rejected continuation token"),
        }
    }

    /// The conversation record and its last token. Store failures degrade to
    /// "no continuity" instead of failing the request.
    async fn continuation(&self) -> (Option<String>, Option<String>) {
        let scope = self.request.scope();
        let state = match self.conversations.resolve(&self.subject_id, &scope).await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, scope = %scope, "Conversation state unavailable, generating without continuity");
                return (None, None);
            }
        };

        match self.conversations.get_last_token(&state.id).await {
            Ok(token) => (Some(state.id), token),
            Err(e) => {
                warn!(error = %e, state_id = %state.id, "Continuation token unavailable");
                (Some(state.id), None)
            }
        }
    }
}
