//! The gencache engine.
//!
//! Deduplicates generation requests by fingerprint, keeps one conversation
//! thread per `(subject, scope)` alive across calls, and personalizes prompts
//! from attitude scores. [`GenerationOrchestrator`] is the entry point.

pub mod cache;
pub mod conversation;
pub mod fingerprint;
pub mod orchestrator;
pub mod profile;
pub mod prompt;
pub mod schema;

pub use cache::{CacheOutcome, CacheSettings, CacheStats, GenerationCache};
pub use conversation::ConversationStateManager;
pub use fingerprint::FingerprintBuilder;
pub use orchestrator::GenerationOrchestrator;
pub use profile::{ProfileThresholds, PromptProfileMapper};
pub use prompt::{AssembledPrompt, PromptAssembler};
pub use schema::PayloadSchema;
