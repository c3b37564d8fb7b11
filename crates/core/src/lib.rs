//! # gencache Core
//!
//! Domain types, collaborator traits, and error definitions for the gencache
//! generation cache. This crate has **no framework dependencies**: it defines
//! the domain model that the store, provider, and engine crates implement
//! against.
//!
//! ## Design Philosophy
//!
//! Both external collaborators are traits defined here:
//! - [`Generator`] sends a prompt to an LLM and returns a structured payload
//!   plus an opaque continuation token.
//! - [`StateStore`] durably keeps one [`ConversationState`] per
//!   `(subject, scope)` pair.
//!
//! Implementations live in their own crates, so the engine can be tested with
//! scripted generators and in-memory stores.

pub mod conversation;
pub mod error;
pub mod generation;
pub mod generator;
pub mod profile;
pub mod request;

// Re-export key types at crate root for ergonomics
pub use conversation::{ConversationState, StateStore};
pub use error::{
    Error, ErrorContext, GenerationError, GeneratorError, ProcessingError, Result, StoreError,
    ValidationError,
};
pub use generation::{CacheEntry, Fingerprint, GenerationResult};
pub use generator::{Generator, GeneratorRequest, GeneratorResponse, Usage};
pub use profile::{CommunicationStyle, DetailLevel, PersonalizationProfile, ResponseFormat};
pub use request::{
    Attitudes, ChallengeParams, ChallengeVariationParams, DomainParams, EvaluationParams,
    FocusAreaParams, GenerationRequest, HistoryItem, PersonalityParams, PromptContext,
    RequestType, SamplingOptions, UserProfile,
};
