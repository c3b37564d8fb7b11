//! Error types for the gencache domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The top-level [`Error`]
//! follows the generation taxonomy (validation, processing, generation) and
//! pairs each failure with an [`ErrorContext`]; the bounded-context errors
//! below it belong to the collaborators.
//!
//! Every error here is `Clone`: a single failed in-flight generation is
//! delivered to every caller waiting on it.

use std::fmt;

use thiserror::Error;

use crate::generation::Fingerprint;
use crate::request::RequestType;

/// Observability metadata attached to every top-level error.
///
/// Never carries prompt content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub subject_id: String,
    pub request_type: Option<RequestType>,
    pub fingerprint: Option<Fingerprint>,
}

impl ErrorContext {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            request_type: None,
            fingerprint: None,
        }
    }

    pub fn with_request_type(mut self, request_type: RequestType) -> Self {
        self.request_type = Some(request_type);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject={}", self.subject_id)?;
        if let Some(rt) = self.request_type {
            write!(f, " type={rt}")?;
        }
        if let Some(fp) = &self.fingerprint {
            write!(f, " fingerprint={}", fp.short())?;
        }
        Ok(())
    }
}

/// The top-level error type for all gencache operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed or missing request fields. Never retried.
    #[error("Validation failed ({context}): {source}")]
    Validation {
        context: ErrorContext,
        source: ValidationError,
    },

    /// Conversation-state failure. Inside `generate` these are logged and the
    /// request continues without a continuation token; only direct
    /// conversation operations return them.
    #[error("Processing error ({context}): {source}")]
    Processing {
        context: ErrorContext,
        source: ProcessingError,
    },

    /// Upstream generator failure or an unusable payload.
    #[error("Generation failed ({context}): {source}")]
    Generation {
        context: ErrorContext,
        source: GenerationError,
    },
}

impl Error {
    pub fn validation(context: ErrorContext, source: ValidationError) -> Self {
        Self::Validation { context, source }
    }

    pub fn processing(context: ErrorContext, source: ProcessingError) -> Self {
        Self::Processing { context, source }
    }

    pub fn generation(context: ErrorContext, source: GenerationError) -> Self {
        Self::Generation { context, source }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Validation { context, .. }
            | Self::Processing { context, .. }
            | Self::Generation { context, .. } => context,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing { .. })
    }

    pub fn is_generation(&self) -> bool {
        matches!(self, Self::Generation { .. })
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Taxonomy errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("unknown request type: {0}")]
    UnknownRequestType(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    #[error("state store '{store}' failed during {operation}: {source}")]
    Store {
        store: String,
        operation: &'static str,
        source: StoreError,
    },

    #[error("conversation state not found: {0}")]
    StateNotFound(String),
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("generator error: {0}")]
    Upstream(#[from] GeneratorError),

    #[error("payload rejected: {0}")]
    InvalidPayload(String),

    #[error("prompt assembly failed: {0}")]
    Prompt(ValidationError),

    #[error("generation task failed: {0}")]
    TaskFailed(String),
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by generator, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Generator not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl GeneratorError {
    /// The upstream refused the request itself (a 4xx other than auth and
    /// rate limiting), e.g. because it references a response it no longer has.
    pub fn is_rejected_request(&self) -> bool {
        matches!(self, Self::ApiError { status_code, .. } if (400..500).contains(status_code))
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
