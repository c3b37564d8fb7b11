//! Cache identity and generation results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generator::Usage;
use crate::request::RequestType;

/// A fixed-length hex digest identifying a logically unique request.
///
/// Built by the engine's fingerprint builder; this type only carries it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Length of the hex representation (SHA-256).
    pub const HEX_LEN: usize = 64;

    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for logs and error messages.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The outcome of one generation, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Structured, schema-validated payload.
    pub payload: serde_json::Value,

    /// Continuation token returned by the generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,

    /// Whether this result was served from the cache.
    pub from_cache: bool,

    /// The conversation record used, absent in degraded mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_state_id: Option<String>,

    pub fingerprint: Fingerprint,

    pub request_type: RequestType,

    pub generated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl GenerationResult {
    /// A copy of this result marked as a cache hit.
    pub fn as_cached(&self) -> Self {
        Self {
            from_cache: true,
            ..self.clone()
        }
    }
}

/// A stored result. Replaced whole, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub result: GenerationResult,
    pub created_at: DateTime<Utc>,
    pub subject_id: String,
}
