//! Personalization profile: how a prompt should be pitched to a user.
//!
//! Always derived from attitude scores at prompt-build time and never stored.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Basic,
    Detailed,
    Comprehensive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Casual,
    Formal,
    Technical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Structured,
    Conversational,
    Mixed,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Detailed => "detailed",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl CommunicationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Formal => "formal",
            Self::Technical => "technical",
        }
    }
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Conversational => "conversational",
            Self::Mixed => "mixed",
        }
    }
}

/// The derived personalization profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonalizationProfile {
    pub detail_level: DetailLevel,
    pub communication_style: CommunicationStyle,
    pub response_format: ResponseFormat,
}

impl Default for PersonalizationProfile {
    /// The profile of a user whose attitudes are all neutral.
    fn default() -> Self {
        Self {
            detail_level: DetailLevel::Detailed,
            communication_style: CommunicationStyle::Casual,
            response_format: ResponseFormat::Mixed,
        }
    }
}

impl fmt::Display for PersonalizationProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "detail={} style={} format={}",
            self.detail_level.as_str(),
            self.communication_style.as_str(),
            self.response_format.as_str()
        )
    }
}
