//! Attitude scores → personalization profile.
//!
//! Pure and infallible. Missing attitudes count as neutral (50). All
//! threshold comparisons are strict: a score sitting exactly on a threshold
//! does not cross it.

use gencache_config::ThresholdConfig;
use gencache_core::profile::{
    CommunicationStyle, DetailLevel, PersonalizationProfile, ResponseFormat,
};
use gencache_core::request::Attitudes;

/// Score assumed for an attitude the caller did not supply.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// First significant attitude in this list decides the communication style.
const STYLE_PRIORITY: [(&str, CommunicationStyle); 3] = [
    ("security_conscious", CommunicationStyle::Formal),
    ("experimental", CommunicationStyle::Technical),
    ("ethical_concern", CommunicationStyle::Formal),
];

/// First significant attitude in this list decides the response format.
const FORMAT_PRIORITY: [(&str, ResponseFormat); 2] = [
    ("skeptical", ResponseFormat::Structured),
    ("early_adopter", ResponseFormat::Conversational),
];

/// Threshold table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileThresholds {
    /// `tech_savvy + early_adopter` above this → comprehensive.
    pub high: f64,
    /// `tech_savvy + early_adopter` below this → basic.
    pub low: f64,
    /// A single attitude above this is significant.
    pub significant: f64,
}

impl Default for ProfileThresholds {
    fn default() -> Self {
        Self {
            high: 150.0,
            low: 60.0,
            significant: 70.0,
        }
    }
}

impl From<&ThresholdConfig> for ProfileThresholds {
    fn from(config: &ThresholdConfig) -> Self {
        Self {
            high: config.high,
            low: config.low,
            significant: config.significant,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptProfileMapper {
    thresholds: ProfileThresholds,
}

impl PromptProfileMapper {
    pub fn new(thresholds: ProfileThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ProfileThresholds {
        &self.thresholds
    }

    pub fn map_profile(&self, attitudes: &Attitudes) -> PersonalizationProfile {
        let t = &self.thresholds;

        let tech_sum = score_of(attitudes, "tech_savvy") + score_of(attitudes, "early_adopter");
        let detail_level = if tech_sum > t.high {
            DetailLevel::Comprehensive
        } else if tech_sum < t.low {
            DetailLevel::Basic
        } else {
            DetailLevel::Detailed
        };

        let communication_style = STYLE_PRIORITY
            .iter()
            .find(|(name, _)| score_of(attitudes, name) > t.significant)
            .map(|(_, style)| *style)
            .unwrap_or(CommunicationStyle::Casual);

        let response_format = FORMAT_PRIORITY
            .iter()
            .find(|(name, _)| score_of(attitudes, name) > t.significant)
            .map(|(_, format)| *format)
            .unwrap_or(ResponseFormat::Mixed);

        PersonalizationProfile {
            detail_level,
            communication_style,
            response_format,
        }
    }
}

/// Normalize an attitude name: trimmed, lower-case, `-` and spaces as `_`.
pub fn normalize_attitude(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

fn score_of(attitudes: &Attitudes, wanted: &str) -> f64 {
    attitudes
        .get(wanted)
        .or_else(|| {
            attitudes
                .iter()
                .find(|(name, _)| normalize_attitude(name) == wanted)
                .map(|(_, score)| score)
        })
        .copied()
        .filter(|s| s.is_finite())
        .unwrap_or(NEUTRAL_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attitudes(pairs: &[(&str, f64)]) -> Attitudes {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn mapper() -> PromptProfileMapper {
        PromptProfileMapper::default()
    }

    #[test]
    fn empty_attitudes_are_neutral() {
        let profile = mapper().map_profile(&Attitudes::new());
        // 50 + 50 = 100 sits between the thresholds.
        assert_eq!(profile, PersonalizationProfile::default());
        assert_eq!(profile.detail_level, DetailLevel::Detailed);
        assert_eq!(profile.communication_style, CommunicationStyle::Casual);
        assert_eq!(profile.response_format, ResponseFormat::Mixed);
    }

    #[test]
    fn tech_sum_on_high_threshold_is_detailed() {
        let p = mapper().map_profile(&attitudes(&[("tech_savvy", 75.0), ("early_adopter", 75.0)]));
        assert_eq!(p.detail_level, DetailLevel::Detailed);
    }

    #[test]
    fn tech_sum_above_high_is_comprehensive() {
        let p = mapper().map_profile(&attitudes(&[("tech_savvy", 76.0), ("early_adopter", 75.0)]));
        assert_eq!(p.detail_level, DetailLevel::Comprehensive);
    }

    #[test]
    fn low_early_adopter_keeps_detailed() {
        let p = mapper().map_profile(&attitudes(&[("tech_savvy", 80.0), ("early_adopter", 10.0)]));
        assert_eq!(p.detail_level, DetailLevel::Detailed);
    }

    #[test]
    fn tech_sum_on_low_threshold_is_detailed() {
        let p = mapper().map_profile(&attitudes(&[("tech_savvy", 30.0), ("early_adopter", 30.0)]));
        assert_eq!(p.detail_level, DetailLevel::Detailed);

        let p = mapper().map_profile(&attitudes(&[("tech_savvy", 30.0), ("early_adopter", 29.0)]));
        assert_eq!(p.detail_level, DetailLevel::Basic);
    }

    #[test]
    fn significance_is_strict() {
        let p = mapper().map_profile(&attitudes(&[("security_conscious", 70.0)]));
        assert_eq!(p.communication_style, CommunicationStyle::Casual);

        let p = mapper().map_profile(&attitudes(&[("security_conscious", 70.5)]));
        assert_eq!(p.communication_style, CommunicationStyle::Formal);
    }

    #[test]
    fn style_priority_order() {
        let p = mapper().map_profile(&attitudes(&[
            ("experimental", 95.0),
            ("security_conscious", 71.0),
        ]));
        assert_eq!(p.communication_style, CommunicationStyle::Formal);

        let p = mapper().map_profile(&attitudes(&[("experimental", 95.0), ("ethical_concern", 99.0)]));
        assert_eq!(p.communication_style, CommunicationStyle::Technical);

        let p = mapper().map_profile(&attitudes(&[("ethical_concern", 99.0)]));
        assert_eq!(p.communication_style, CommunicationStyle::Formal);
    }

    #[test]
    fn format_priority_order() {
        let p = mapper().map_profile(&attitudes(&[("skeptical", 80.0), ("early_adopter", 90.0)]));
        assert_eq!(p.response_format, ResponseFormat::Structured);

        let p = mapper().map_profile(&attitudes(&[("early_adopter", 90.0)]));
        assert_eq!(p.response_format, ResponseFormat::Conversational);
    }

    #[test]
    fn attitude_names_are_normalized() {
        let p = mapper().map_profile(&attitudes(&[
            ("Tech-Savvy", 90.0),
            (" early adopter ", 90.0),
        ]));
        assert_eq!(p.detail_level, DetailLevel::Comprehensive);
        assert_eq!(p.response_format, ResponseFormat::Conversational);
    }

    #[test]
    fn custom_thresholds_apply() {
        let mapper = PromptProfileMapper::new(ProfileThresholds {
            high: 100.0,
            low: 20.0,
            significant: 40.0,
        });
        let p = mapper.map_profile(&attitudes(&[("tech_savvy", 51.0), ("skeptical", 41.0)]));
        assert_eq!(p.detail_level, DetailLevel::Comprehensive);
        assert_eq!(p.response_format, ResponseFormat::Structured);
    }

    #[test]
    fn thresholds_from_config() {
        let config = ThresholdConfig::default();
        assert_eq!(ProfileThresholds::from(&config), ProfileThresholds::default());
    }
}
