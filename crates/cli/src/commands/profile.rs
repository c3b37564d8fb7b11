//! `gencache profile`: map attitude scores to a personalization profile.

use gencache_config::AppConfig;
use gencache_core::request::Attitudes;
use gencache_engine::{ProfileThresholds, PromptProfileMapper};

use super::CliResult;

pub fn run(config: &AppConfig, raw: &[String]) -> CliResult {
    let attitudes = parse_attitudes(raw)?;
    let thresholds = ProfileThresholds::from(&config.prompts.thresholds);
    let profile = PromptProfileMapper::new(thresholds).map_profile(&attitudes);

    println!("Detail level:        {}", profile.detail_level.as_str());
    println!("Communication style: {}", profile.communication_style.as_str());
    println!("Response format:     {}", profile.response_format.as_str());
    println!(
        "Thresholds:          high={} low={} significant={}",
        thresholds.high, thresholds.low, thresholds.significant
    );
    Ok(())
}

/// Parse `name=score` pairs. Scores must be numbers in 0..=100.
fn parse_attitudes(raw: &[String]) -> Result<Attitudes, String> {
    raw.iter()
        .map(|pair| {
            let (name, score) = pair
                .split_once('=')
                .ok_or_else(|| format!("'{pair}' is not name=score"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("'{pair}' has an empty attitude name"));
            }
            let score: f64 = score
                .trim()
                .parse()
                .map_err(|_| format!("'{pair}' has a non-numeric score"))?;
            if !(0.0..=100.0).contains(&score) {
                return Err(format!("'{pair}' score must be between 0 and 100"));
            }
            Ok((name.to_string(), score))
        })
        .collect()
}
