//! Generator selection from configuration.

use std::sync::Arc;
use std::time::Duration;

use gencache_config::AppConfig;
use gencache_core::error::GeneratorError;
use gencache_core::generator::Generator;
use tracing::info;

use crate::responses::ResponsesGenerator;

/// Build the configured generator.
///
/// Hosted providers need an API key; self-hosted endpoints (any provider
/// name with an explicit `api_url`) may run without one.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Generator>, GeneratorError> {
    let gen_config = &config.generator;
    let provider = gen_config.provider.as_str();

    let base_url = match (&gen_config.api_url, default_base_url(provider)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            return Err(GeneratorError::NotConfigured(format!(
                "Provider '{provider}' has no known endpoint; set generator.api_url"
            )));
        }
    };

    let api_key = match (&gen_config.api_key, &gen_config.api_url) {
        (Some(key), _) => key.clone(),
        (None, Some(_)) => String::new(),
        (None, None) => {
            return Err(GeneratorError::NotConfigured(format!(
                "No API key for provider '{provider}' (set GENCACHE_API_KEY or OPENAI_API_KEY)"
            )));
        }
    };

    let generator = ResponsesGenerator::new(
        provider,
        &base_url,
        api_key,
        Duration::from_secs(gen_config.timeout_secs),
    )?
    .with_model(&gen_config.model)
    .with_temperature(gen_config.default_temperature)
    .with_max_output_tokens(gen_config.max_output_tokens);

    info!(provider, model = %gen_config.model, "Generator configured");
    Ok(Arc::new(generator))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        _ => None,
    }
}
