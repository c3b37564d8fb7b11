//! `gencache generate`: run requests through one orchestrator.
//!
//! Requests in the same file share the cache, so repeated requests are
//! served without another generator call.

use std::path::Path;

use gencache_config::AppConfig;
use gencache_core::generation::GenerationResult;
use gencache_engine::GenerationOrchestrator;
use serde_json::json;
use tracing::info;

use super::CliResult;

pub async fn run(config: &AppConfig, file: &Path, force: bool) -> CliResult {
    let requests = super::read_requests(file)?;
    let generator = gencache_providers::build_from_config(config)?;
    let store = super::open_store(&config.store).await?;
    let orchestrator = GenerationOrchestrator::from_config(config, generator, store);

    let mut failures = 0usize;
    let mut outputs = Vec::with_capacity(requests.len());
    for request in requests {
        let request = if force {
            request.with_force_refresh(true)
        } else {
            request
        };
        match orchestrator.generate(request).await {
            Ok(result) => outputs.push(summarize(&result)),
            Err(e) => {
                failures += 1;
                outputs.push(json!({ "error": e.to_string() }));
            }
        }
    }

    let rendered = if outputs.len() == 1 {
        serde_json::to_string_pretty(&outputs[0])?
    } else {
        serde_json::to_string_pretty(&outputs)?
    };
    println!("{rendered}");

    let stats = orchestrator.cache_stats();
    info!(
        hits = stats.hits,
        coalesced = stats.coalesced,
        stores = stats.stores,
        failures,
        "Run complete"
    );

    if failures > 0 {
        return Err(format!("{failures} request(s) failed").into());
    }
    Ok(())
}

fn summarize(result: &GenerationResult) -> serde_json::Value {
    json!({
        "request_type": result.request_type,
        "fingerprint": result.fingerprint,
        "from_cache": result.from_cache,
        "conversation_state_id": result.conversation_state_id,
        "continuation_token": result.continuation_token,
        "usage": result.usage,
        "payload": result.payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gencache_core::generation::Fingerprint;
    use gencache_core::request::RequestType;

    #[test]
    fn summary_keeps_payload_and_cache_flag() {
        let result = GenerationResult {
            payload: json!({ "insights": ["curious"] }),
            continuation_token: Some("resp_1".into()),
            from_cache: true,
            conversation_state_id: None,
            fingerprint: Fingerprint::from_hex("ab".repeat(32)),
            request_type: RequestType::Personality,
            generated_at: Utc::now(),
            usage: None,
        };
        let summary = summarize(&result);
        assert_eq!(summary["from_cache"], true);
        assert_eq!(summary["request_type"], "personality");
        assert_eq!(summary["payload"]["insights"][0], "curious");
        assert!(summary["conversation_state_id"].is_null());
    }
}
