//! `gencache prompt`: show what would be sent to the generator.

use std::path::Path;

use gencache_config::AppConfig;
use gencache_engine::{FingerprintBuilder, PromptAssembler};

use super::CliResult;

pub fn run(config: &AppConfig, file: &Path) -> CliResult {
    let assembler = PromptAssembler::from_config(&config.prompts);

    for (i, request) in super::read_requests(file)?.iter().enumerate() {
        request.validate()?;
        let prompt = assembler.build(&request.params, &request.context)?;
        let fingerprint = FingerprintBuilder::for_request(request);

        if i > 0 {
            println!();
        }
        println!(
            "## {} for {} (scope {}, fingerprint {})",
            request.request_type(),
            request.subject_id.trim(),
            request.scope(),
            fingerprint.short()
        );
        if let Some(profile) = prompt.profile {
            println!("## profile: {profile}");
        }
        println!("\n--- system ---\n{}", prompt.system_prompt);
        println!("\n--- user ---\n{}", prompt.user_prompt);
    }
    Ok(())
}
