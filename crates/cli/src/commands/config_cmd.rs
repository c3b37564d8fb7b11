//! `gencache config`: configuration management commands.

use std::path::Path;

use gencache_config::AppConfig;

use super::CliResult;

pub fn init(path: &Path, force: bool) -> CliResult {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

pub fn show(config: &AppConfig) -> CliResult {
    let mut shown = config.clone();
    if shown.generator.api_key.is_some() {
        shown.generator.api_key = Some("***".into());
    }
    println!("{}", toml::to_string_pretty(&shown)?);

    if !config.has_api_key() && config.generator.api_url.is_none() {
        println!("# warning: no API key (set GENCACHE_API_KEY or OPENAI_API_KEY)");
    }
    Ok(())
}

pub fn path(path: &Path) {
    println!("{}", path.display());
}
