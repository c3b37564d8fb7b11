pub mod config_cmd;
pub mod generate;
pub mod profile;
pub mod prompt;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gencache_config::{AppConfig, ConfigError, StoreConfig};
use gencache_core::conversation::StateStore;
use gencache_core::error::StoreError;
use gencache_core::request::GenerationRequest;
use gencache_store::{InMemoryStateStore, NoopStateStore};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// The config file to use: explicit path, else `~/.gencache/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    AppConfig::load_with_env(path)
}

/// Open the configured conversation state store.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn StateStore>, StoreError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStateStore::new())),
        "none" => Ok(Arc::new(NoopStateStore)),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = config.sqlite_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
            let url = format!("sqlite://{}", path.display());
            Ok(Arc::new(gencache_store::SqliteStateStore::new(&url).await?))
        }
        other => Err(StoreError::Unavailable(format!(
            "State store backend '{other}' is not available in this build"
        ))),
    }
}

/// Read a request file holding either one request or an array of them.
pub fn read_requests(path: &Path) -> CliResult<Vec<GenerationRequest>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("{} is not valid JSON: {e}", path.display()))?;

    let requests = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value(item).map_err(|e| format!("request #{}: {e}", i + 1))
            })
            .collect::<Result<Vec<GenerationRequest>, _>>()?,
        single => vec![
            serde_json::from_value(single).map_err(|e| format!("request: {e}"))?,
        ],
    };

    if requests.is_empty() {
        return Err(format!("{} contains no requests", path.display()).into());
    }
    Ok(requests)
}
