pub mod retry;

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use std::path::Path;
use tracing::info;

use crate::models::common::Config;

pub const CONFIG_PATH_ENV: &str = "INDEXER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Config file path: `$INDEXER_CONFIG` if set, else `config.yml` in the working directory.
pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string())
}

/// Load the YAML config and apply `INDEXER__<FIELD>` environment overrides
/// (e.g. `INDEXER__RPC_URL`, `INDEXER__METRICS__ENABLED`).
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    info!("Config path: {}", path.display());

    let settings = config::Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .add_source(
            Environment::with_prefix("INDEXER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to read config file")?;

    let config = parse_config(settings)?;
    Ok(config)
}

/// Parse a YAML document directly. Used by tests and tooling.
pub fn load_config_str(yaml: &str) -> Result<Config> {
    let settings = config::Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()
        .context("failed to read config")?;
    parse_config(settings)
}

fn parse_config(settings: config::Config) -> Result<Config> {
    let config: Config = settings
        .try_deserialize()
        .context("failed to parse config YAML")?;

    config.validate().context("invalid config")?;
    Ok(config)
}

/// Gateways in front of RPC nodes sometimes answer with an HTML error page;
/// keep only its first line of text.
pub fn strip_html(error: &str) -> String {
    if error.contains("<!doctype html>") || error.contains("<html>") {
        error
            .lines()
            .map(|line| line.trim())
            .find(|line| !line.is_empty() && !line.starts_with('<') && !line.ends_with('>'))
            .unwrap_or(error)
            .to_string()
    } else {
        error.to_string()
    }
}
