use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub analyst: AnalystConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    pub models: ModelsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalystConfig {
    /// Base URL of the hosted analyst API, e.g. `https://analyst.example.com`.
    pub base_url: String,
    #[serde(default = "default_api_path")]
    pub api_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_path() -> String {
    "/api/v2/analyst/message".to_string()
}

// Matches the hosted API's documented request ceiling. There is no retry on
// timeout; the turn fails and is rendered as an error.
fn default_timeout_secs() -> u64 {
    50
}

impl AnalystConfig {
    /// Full endpoint URL for the message API.
    pub fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_path
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseConfig {
    /// Engine backing SQL execution: `sqlite`, `http`, or `disabled`.
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Database file path (sqlite engine).
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// SQL gateway URL (http engine).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_engine() -> String {
    "disabled".to_string()
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            path: None,
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    /// Semantic model references, each of the form
    /// `<database>.<schema>.<stage>/<file>.yaml`.
    pub available: Vec<String>,
    /// Model selected at startup; defaults to the first entry.
    #[serde(default)]
    pub default: Option<String>,
}

impl ModelsConfig {
    pub fn default_model(&self) -> &str {
        self.default
            .as_deref()
            .unwrap_or_else(|| self.available[0].as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Returns true if `reference` has the expected
/// `<database>.<schema>.<stage>/<file>.yaml` shape.
pub fn is_valid_model_ref(reference: &str) -> bool {
    let Some((stage_path, file)) = reference.split_once('/') else {
        return false;
    };
    let parts: Vec<&str> = stage_path.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|p| !p.is_empty())
        && file.ends_with(".yaml")
        && file.len() > ".yaml".len()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.models.available.is_empty() {
        bail!("[models] available must list at least one semantic model");
    }
    for reference in &config.models.available {
        if !is_valid_model_ref(reference) {
            bail!(
                "Invalid semantic model reference: {} (expected <database>.<schema>.<stage>/<file>.yaml)",
                reference
            );
        }
    }
    if let Some(default) = &config.models.default {
        if !config.models.available.contains(default) {
            bail!("[models] default is not in the available list: {}", default);
        }
    }
    match config.warehouse.engine.as_str() {
        "sqlite" => {
            if config.warehouse.path.is_none() {
                bail!("[warehouse] path is required for the sqlite engine");
            }
        }
        "http" => {
            if config.warehouse.url.is_none() {
                bail!("[warehouse] url is required for the http engine");
            }
        }
        "disabled" => {}
        other => bail!(
            "Unknown warehouse engine: {}. Use sqlite, http, or disabled.",
            other
        ),
    }
    Ok(())
}
