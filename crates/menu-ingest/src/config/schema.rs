use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ai::MAX_MENU_ITEMS;

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            database: DatabaseConfig::default(),
            worker: WorkerConfig::default(),
            extractor: ExtractorConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

/// `~/.menu-ingest/data/menu-ingest.db`, or a relative path when no home
/// directory can be resolved.
fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".menu-ingest"))
        .unwrap_or_else(|| PathBuf::from(".menu-ingest"))
        .join("data")
        .join("menu-ingest.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Stamped on every upload the worker finalizes.
    #[serde(default = "default_parser_version")]
    pub parser_version: String,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_failure_reason_limit")]
    pub failure_reason_limit: usize,
}

fn default_parser_version() -> String {
    concat!("menu-ingest/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_locale() -> String {
    "en-GB".to_string()
}

fn default_max_items() -> usize {
    MAX_MENU_ITEMS
}

fn default_failure_reason_limit() -> usize {
    500
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            parser_version: default_parser_version(),
            default_locale: default_locale(),
            max_items: default_max_items(),
            failure_reason_limit: default_failure_reason_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_ai_timeout_secs() -> u64 {
    120
}

fn default_max_input_chars() -> usize {
    60_000
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_ai_timeout_secs(),
            max_input_chars: default_max_input_chars(),
            temperature: default_temperature(),
        }
    }
}
