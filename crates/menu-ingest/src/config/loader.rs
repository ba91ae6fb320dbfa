//! Reading and validating `IngestConfig` files.
//!
//! A document is checked twice: structurally against the embedded JSON
//! schema, then semantically once it has been deserialized.

use std::path::Path;
use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;

use crate::ai::MAX_MENU_ITEMS;
use crate::config::schema::{IngestConfig, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<IngestConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let config = load_config_from_str(&raw)?;
    tracing::info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Loads `path` when it exists; a missing file yields the defaults.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<IngestConfig, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        Ok(IngestConfig::default())
    }
}

pub fn load_config_from_str(raw: &str) -> Result<IngestConfig, ConfigError> {
    let document: Value = serde_json::from_str(raw)?;

    let violations: Vec<String> = schema()?
        .iter_errors(&document)
        .map(|e| e.to_string())
        .collect();
    if !violations.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: violations.join("; "),
        });
    }

    let config: IngestConfig = serde_json::from_value(document)?;
    check_values(&config)?;
    Ok(config)
}

/// The compiled schema, built on first use.
fn schema() -> Result<&'static Validator, ConfigError> {
    static SCHEMA: OnceLock<Result<Validator, String>> = OnceLock::new();

    SCHEMA
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(SCHEMA_JSON)
                .map_err(|e| format!("Invalid embedded schema JSON: {}", e))?;
            jsonschema::validator_for(&schema)
                .map_err(|e| format!("Failed to compile JSON schema: {}", e))
        })
        .as_ref()
        .map_err(|message| ConfigError::Validation {
            message: message.clone(),
        })
}

/// Rules the schema cannot express, or that must hold for values filled
/// in by serde defaults.
fn check_values(config: &IngestConfig) -> Result<(), ConfigError> {
    let reject = |message: String| Err(ConfigError::Validation { message });

    if config.version != CONFIG_VERSION {
        return reject(format!("Unsupported config version: {}", config.version));
    }
    if !(1..=MAX_MENU_ITEMS).contains(&config.worker.max_items) {
        return reject(format!(
            "worker.max_items must be between 1 and {}, got {}",
            MAX_MENU_ITEMS, config.worker.max_items
        ));
    }
    if config.worker.failure_reason_limit == 0 {
        return reject("worker.failure_reason_limit must be positive".to_string());
    }
    if let Err(e) = reqwest::Url::parse(&config.ai.base_url) {
        return reject(format!(
            "ai.base_url '{}' is not a URL: {}",
            config.ai.base_url, e
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = load_config_from_str(
            r#"{
                "database": { "path": "/var/lib/menu-ingest/menu.db" },
                "worker": { "parser_version": "menu-parser@2" },
                "ai": { "timeout_secs": 300 }
            }"#,
        )
        .unwrap();

        let defaults = IngestConfig::default();
        assert_eq!(
            config.database.path,
            std::path::PathBuf::from("/var/lib/menu-ingest/menu.db")
        );
        assert_eq!(config.worker.parser_version, "menu-parser@2");
        assert_eq!(config.worker.default_locale, defaults.worker.default_locale);
        assert_eq!(config.worker.failure_reason_limit, 500);
        assert_eq!(config.ai.timeout_secs, 300);
        assert_eq!(config.ai.model, defaults.ai.model);
        assert_eq!(config.extractor.fetch_timeout_secs, 60);
    }

    #[test]
    fn test_version_mismatch_is_a_value_error() {
        let err = load_config_from_str(r#"{"version": "2.0"}"#).unwrap_err();
        assert!(
            matches!(&err, ConfigError::Validation { message } if message.contains("2.0")),
            "got {:?}",
            err
        );
    }

    #[test]
    fn test_schema_violations_name_the_offending_value() {
        let err = load_config_from_str(r#"{"worker": {"max_items": 151}}"#).unwrap_err();
        match err {
            ConfigError::SchemaValidation { errors } => {
                assert!(errors.contains("151"), "got: {}", errors)
            }
            other => panic!("Expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_secrets_are_not_accepted_inline() {
        let result = load_config_from_str(r#"{"ai": {"api_key": "sk-live"}}"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_existing_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"extractor": {"fetch_timeout_secs": 5}}"#).unwrap();

        let config = load_config_or_default(&path).unwrap();
        assert_eq!(config.extractor.fetch_timeout_secs, 5);
    }
}
