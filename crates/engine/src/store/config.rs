//! Store configuration via `relkv.toml`
//!
//! Every setting has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use relkv_core::{Error, Keyspace, Result, DEFAULT_COUNTER_FIELD, DEFAULT_QUEUE_PREFIX};

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "relkv.toml";

/// Store configuration
///
/// # Example
///
/// ```toml
/// # Prefix for every collection, index and queue key and lock name
/// namespace = "app"
/// # Reserved id-counter field inside each collection hash
/// counter_field = "_index"
/// # Prefix for queue keys
/// queue_prefix = "queue"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Optional key and lock prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Reserved counter field name
    #[serde(default = "default_counter_field")]
    pub counter_field: String,
    /// Queue key prefix
    #[serde(default = "default_queue_prefix")]
    pub queue_prefix: String,
}

fn default_counter_field() -> String {
    DEFAULT_COUNTER_FIELD.to_string()
}

fn default_queue_prefix() -> String {
    DEFAULT_QUEUE_PREFIX.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            counter_field: default_counter_field(),
            queue_prefix: default_queue_prefix(),
        }
    }
}

fn check_name(setting: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidConfig(format!("{} must not be empty", setting)));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(Error::InvalidConfig(format!(
            "{} '{}' must not contain whitespace",
            setting, value
        )));
    }
    Ok(())
}

impl StoreConfig {
    /// Config with a namespace and every other setting defaulted
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    /// Check every setting
    pub fn validate(&self) -> Result<()> {
        if let Some(ns) = &self.namespace {
            check_name("namespace", ns)?;
        }
        check_name("counter_field", &self.counter_field)?;
        check_name("queue_prefix", &self.queue_prefix)?;
        Ok(())
    }

    /// Key naming derived from this config
    pub fn keyspace(&self) -> Keyspace {
        Keyspace::new(
            self.namespace.clone(),
            self.counter_field.clone(),
            self.queue_prefix.clone(),
        )
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# relkv store configuration
#
# Prefix joined with ':' in front of every collection, index and queue key
# and every lock name. Leave unset to use bare names.
# namespace = "app"

# Reserved field holding the id counter inside each collection hash.
counter_field = "_index"

# Prefix for queue keys ("queue:<name>").
queue_prefix = "queue"
"#
    }

    /// Parse and validate config text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }
}
