//! Configuration loading and validation for the assistants runtime.
//!
//! Loads configuration from `~/.assistants/config.toml` (or an explicit
//! path) with environment variable overrides. Validates all settings at
//! startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use assistants_core::resource::{API_VERSION, ASSISTANTS_GROUP, TOOLS_GROUP};

/// The root configuration structure.
///
/// Maps directly to `~/.assistants/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cluster whose resources this process reconciles
    #[serde(default = "default_cluster")]
    pub cluster: String,

    /// Manifests loaded into the in-process bus at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_dir: Option<PathBuf>,

    /// API groups and version of the resource kinds
    #[serde(default)]
    pub groups: GroupsConfig,

    /// LLM provider used by code agents and chat-completion tools
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Message conventions and stream settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_cluster() -> String {
    "default".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupsConfig {
    #[serde(default = "default_assistants_group")]
    pub assistants: String,

    #[serde(default = "default_tools_group")]
    pub tools: String,

    #[serde(default = "default_version")]
    pub version: String,
}

fn default_assistants_group() -> String {
    ASSISTANTS_GROUP.into()
}
fn default_tools_group() -> String {
    TOOLS_GROUP.into()
}
fn default_version() -> String {
    API_VERSION.into()
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            assistants: default_assistants_group(),
            tools: default_tools_group(),
            version: default_version(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, also used in logs
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL of an OpenAI-compatible API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Code model for assistants whose `codeModel` is blank
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

fn default_provider_name() -> String {
    "openai".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: None,
            api_key: None,
            default_model: None,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Prefix marking messages an assistant published itself
    #[serde(default = "default_echo_prefix")]
    pub echo_prefix: String,

    /// Prefix that continues the running conversation
    #[serde(default = "default_chat_prefix")]
    pub chat_prefix: String,

    /// Fence language of example code blocks
    #[serde(default = "default_code_language")]
    pub code_language: String,

    /// Queue length of each stream subscriber
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_echo_prefix() -> String {
    ">".into()
}
fn default_chat_prefix() -> String {
    "+".into()
}
fn default_code_language() -> String {
    "python".into()
}
fn default_stream_buffer() -> usize {
    64
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            echo_prefix: default_echo_prefix(),
            chat_prefix: default_chat_prefix(),
            code_language: default_code_language(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.assistants/config.toml),
    /// then apply environment overrides:
    /// - `ASSISTANTS_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `ASSISTANTS_CLUSTER`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path` and apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // Relative resource directories are relative to the config file.
        if let (Some(dir), Some(parent)) = (&config.resources_dir, path.parent()) {
            if dir.is_relative() {
                config.resources_dir = Some(parent.join(dir));
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("ASSISTANTS_API_KEY") {
            self.provider.api_key = Some(key);
        } else if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("OPENAI_API_KEY");
        }

        if let Some(cluster) = lookup("ASSISTANTS_CLUSTER") {
            self.cluster = cluster;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".assistants")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.trim().is_empty() {
            return Err(ConfigError::ValidationError("cluster must not be empty".into()));
        }

        let runtime = &self.runtime;
        if runtime.echo_prefix.is_empty() || runtime.chat_prefix.is_empty() {
            return Err(ConfigError::ValidationError(
                "echo_prefix and chat_prefix must not be empty".into(),
            ));
        }

        if runtime.echo_prefix == runtime.chat_prefix {
            return Err(ConfigError::ValidationError(
                "echo_prefix and chat_prefix must differ".into(),
            ));
        }

        if runtime.stream_buffer == 0 {
            return Err(ConfigError::ValidationError("stream_buffer must be > 0".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cluster: default_cluster(),
            resources_dir: None,
            groups: GroupsConfig::default(),
            provider: ProviderConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.cluster, "default");
        assert_eq!(config.groups.assistants, "assistants.thatone.ai");
        assert_eq!(config.runtime.echo_prefix, ">");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
cluster = "lab"
resources_dir = "manifests"

[provider]
default_model = "gpt-4o-mini"

[runtime]
chat_prefix = "!"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.cluster, "lab");
        assert_eq!(config.runtime.chat_prefix, "!");
        assert_eq!(config.runtime.echo_prefix, ">");
        assert_eq!(config.resources_dir, Some(dir.path().join("manifests")));
        assert_eq!(config.provider.name, "openai");
        assert_eq!(config.provider.default_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "cluster = [").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn equal_prefixes_rejected() {
        let config = AppConfig {
            runtime: RuntimeConfig {
                chat_prefix: ">".into(),
                ..RuntimeConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_prefix_and_zero_buffer_rejected() {
        let mut config = AppConfig::default();
        config.runtime.echo_prefix.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.runtime.stream_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_prefer_assistants_key() {
        let vars: HashMap<&str, &str> = [
            ("ASSISTANTS_API_KEY", "sk-assistants"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("ASSISTANTS_CLUSTER", "prod"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-assistants"));
        assert_eq!(config.cluster, "prod");
    }

    #[test]
    fn openai_key_does_not_replace_configured_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("from-file".into());
        config.apply_overrides(|name| (name == "OPENAI_API_KEY").then(|| "sk-openai".to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("[REDACTED]"));
    }
}
