// ABOUTME: Host configuration parsed from TOML with environment variable overrides
// ABOUTME: Describes the listen address, primary credentials, log format and bots to mount
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use teambots_core::config::{APP_ID_KEY, APP_PASSWORD_KEY};
use teambots_core::{EnvSettings, Settings};

use crate::registry::{BotOptions, BotRef};

pub const CONFIG_PATH_ENV: &str = "TEAMBOTS_CONFIG_PATH";
pub const TENANT_ID_KEY: &str = "MS_TENANT_ID";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub bots: Vec<BotEntryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_password: String,
    #[serde(default)]
    pub tenant_id: String,
}

// Custom Debug impl to redact the password
impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("app_id", &self.app_id)
            .field(
                "app_password",
                &if self.app_password.is_empty() { "" } else { "[REDACTED]" },
            )
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// One `[[bots]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotEntryConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention_text: Option<String>,
}

impl BotEntryConfig {
    pub fn to_bot_ref(&self) -> BotRef {
        BotRef::named_with(
            self.name.clone(),
            BotOptions {
                kind: self.kind.clone(),
                route: self.route.clone(),
                credentials: None,
                welcome_message: self.welcome_message.clone(),
                mention_text: self.mention_text.clone(),
            },
        )
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3978
}

fn default_bot_name() -> String {
    "echo".to_string()
}

impl Config {
    /// Config file location: `TEAMBOTS_CONFIG_PATH` if it exists, else ./config.toml
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(path = %env_path, "Configured config path does not exist");
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        None
    }

    /// Load configuration from the config file (if any) with environment variable overrides
    pub fn load() -> Result<Self> {
        let config = match Self::find_config_file() {
            Some(path) => Self::read_file(&path)?,
            None => {
                tracing::info!("No config file found, using environment variables and defaults");
                Config::default()
            }
        };
        config.with_env_overrides()
    }

    /// Load from an explicit path with environment variable overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::read_file(path)?.with_env_overrides()
    }

    fn read_file(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str::<Config>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(val) = std::env::var(APP_ID_KEY) {
            self.credentials.app_id = val;
        }
        if let Ok(val) = std::env::var(APP_PASSWORD_KEY) {
            self.credentials.app_password = val;
        }
        if let Ok(val) = std::env::var(TENANT_ID_KEY) {
            self.credentials.tenant_id = val;
        }
        if let Ok(val) = std::env::var("TEAMBOTS_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("TEAMBOTS_PORT") {
            self.server.port = val.parse().with_context(|| {
                format!("TEAMBOTS_PORT must be a valid port number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("LOG_FORMAT") {
            self.logging.format = match val.trim().to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" | "" => LogFormat::Pretty,
                other => anyhow::bail!("LOG_FORMAT must be 'json' or 'pretty', got: {}", other),
            };
        }

        if self.server.host.trim().is_empty() {
            anyhow::bail!("server.host is required (set in config.toml or TEAMBOTS_HOST env var)");
        }

        Ok(self)
    }

    /// Bots to mount; a lone `echo` bot when none are configured
    pub fn bot_refs(&self) -> Vec<BotRef> {
        if self.bots.is_empty() {
            return vec![BotRef::named(default_bot_name())];
        }
        self.bots.iter().map(BotEntryConfig::to_bot_ref).collect()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Settings lookup: primary credentials from this config, everything else from the environment
    pub fn settings(&self) -> ConfigSettings {
        let mut values = HashMap::new();
        values.insert(APP_ID_KEY.to_string(), self.credentials.app_id.clone());
        values.insert(
            APP_PASSWORD_KEY.to_string(),
            self.credentials.app_password.clone(),
        );
        values.insert(TENANT_ID_KEY.to_string(), self.credentials.tenant_id.clone());
        ConfigSettings { values }
    }
}

/// Settings that prefer values from the loaded config over the process environment
#[derive(Clone, Default)]
pub struct ConfigSettings {
    values: HashMap<String, String>,
}

impl Settings for ConfigSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .or_else(|| EnvSettings.get(key))
    }
}
