//! Configuration: optional TOML file overlaid with environment variables
//!
//! Secrets normally come from the environment (`APIAI_ACCESS_TOKEN`,
//! `SLACK_VERIFY_TOKEN`, ...); everything else has a default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::catalog::DEFAULT_PROJECTS;
use crate::dispatcher::IFTTT_BASE_URL;
use crate::error::ConfigError;
use crate::interpreter::DEFAULT_LANG;
use crate::nlu::DEFAULT_BASE_URL as NLU_BASE_URL;

pub const SLACK_API_BASE: &str = "https://slack.com/api";
const REDACTED: &str = "********";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BunnyConfig {
    pub server: ServerConfig,
    pub slack: SlackConfig,
    pub nlu: NluConfig,
    pub ifttt: IftttConfig,
    pub store: StoreConfig,
    pub confirmation: ConfirmationConfig,
    pub projects: ProjectsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Timeout for every outbound HTTP call
    pub http_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            http_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub verify_token: String,
    pub bot_token: String,
    /// The bot's own user id, stripped from utterances
    pub bot_user_id: Option<String>,
    pub api_base: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            bot_token: String::new(),
            bot_user_id: None,
            api_base: SLACK_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NluConfig {
    pub access_token: String,
    pub base_url: String,
    pub lang: String,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: NLU_BASE_URL.to_string(),
            lang: DEFAULT_LANG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IftttConfig {
    pub maker_key: String,
    pub base_url: String,
}

impl Default for IftttConfig {
    fn default() -> Self {
        Self {
            maker_key: String::new(),
            base_url: IFTTT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Firebase,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub secret: Option<String>,
    /// Defaults to `~/.bunny/bunny.db`
    pub sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    pub window_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            sweep_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectsConfig {
    pub allowed: Vec<String>,
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self {
            allowed: DEFAULT_PROJECTS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// `~/.bunny`
pub fn bunny_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bunny")
}

pub fn default_config_path() -> PathBuf {
    bunny_dir().join("config.toml")
}

impl BunnyConfig {
    /// Load from `path` (missing file means defaults), then apply the process environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            info!("Loaded config from {:?}", path);
            Self::from_toml(&raw)?
        } else {
            debug!("No config file at {:?}, using defaults", path);
            Self::default()
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Overlay settings from an environment lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(port) = get("PORT") {
            self.server.port = port.parse().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("must be a valid port number: {}", e),
            })?;
        }
        if let Some(v) = get("SLACK_VERIFY_TOKEN") {
            self.slack.verify_token = v;
        }
        if let Some(v) = get("SLACK_BOT_TOKEN") {
            self.slack.bot_token = v;
        }
        if let Some(v) = get("SLACK_BOT_USER_ID") {
            self.slack.bot_user_id = Some(v);
        }
        if let Some(v) = get("APIAI_ACCESS_TOKEN") {
            self.nlu.access_token = v;
        }
        if let Some(v) = get("IFTTT_MAKER_TOKEN") {
            self.ifttt.maker_key = v;
        }
        if let Some(v) = get("FIREBASE_DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Some(v) = get("FIREBASE_SECRET") {
            self.store.secret = Some(v);
        }
        Ok(())
    }

    /// Check every secret the running bot needs is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slack.verify_token.is_empty() {
            return Err(ConfigError::Missing("SLACK_VERIFY_TOKEN"));
        }
        if self.slack.bot_token.is_empty() {
            return Err(ConfigError::Missing("SLACK_BOT_TOKEN"));
        }
        if self.nlu.access_token.is_empty() {
            return Err(ConfigError::Missing("APIAI_ACCESS_TOKEN"));
        }
        if self.ifttt.maker_key.is_empty() {
            return Err(ConfigError::Missing("IFTTT_MAKER_TOKEN"));
        }
        if self.projects.allowed.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "projects.allowed".to_string(),
                message: "at least one project is required".to_string(),
            });
        }
        if self.confirmation.window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "confirmation.window_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        check_url("slack.api_base", &self.slack.api_base)?;
        check_url("nlu.base_url", &self.nlu.base_url)?;
        check_url("ifttt.base_url", &self.ifttt.base_url)?;

        if self.store.backend == StoreBackend::Firebase {
            let url = self
                .store
                .database_url
                .as_deref()
                .ok_or(ConfigError::Missing("FIREBASE_DATABASE_URL"))?;
            check_url("store.database_url", url)?;
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.server.http_timeout_secs)
    }

    pub fn confirmation_window(&self) -> Duration {
        Duration::from_secs(self.confirmation.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.confirmation.sweep_interval_secs.max(1))
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.store
            .sqlite_path
            .clone()
            .unwrap_or_else(|| bunny_dir().join("bunny.db"))
    }

    /// TOML rendering with secrets masked
    pub fn redacted(&self) -> String {
        let mut copy = self.clone();
        for secret in [
            &mut copy.slack.verify_token,
            &mut copy.slack.bot_token,
            &mut copy.nlu.access_token,
            &mut copy.ifttt.maker_key,
        ] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        if copy.store.secret.is_some() {
            copy.store.secret = Some(REDACTED.to_string());
        }
        toml::to_string_pretty(&copy).unwrap_or_else(|e| format!("<unprintable config: {}>", e))
    }
}

fn check_url(key: &str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}
