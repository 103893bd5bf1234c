//! Loading bot configuration from TOML.
//!
//! The file path comes from BOT_CONFIG_PATH (default `config.toml`); TELEGRAM_TOKEN,
//! when set, replaces `telegram.token` so the secret can stay out of the file.
//!
//! ```toml
//! [telegram]
//! token = "123:abc"
//! chat_id = -1001234567890
//!
//! [store]
//! path = "boardwhite.json"
//!
//! [stickers]
//! daily = ["CAACAgIAAx..."]
//! dp = "CAACAgIAAy..."
//!
//! [http]
//! addr = "127.0.0.1:8088"
//! admin_token = "change-me"
//!
//! [[streams]]
//! name = "neetcode"
//! title = "NeetCode"
//! thread_id = 42
//! start_date = "2024-03-01T07:00:00Z"
//! catalog = "neetcode150"
//! publish_cron = "0 0 7 * * *"
//! ```

use std::{collections::HashSet, net::SocketAddr, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::catalog::EMBEDDED_NEETCODE;
use crate::domain::ThreadId;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("parse {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: toml::de::Error,
  },
  #[error("invalid config: {0}")]
  Invalid(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct BotConfig {
  pub telegram: TelegramConfig,
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub stickers: StickersConfig,
  #[serde(default)]
  pub http: HttpConfig,
  pub streams: Vec<StreamConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramConfig {
  #[serde(default)]
  pub token: String,
  pub chat_id: i64,
  #[serde(default = "default_api_base_url")]
  pub api_base_url: String,
  #[serde(default = "default_poll_timeout_secs")]
  pub poll_timeout_secs: u64,
}

fn default_api_base_url() -> String {
  "https://api.telegram.org".into()
}

fn default_poll_timeout_secs() -> u64 {
  30
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct StoreConfig {
  /// JSON snapshot file. Without it the store lives only in memory.
  #[serde(default)]
  pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StickersConfig {
  #[serde(default)]
  pub daily: Vec<String>,
  #[serde(default)]
  pub dp: Option<String>,
  #[serde(default = "default_dp_groups")]
  pub dp_groups: Vec<String>,
}

impl Default for StickersConfig {
  fn default() -> Self {
    Self { daily: Vec::new(), dp: None, dp_groups: default_dp_groups() }
  }
}

fn default_dp_groups() -> Vec<String> {
  vec!["1-D DP".into(), "2-D DP".into()]
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct HttpConfig {
  /// Admin endpoint address; disabled when absent.
  #[serde(default)]
  pub addr: Option<SocketAddr>,
  /// Shared secret expected in `x-admin-token` on mutating requests. Required with `addr`.
  #[serde(default)]
  pub admin_token: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StreamConfig {
  pub name: String,
  pub title: String,
  pub thread_id: ThreadId,
  pub start_date: DateTime<Utc>,
  #[serde(default = "default_catalog")]
  pub catalog: String,
  #[serde(default)]
  pub publish_cron: Option<String>,
  /// Replaces the global daily pool for this stream.
  #[serde(default)]
  pub sticker_ids: Option<Vec<String>>,
}

fn default_catalog() -> String {
  EMBEDDED_NEETCODE.into()
}

impl BotConfig {
  pub fn from_toml(path: &str, raw: &str) -> Result<Self, ConfigError> {
    let cfg: BotConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse { path: path.to_string(), source })?;
    cfg.validate()?;
    Ok(cfg)
  }

  /// Load from BOT_CONFIG_PATH, then apply the TELEGRAM_TOKEN override.
  pub fn load_from_env() -> Result<Self, ConfigError> {
    let path = std::env::var("BOT_CONFIG_PATH").unwrap_or_else(|_| "config.toml".into());
    Self::load(&path, std::env::var("TELEGRAM_TOKEN").ok())
  }

  /// Read `path`; a non-empty `token_override` replaces `telegram.token` before validation.
  pub fn load(path: &str, token_override: Option<String>) -> Result<Self, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_string(), source })?;
    let mut cfg: BotConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_string(), source })?;
    if let Some(token) = token_override.filter(|t| !t.trim().is_empty()) {
      cfg.telegram.token = token;
    }
    cfg.validate()?;
    info!(target: "boardwhite", %path, streams = cfg.streams.len(), "Loaded bot config (TOML)");
    Ok(cfg)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.telegram.token.trim().is_empty() {
      return Err(ConfigError::Invalid("telegram.token is empty (set it or TELEGRAM_TOKEN)".into()));
    }
    if self.http.addr.is_some() && self.http.admin_token.as_deref().map_or(true, |t| t.trim().is_empty()) {
      return Err(ConfigError::Invalid("http.admin_token is required when http.addr is set".into()));
    }
    if self.streams.is_empty() {
      return Err(ConfigError::Invalid("at least one [[streams]] entry is required".into()));
    }
    let mut seen = HashSet::new();
    for s in &self.streams {
      if !seen.insert(s.name.as_str()) {
        return Err(ConfigError::Invalid(format!("duplicate stream name {:?}", s.name)));
      }
      if self.sticker_pool(s).is_empty() {
        return Err(ConfigError::Invalid(format!("stream {:?} has an empty sticker pool", s.name)));
      }
    }
    Ok(())
  }

  /// Stickers a stream picks from at random.
  pub fn sticker_pool<'a>(&'a self, stream: &'a StreamConfig) -> &'a [String] {
    stream.sticker_ids.as_deref().unwrap_or(self.stickers.daily.as_slice())
  }
}
