//! LinkMind configuration system.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LinkMindError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkMindConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Cadences and dispatch knobs. All cadences are configuration, not core
/// logic — the loops just tick at whatever is set here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the dispatch worker checks for due tasks.
    #[serde(default = "default_dispatch_interval")]
    pub dispatch_interval_secs: u64,
    /// Max tasks claimed per worker pass.
    #[serde(default = "default_batch_size")]
    pub dispatch_batch_size: usize,
    /// Reconciliation sweep cadence — a safety net, not the primary path.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Daily digest cadence.
    #[serde(default = "default_digest_interval")]
    pub digest_interval_secs: u64,
    /// Send attempts before a task is marked Failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Exponential backoff base.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
    /// Backoff ceiling.
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_secs: u64,
    /// Claims older than this are returned to Scheduled (crashed worker).
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout_secs: u64,
    /// How long Delivered/Failed/Cancelled tasks are kept before purge.
    #[serde(default = "default_audit_retention")]
    pub audit_retention_secs: u64,
}

fn default_dispatch_interval() -> u64 { 15 }
fn default_batch_size() -> usize { 25 }
fn default_sweep_interval() -> u64 { 60 }
fn default_digest_interval() -> u64 { 86_400 }
fn default_max_attempts() -> u32 { 5 }
fn default_backoff_base() -> u64 { 30 }
fn default_backoff_cap() -> u64 { 3_600 }
fn default_claim_timeout() -> u64 { 120 }
fn default_audit_retention() -> u64 { 604_800 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispatch_interval_secs: default_dispatch_interval(),
            dispatch_batch_size: default_batch_size(),
            sweep_interval_secs: default_sweep_interval(),
            digest_interval_secs: default_digest_interval(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base(),
            backoff_cap_secs: default_backoff_cap(),
            claim_timeout_secs: default_claim_timeout(),
            audit_retention_secs: default_audit_retention(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "~/.linkmind/linkmind.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Push relay endpoint. Empty string = log-only sender (dev mode).
    #[serde(default)]
    pub push_url: String,
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
}

fn default_send_timeout() -> u64 { 10 }

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            push_url: String::new(),
            timeout_secs: default_send_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8686 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl LinkMindConfig {
    /// Load config from the default path (~/.linkmind/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LinkMindError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| LinkMindError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LinkMindError::Config(format!("Failed to create config dir: {e}")))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| LinkMindError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| LinkMindError::Config(format!("Failed to write config: {e}")))?;
        Ok(())
    }

    /// Default config path (~/.linkmind/config.toml).
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// LinkMind home directory (~/.linkmind).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".linkmind")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = LinkMindConfig::default();
        assert_eq!(config.scheduler.dispatch_interval_secs, 15);
        assert_eq!(config.scheduler.max_attempts, 5);
        assert_eq!(config.scheduler.backoff_cap_secs, 3_600);
        assert_eq!(config.api.port, 8686);
        assert!(config.sender.push_url.is_empty());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: LinkMindConfig = toml::from_str(
            r#"
            [scheduler]
            max_attempts = 3

            [api]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.max_attempts, 3);
        assert_eq!(config.scheduler.dispatch_batch_size, 25);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "127.0.0.1");
    }
}
