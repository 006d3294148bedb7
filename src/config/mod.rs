use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Scalar runtime settings. Everything has a default so the server runs
/// with no config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,

    /// Files older than this are removed by the cleanup sweep.
    #[serde(default = "default_cleanup_max_age_secs")]
    pub cleanup_max_age_secs: u64,

    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,

    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Explicit path to the extraction tool. When unset the bare program
    /// name is resolved through PATH.
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    #[serde(default = "default_logging_format")]
    pub logging_format: String,
}

fn default_port() -> u16 {
    5000
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_cleanup_max_age_secs() -> u64 {
    3600
}

fn default_metadata_timeout_secs() -> u64 {
    30
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_logging_format() -> String {
    "json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str("").expect("empty config must deserialize from defaults")
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {path}"))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// PORT and VIDGATE_ENV override the file for container deployments.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("PORT").ok().and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Ok(env) = std::env::var("VIDGATE_ENV") {
            if !env.trim().is_empty() {
                self.environment = env;
            }
        }
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging_format
    }

    pub fn cleanup_max_age(&self) -> Duration {
        Duration::from_secs(self.cleanup_max_age_secs)
    }
}
