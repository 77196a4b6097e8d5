//! configuration: cli flags over config file over defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vista_core::client::DEFAULT_SERVER_URL;
use vista_core::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};

/// flags shared by every subcommand; each one overrides the config file
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// config file (default: <config dir>/vista/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// wallet node REST endpoint
    #[arg(long, global = true, env = "VISTA_SERVER_URL")]
    pub server_url: Option<String>,

    /// local history database path
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// wallet index the local history is scoped to
    #[arg(long, global = true)]
    pub address_id: Option<u32>,

    /// wallet receiving address
    #[arg(long, global = true)]
    pub address: Option<String>,

    #[arg(long, global = true)]
    pub poll_interval_secs: Option<u64>,

    #[arg(long, global = true)]
    pub request_timeout_secs: Option<u64>,

    /// error, warn, info, debug or trace
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// value for the node's authorization header
    #[arg(long, global = true, env = "VISTA_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
}

/// config.toml contents; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub address_id: Option<u32>,
    pub address: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub auth_token: Option<String>,
}

impl FileConfig {
    /// a missing file is an empty config
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no config file at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server_url: String,
    pub data_dir: PathBuf,
    pub address_id: u32,
    pub address: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub log_level: Option<String>,
    pub auth_token: Option<String>,
}

impl Config {
    pub fn resolve(args: &ConfigArgs, file: FileConfig) -> Self {
        Self {
            server_url: args
                .server_url
                .clone()
                .or(file.server_url)
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            data_dir: args
                .data_dir
                .clone()
                .or(file.data_dir)
                .unwrap_or_else(default_data_dir),
            address_id: args.address_id.or(file.address_id).unwrap_or(0),
            address: args.address.clone().or(file.address).unwrap_or_default(),
            poll_interval: Duration::from_secs(
                args.poll_interval_secs
                    .or(file.poll_interval_secs)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                    .max(1),
            ),
            request_timeout: Duration::from_secs(
                args.request_timeout_secs
                    .or(file.request_timeout_secs)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                    .max(1),
            ),
            log_level: args.log_level.clone().or(file.log_level),
            auth_token: args.auth_token.clone().or(file.auth_token),
        }
    }

    /// read the file named by `--config` (or the default one) and merge
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        let file = match args.config.clone().or_else(default_config_path) {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::resolve(args, file))
    }

    /// tracing filter directive for our crates
    pub fn log_filter(&self) -> String {
        let level = self.log_level.as_deref().unwrap_or("info");
        format!("vista={},vista_core={}", level, level)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vista").join("config.toml"))
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vista")
        .join("history.db")
}
