//! Portal connection and polling configuration
//!
//! Settings are read from a YAML file and then overridden by environment
//! variables:
//!
//! ```yaml
//! api_url: https://portal.example.net/api/v1
//! token: "..."
//! financial_project_id: fin-1234
//! request_timeout_secs: 30
//! poll:
//!   interval_secs: 10
//!   max_attempts: 360
//!   timeout_secs: 3600
//! ```

pub mod error;

pub use error::*;

use portalflow_order::PollPolicy;
use portalflow_order::poll::DEFAULT_MAX_POLLS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "PORTAL_CONFIG_PATH";
pub const API_URL_ENV: &str = "PORTAL_API_URL";
pub const TOKEN_ENV: &str = "PORTAL_TOKEN";

const LOCAL_FILE: &str = "portal.yaml";

/// Poll settings as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub max_attempts: u32,
    pub timeout_secs: Option<u64>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_attempts: DEFAULT_MAX_POLLS,
            timeout_secs: None,
        }
    }
}

impl PollSettings {
    pub fn to_policy(&self) -> PollPolicy {
        let policy = PollPolicy::every(Duration::from_secs(self.interval_secs.max(1)))
            .with_max_polls(self.max_attempts);
        match self.timeout_secs {
            Some(secs) => policy.with_timeout(Duration::from_secs(secs)),
            None => policy,
        }
    }
}

/// On-disk shape; every field may be supplied by the environment instead
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    api_url: Option<String>,
    token: Option<String>,
    financial_project_id: Option<String>,
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    poll: PollSettings,
}

/// Resolved portal configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub token: String,
    /// Billing project attached to new orders
    pub financial_project_id: Option<String>,
    /// Per-request HTTP timeout; the client default applies when unset
    pub request_timeout_secs: Option<u64>,
    pub poll: PollSettings,
    /// File the settings were read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl PortalConfig {
    /// Find the config file, read it and apply environment overrides.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir()?;
        match find_config_file(&current_dir) {
            Some(path) => Self::from_file(&path),
            None => {
                if std::env::var(API_URL_ENV).is_err() {
                    return Err(ConfigError::NotFound);
                }
                Self::resolve(ConfigFile::default(), None)
            }
        }
    }

    /// Read a specific file and apply environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::resolve(file, Some(path.to_path_buf()))
    }

    fn resolve(file: ConfigFile, source: Option<PathBuf>) -> Result<Self> {
        let api_url = std::env::var(API_URL_ENV)
            .ok()
            .or(file.api_url)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingValue("api_url".to_string()))?;
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .or(file.token)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingValue("token".to_string()))?;

        Ok(Self {
            api_url,
            token,
            financial_project_id: file.financial_project_id,
            request_timeout_secs: file.request_timeout_secs,
            poll: file.poll,
            source,
        })
    }

    /// Billing project, required when creating orders
    pub fn require_financial_project(&self) -> Result<&str> {
        self.financial_project_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingValue("financial_project_id".to_string()))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Global config file location: `<config_dir>/portalflow/config.yaml`
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("portalflow").join("config.yaml"))
}

/// Look for the config file
///
/// Search order:
/// 1. `PORTAL_CONFIG_PATH`
/// 2. `portal.yaml` in `dir`
/// 3. `<config_dir>/portalflow/config.yaml`
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Some(path);
        }
    }

    let local = dir.join(LOCAL_FILE);
    if local.exists() {
        return Some(local);
    }

    global_config_path().filter(|path| path.exists())
}
