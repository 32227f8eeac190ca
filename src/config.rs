use crate::error::{Result as RflaunchResult, RflaunchError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub launcher: LauncherConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub icon_cache: IconCacheConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub plugin_directories: Vec<PathBuf>,
    pub max_results: usize,
    pub result_page_multiplier: usize,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            plugin_directories: vec![default_data_dir().join("plugins")],
            max_results: 10,
            result_page_multiplier: 5,
        }
    }
}

impl LauncherConfig {
    /// Number of merged results kept per emitted view.
    pub fn result_limit(&self) -> usize {
        self.max_results * self.result_page_multiplier.max(1)
    }
}

/// Whether a recognised action keyword also lets global plugins run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordScope {
    /// Keyword owner and global plugins both run.
    #[default]
    Narrow,
    /// Only the keyword owner runs.
    Exclusive,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub worker_threads: Option<usize>,
    pub keyword_scope: KeywordScope,
}

impl DispatchConfig {
    pub fn worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_python_path")]
    pub python_path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_python_path() -> String {
    "python3".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            python_path: default_python_path(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ProtocolConfig {
    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_millis(self.timeout_ms)
    }
}

/// Process timeout for a millisecond setting. `0` disables the timeout.
pub fn timeout_from_millis(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconCacheConfig {
    #[serde(default = "default_icon_capacity")]
    pub capacity: usize,
    #[serde(default = "default_icon_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_icon_capacity() -> usize {
    512
}
fn default_icon_ttl() -> u64 {
    600
}
fn default_sweep_interval() -> u64 {
    60
}

impl Default for IconCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_icon_capacity(),
            ttl_secs: default_icon_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl IconCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("rflaunch")
}

impl Config {
    /// Loads the config from `explicit` if given, otherwise from the first
    /// well-known location that exists. No file means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_path(),
        };

        if let Some(path) = config_path {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Some(xdg_config) = dirs::config_dir() {
            let xdg_path = xdg_config.join("rflaunch/config.toml");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let home_path = home.join(".rflaunch.toml");
            if home_path.exists() {
                return Some(home_path);
            }
        }

        let current_path = Path::new(".rflaunch.toml");
        if current_path.exists() {
            return Some(current_path.to_path_buf());
        }

        None
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

pub fn validate(cfg: &Config) -> RflaunchResult<()> {
    if cfg.launcher.max_results == 0 || cfg.launcher.max_results > 100 {
        return Err(RflaunchError::Config(
            "launcher.max_results must be between 1 and 100".into(),
        ));
    }

    if cfg.launcher.result_page_multiplier == 0 {
        return Err(RflaunchError::Config(
            "launcher.result_page_multiplier must be at least 1".into(),
        ));
    }

    if cfg.dispatch.worker_threads == Some(0) {
        return Err(RflaunchError::Config(
            "dispatch.worker_threads must be at least 1".into(),
        ));
    }

    if cfg.icon_cache.capacity == 0 {
        return Err(RflaunchError::Config(
            "icon_cache.capacity must be at least 1".into(),
        ));
    }

    if cfg.icon_cache.sweep_interval_secs == 0 {
        return Err(RflaunchError::Config(
            "icon_cache.sweep_interval_secs must be at least 1".into(),
        ));
    }

    if cfg.protocol.python_path.trim().is_empty() {
        return Err(RflaunchError::Config("protocol.python_path is required".into()));
    }

    Ok(())
}
