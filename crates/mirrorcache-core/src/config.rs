//! Mirror cache configuration.
//!
//! Configuration is stored at `~/.config/mirrorcache/config.json`; every
//! field is optional and environment variables override the file:
//!
//! - `MIRRORCACHE_MANIFEST_URL`
//! - `MIRRORCACHE_CACHE_DIR`
//! - `MIRRORCACHE_MEMORY_CACHE` (`1`/`true`/`yes` to enable)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::error::MirrorError;
use crate::sync::DEFAULT_MAX_CONCURRENT_DOWNLOADS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "mirrorcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_MANIFEST_URL: &str = "MIRRORCACHE_MANIFEST_URL";
const ENV_CACHE_DIR: &str = "MIRRORCACHE_CACHE_DIR";
const ENV_MEMORY_CACHE: &str = "MIRRORCACHE_MEMORY_CACHE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub manifest_url: Option<String>,
    pub use_memory_cache: bool,
    /// Only request URLs starting with this prefix are intercepted.
    pub intercept_prefix: Option<String>,
    /// Cache root; defaults to the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    pub max_concurrent_downloads: usize,
    pub request_timeout_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            manifest_url: None,
            use_memory_cache: false,
            intercept_prefix: None,
            cache_dir: None,
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl MirrorConfig {
    /// Load the config file (defaults if absent) and apply env overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_MANIFEST_URL).filter(|v| !v.trim().is_empty()) {
            self.manifest_url = Some(url);
        }
        if let Some(dir) = var(ENV_CACHE_DIR).filter(|v| !v.trim().is_empty()) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = var(ENV_MEMORY_CACHE) {
            self.use_memory_cache = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Resolved cache root: explicit dir, platform cache dir, or `./cache`.
    pub fn cache_root(&self) -> PathBuf {
        if let Some(ref dir) = self.cache_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .map(|dir| dir.join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from("./cache"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// The manifest URL, checked before any reconciliation starts.
    pub fn validated_manifest_url(&self) -> Result<&str, MirrorError> {
        validate_manifest_url(self.manifest_url.as_deref())
    }
}

/// Reject a missing, unparseable or non-http(s) manifest URL.
pub fn validate_manifest_url(url: Option<&str>) -> Result<&str, MirrorError> {
    let url = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| MirrorError::Configuration("manifest URL is not set".to_string()))?;

    let parsed = Url::parse(url)
        .map_err(|e| MirrorError::Configuration(format!("invalid manifest URL {}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(url),
        other => Err(MirrorError::Configuration(format!(
            "manifest URL must be http or https, got {}",
            other
        ))),
    }
}
