//! Layered run configuration.
//!
//! Values are read from serde defaults, then an optional TOML file, then
//! `LOGVIEWER_*` environment variables. Nested keys use a double underscore,
//! e.g. `LOGVIEWER_SEARCH__SOURCE` sets `search.source`. Command-line flags
//! are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use logviewer_platform::Component;
use logviewer_platform::dir::{executable_dir, user_home};
use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};
use crate::readiness::{ReadinessMode, WaitPolicy};

pub const ENV_PREFIX: &str = "LOGVIEWER_";

/// Directory created under the user home when no install dir is configured.
pub const INSTALL_DIR_NAME: &str = "LogViewer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Install root. Defaults to `<home>/LogViewer`.
    pub install_dir: Option<PathBuf>,
    /// Base for relative artifact paths. Defaults to the executable's directory.
    pub source_dir: Option<PathBuf>,
    /// Platform override such as `linux`; detected when unset.
    pub platform: Option<String>,
    pub dashboard_url: Option<String>,
    pub open_browser: bool,
    pub rollback: bool,
    pub runtime: SourceConfig,
    pub search: SourceConfig,
    pub dashboard: SourceConfig,
    pub readiness: ReadinessConfig,
    pub download: DownloadConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            source_dir: None,
            platform: None,
            dashboard_url: None,
            open_browser: true,
            rollback: true,
            runtime: SourceConfig::default(),
            search: SourceConfig::default(),
            dashboard: SourceConfig::default(),
            readiness: ReadinessConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

/// Per-component overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Path or `http(s)://` URL replacing the platform's artifact name.
    pub source: Option<String>,
    /// Expected SHA-256 of the artifact, hex encoded.
    pub sha256: Option<String>,
    /// Replaces the platform's readiness timeout.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub mode: ReadinessMode,
    pub interval_ms: u64,
    pub max_interval_ms: u64,
    pub attempt_timeout_ms: u64,
    pub max_attempts: Option<u32>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        let policy = WaitPolicy::default();
        Self {
            mode: ReadinessMode::default(),
            interval_ms: policy.interval.as_millis() as u64,
            max_interval_ms: policy.max_interval.as_millis() as u64,
            attempt_timeout_ms: policy.attempt_timeout.as_millis() as u64,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub max_retries: u32,
    /// Draw progress bars for remote downloads.
    pub progress: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            progress: true,
        }
    }
}

impl ProvisionConfig {
    /// The provider stack without extracting it.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load defaults, then `file` (which must exist when given), then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        if let Some(file) = file
            && !file.is_file()
        {
            return Err(ProvisionError::setting(
                "config",
                format!("{} does not exist", file.display()),
            ));
        }
        Ok(Self::figment(file).extract()?)
    }

    pub fn source(&self, component: Component) -> &SourceConfig {
        match component {
            Component::Runtime => &self.runtime,
            Component::SearchEngine => &self.search,
            Component::Dashboard => &self.dashboard,
        }
    }

    pub fn resolve_install_dir(&self) -> Result<PathBuf> {
        match &self.install_dir {
            Some(dir) => Ok(dir.clone()),
            None => user_home()
                .map(|home| home.join(INSTALL_DIR_NAME))
                .map_err(|e| ProvisionError::EnvironmentConfig(e.to_string())),
        }
    }

    pub fn resolve_source_dir(&self) -> Result<PathBuf> {
        match &self.source_dir {
            Some(dir) => Ok(dir.clone()),
            None => executable_dir().map_err(|e| ProvisionError::EnvironmentConfig(e.to_string())),
        }
    }

    /// Wait policy for a component whose readiness deadline is `timeout`.
    pub fn wait_policy(&self, timeout: Duration) -> WaitPolicy {
        let r = &self.readiness;
        WaitPolicy {
            interval: Duration::from_millis(r.interval_ms),
            max_interval: Duration::from_millis(r.max_interval_ms),
            attempt_timeout: Duration::from_millis(r.attempt_timeout_ms),
            timeout,
            max_attempts: r.max_attempts,
        }
    }
}
