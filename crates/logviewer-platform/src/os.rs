//! Operating system detection.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::error::{Error, Result};

/// Platforms the provisioning table knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Linux,
    Macos,
    Windows,
}

impl PlatformId {
    pub const ALL: [PlatformId; 3] = [Self::Linux, Self::Macos, Self::Windows];

    /// Platform of the running process.
    ///
    /// Fails for anything outside [`PlatformId::ALL`], before any work is done.
    pub fn detect() -> Result<Self> {
        std::env::consts::OS.parse()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
        }
    }

    /// Platform word used in Elastic artifact names.
    pub fn artifact_tag(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "darwin",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" | "osx" => Ok(Self::Macos),
            "windows" | "win" | "win32" => Ok(Self::Windows),
            other => Err(Error::UnsupportedPlatform(other.to_string())),
        }
    }
}

static HOST_INFO: Lazy<HostInfo> = Lazy::new(HostInfo::load);

/// Descriptive facts about the host, used for diagnostics only.
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub arch: &'static str,
}

impl HostInfo {
    fn load() -> Self {
        Self {
            name: System::name(),
            os_version: System::long_os_version(),
            kernel_version: System::kernel_version(),
            arch: std::env::consts::ARCH,
        }
    }

    pub fn get() -> &'static HostInfo {
        &HOST_INFO
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let os = self
            .os_version
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("unknown OS");
        write!(f, "{os} ({})", self.arch)
    }
}
