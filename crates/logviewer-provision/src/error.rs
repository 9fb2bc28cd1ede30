use std::io;
use std::path::PathBuf;

use logviewer_platform::Component;
use thiserror::Error;

use crate::readiness::WaitError;

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to obtain the {component} artifact")]
    Transfer {
        component: Component,
        #[source]
        source: logviewer_fetch::Error,
    },

    #[error("failed to extract the {component} archive")]
    Extraction {
        component: Component,
        #[source]
        source: logviewer_archive::Error,
    },

    #[error(transparent)]
    UnsupportedPlatform(logviewer_platform::Error),

    #[error("failed to launch {component}")]
    ProcessLaunch {
        component: Component,
        #[source]
        source: logviewer_platform::Error,
    },

    #[error("{component} installer exited unsuccessfully (exit code {code:?})")]
    InstallerFailed {
        component: Component,
        code: Option<i32>,
    },

    #[error("environment configuration failed: {0}")]
    EnvironmentConfig(String),

    #[error("{component} did not become ready")]
    Readiness {
        component: Component,
        #[source]
        source: WaitError,
    },

    #[error("invalid configuration")]
    Config(#[from] Box<figment::Error>),

    #[error("invalid setting `{key}`: {message}")]
    InvalidSetting { key: String, message: String },

    #[error("I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ProvisionError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::InvalidSetting { .. } => 2,
            Self::UnsupportedPlatform(_) => 3,
            Self::Transfer { .. } => 4,
            Self::Extraction { .. } => 5,
            Self::EnvironmentConfig(_) => 6,
            Self::ProcessLaunch { .. } | Self::InstallerFailed { .. } => 7,
            Self::Readiness { .. } => 8,
            Self::Io { .. } => 1,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub(crate) fn setting(key: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

impl From<figment::Error> for ProvisionError {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}
