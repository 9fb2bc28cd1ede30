//! Platform facts and the provisioning table.

pub use error::{Error, Result};
pub use os::{HostInfo, PlatformId};
pub use profile::{
    BrowserOpener, Component, ComponentStrategy, EnvSpec, InstallMethod, LaunchTemplate,
    PathEntry, PlatformProfile, ReadinessSpec, ReadinessTarget, RuntimeHome,
};
pub use shell::Shell;

pub mod command;
pub mod dir;
pub mod env;
mod error;
pub mod os;
pub mod profile;
pub mod shell;
