//! Provisioning orchestrator for the logviewer stack.
//!
//! A run moves through fixed states: acquire every artifact, unpack or
//! install them, derive the launch environment, start the search engine and
//! then the dashboard (each gated on a readiness probe), and finally open the
//! dashboard in a browser. Any failure before activation unwinds a journal of
//! compensating actions.

pub use config::{ProvisionConfig, SourceConfig};
pub use effects::{Acquire, Exited, Launch, ManagedProcess, OpenBrowser};
pub use env::LaunchEnv;
pub use error::{ProvisionError, Result};
pub use orchestrator::{InstalledComponent, Plan, PlannedComponent, Provisioner, RunReport};
pub use readiness::{
    ProbeFactory, ReadinessMode, ReadinessProbe, Ready, WaitError, WaitPolicy, wait_until_ready,
};
pub use rollback::Journal;
pub use state::{State, StateObserver};

pub mod config;
pub mod effects;
mod env;
mod error;
mod orchestrator;
pub mod readiness;
mod rollback;
mod state;
