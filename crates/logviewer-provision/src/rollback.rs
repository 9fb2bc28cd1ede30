//! Compensating actions for a failed run.
//!
//! Stages record what they created as they go. On failure the journal is
//! unwound newest first; each step is best effort and failures are only
//! logged, so the error that caused the rollback is the one reported.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use logviewer_platform::Component;
use tracing::{info, warn};

use crate::effects::ManagedProcess;

enum Compensation {
    RemovePath(PathBuf),
    Terminate {
        component: Component,
        process: Box<dyn ManagedProcess>,
    },
}

pub struct Journal {
    actions: Vec<Compensation>,
    enabled: bool,
}

impl Journal {
    /// A disabled journal still tracks processes but never undoes anything.
    pub fn new(enabled: bool) -> Self {
        Self {
            actions: Vec::new(),
            enabled,
        }
    }

    /// Remove `path` (file or directory tree) if the run fails.
    pub fn remove_on_failure(&mut self, path: PathBuf) {
        self.actions.push(Compensation::RemovePath(path));
    }

    /// Hold a launched process, terminating it if the run fails.
    pub fn track_process(&mut self, component: Component, process: Box<dyn ManagedProcess>) {
        self.actions.push(Compensation::Terminate { component, process });
    }

    pub fn process_mut(&mut self, component: Component) -> Option<&mut dyn ManagedProcess> {
        self.actions.iter_mut().find_map(|action| match action {
            Compensation::Terminate {
                component: c,
                process,
            } if *c == component => Some(process.as_mut() as &mut dyn ManagedProcess),
            _ => None,
        })
    }

    /// The run succeeded: forget every compensation and leave processes running.
    pub fn commit(self) {
        let processes = self
            .actions
            .iter()
            .filter(|a| matches!(a, Compensation::Terminate { .. }))
            .count();
        info!(processes, "run committed");
    }

    /// Undo recorded actions newest first. Returns how many steps failed.
    pub fn unwind(self) -> usize {
        if !self.enabled {
            info!(pending = self.actions.len(), "rollback disabled, leaving partial install in place");
            return 0;
        }
        let mut failures = 0;
        for action in self.actions.into_iter().rev() {
            match action {
                Compensation::Terminate {
                    component,
                    mut process,
                } => {
                    let pid = process.id();
                    match process.terminate() {
                        Ok(()) => info!(%component, pid, "terminated"),
                        Err(e) => {
                            warn!(%component, pid, error = %e, "failed to terminate");
                            failures += 1;
                        }
                    }
                }
                Compensation::RemovePath(path) => match remove_path(&path) {
                    Ok(()) => info!(path = %path.display(), "removed"),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to remove");
                        failures += 1;
                    }
                },
            }
        }
        failures
    }
}

fn remove_path(path: &Path) -> io::Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
