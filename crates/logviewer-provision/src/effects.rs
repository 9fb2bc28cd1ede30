//! Side effects the orchestrator performs on the outside world.
//!
//! Each effect is a small trait so runs can be driven against recording
//! doubles in tests. The `System*` types are the real implementations.

use std::io;
use std::path::Path;
use std::process::{Child, ExitStatus};

use logviewer_fetch::{Acquired, FetchOptions, Source, progress_bar};
use logviewer_platform::command::Command;
use logviewer_platform::{BrowserOpener, Component};
use tracing::debug;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exited {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl Exited {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for Exited {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// A launched child the orchestrator may poll or stop.
pub trait ManagedProcess: Send {
    fn id(&self) -> u32;

    /// `Some` once the process has exited. Never blocks.
    fn try_wait(&mut self) -> io::Result<Option<Exited>>;

    /// Stop the process and reap it. Already-exited processes are left alone.
    fn terminate(&mut self) -> io::Result<()>;
}

impl ManagedProcess for Child {
    fn id(&self) -> u32 {
        Child::id(self)
    }

    fn try_wait(&mut self) -> io::Result<Option<Exited>> {
        Ok(Child::try_wait(self)?.map(Exited::from))
    }

    fn terminate(&mut self) -> io::Result<()> {
        if Child::try_wait(self)?.is_some() {
            return Ok(());
        }
        self.kill()?;
        self.wait()?;
        Ok(())
    }
}

pub trait Acquire {
    fn acquire(
        &self,
        component: Component,
        source: &Source,
        staging_dir: &Path,
        options: FetchOptions,
    ) -> logviewer_fetch::Result<Acquired>;
}

pub trait Launch {
    /// Start a long-running child and return immediately.
    fn spawn(
        &self,
        component: Component,
        command: Command,
    ) -> logviewer_platform::Result<Box<dyn ManagedProcess>>;

    /// Run a command to completion.
    fn run(&self, component: Component, command: Command) -> logviewer_platform::Result<Exited>;
}

pub trait OpenBrowser {
    fn open(&self, opener: &BrowserOpener, url: &str) -> logviewer_platform::Result<()>;
}

/// Local files in place, remote sources through `logviewer-fetch`.
#[derive(Debug, Clone, Copy)]
pub struct SystemAcquire {
    pub progress: bool,
}

impl Acquire for SystemAcquire {
    fn acquire(
        &self,
        component: Component,
        source: &Source,
        staging_dir: &Path,
        mut options: FetchOptions,
    ) -> logviewer_fetch::Result<Acquired> {
        if self.progress && source.is_remote() {
            options = options.on_progress(progress_bar(component.key()));
        }
        logviewer_fetch::acquire(source, staging_dir, &options)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLaunch;

impl Launch for SystemLaunch {
    fn spawn(
        &self,
        component: Component,
        mut command: Command,
    ) -> logviewer_platform::Result<Box<dyn ManagedProcess>> {
        let child = command.spawn()?;
        debug!(%component, pid = child.id(), "spawned");
        Ok(Box::new(child))
    }

    fn run(&self, component: Component, mut command: Command) -> logviewer_platform::Result<Exited> {
        debug!(%component, command = command.describe(), "running to completion");
        Ok(command.status()?.into())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl OpenBrowser for SystemBrowser {
    fn open(&self, opener: &BrowserOpener, url: &str) -> logviewer_platform::Result<()> {
        opener.command(url).spawn()?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use logviewer_platform::Shell;

    #[test]
    fn spawned_child_can_be_terminated() {
        let command = Command::shell(Shell::Sh, "exec sleep 30");
        let mut process = SystemLaunch.spawn(Component::SearchEngine, command).unwrap();
        assert!(process.try_wait().unwrap().is_none());

        process.terminate().unwrap();
        assert!(process.try_wait().unwrap().is_some());
    }

    #[test]
    fn terminating_an_exited_child_is_a_no_op() {
        let command = Command::shell(Shell::Sh, "exit 3");
        let mut process = SystemLaunch.spawn(Component::Dashboard, command).unwrap();
        while process.try_wait().unwrap().is_none() {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        process.terminate().unwrap();
    }

    #[test]
    fn run_reports_exit_code() {
        let exited = SystemLaunch
            .run(Component::Runtime, Command::shell(Shell::Sh, "exit 7"))
            .unwrap();
        assert_eq!(exited, Exited { code: Some(7) });
        assert!(!exited.success());
    }

    #[test]
    fn missing_program_is_a_command_failure() {
        let result = SystemLaunch.spawn(
            Component::SearchEngine,
            Command::new("/definitely/not/a/program"),
        );
        assert!(matches!(result, Err(logviewer_platform::Error::CommandFailed { .. })));
    }
}
