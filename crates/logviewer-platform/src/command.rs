use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand, ExitStatus, Output, Stdio};

use tracing::trace;

use crate::error::{Error, Result};
use crate::shell::Shell;

#[derive(Debug)]
pub struct Command {
    inner: StdCommand,
    program: String,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            inner: StdCommand::new(&program),
            program,
        }
    }

    /// Run `script` through `shell`, e.g. `sh -c "exec ./bin/elasticsearch"`.
    pub fn shell(shell: Shell, script: impl Into<String>) -> Self {
        let script = script.into();
        let mut inner = StdCommand::new(shell.executable());
        inner.args([shell.script_flag(), script.as_str()]);
        Self {
            inner,
            program: format!("{} {} {script}", shell.executable(), shell.script_flag()),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.inner.arg(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.inner.args(args);
        self
    }

    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.inner.env(key, val);
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.inner.envs(vars);
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.inner.current_dir(dir);
        self
    }

    /// Detach stdin so the child never waits on the terminal.
    pub fn detached(mut self) -> Self {
        self.inner.stdin(Stdio::null());
        self
    }

    /// Human readable form for logs and error messages.
    pub fn describe(&self) -> &str {
        &self.program
    }

    pub fn get_program(&self) -> &OsStr {
        self.inner.get_program()
    }

    pub fn get_args(&self) -> Vec<OsString> {
        self.inner.get_args().map(OsStr::to_os_string).collect()
    }

    pub fn get_env(&self, key: impl AsRef<OsStr>) -> Option<OsString> {
        let key = key.as_ref();
        self.inner
            .get_envs()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.map(OsStr::to_os_string))
    }

    pub fn get_current_dir(&self) -> Option<PathBuf> {
        self.inner.get_current_dir().map(Path::to_path_buf)
    }

    pub fn output(&mut self) -> Result<Output> {
        self.inner.output().map_err(|e| self.failed(e))
    }

    pub fn status(&mut self) -> Result<ExitStatus> {
        trace!(program = %self.program, args = ?self.get_args(), "running command");
        self.inner.status().map_err(|e| self.failed(e))
    }

    pub fn spawn(&mut self) -> Result<Child> {
        trace!(program = %self.program, args = ?self.get_args(), "spawning command");
        self.inner.spawn().map_err(|e| self.failed(e))
    }

    fn failed(&self, source: std::io::Error) -> Error {
        Error::CommandFailed {
            cmd: self.program.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_keeps_program() {
        let cmd = Command::new("echo").arg("hello").arg("world");
        assert_eq!(cmd.describe(), "echo");
        assert_eq!(cmd.get_args().len(), 2);
    }

    #[test]
    fn shell_wraps_script() {
        let cmd = Command::shell(Shell::Sh, "exec ./bin/elasticsearch");
        assert_eq!(cmd.get_program(), "sh");
        assert_eq!(
            cmd.get_args(),
            vec![OsString::from("-c"), OsString::from("exec ./bin/elasticsearch")]
        );
        assert_eq!(cmd.describe(), "sh -c exec ./bin/elasticsearch");
    }

    #[test]
    fn env_and_dir_are_recorded() {
        let cmd = Command::new("java")
            .env("JAVA_HOME", "/opt/jdk")
            .envs([("A", "1")])
            .current_dir("/opt");
        assert_eq!(cmd.get_env("JAVA_HOME"), Some(OsString::from("/opt/jdk")));
        assert_eq!(cmd.get_env("A"), Some(OsString::from("1")));
        assert_eq!(cmd.get_env("MISSING"), None);
        assert_eq!(cmd.get_current_dir(), Some(PathBuf::from("/opt")));
    }

    #[test]
    fn spawn_missing_program_fails() {
        let mut cmd = Command::new("logviewer-definitely-not-a-program");
        match cmd.spawn() {
            Err(Error::CommandFailed { cmd, .. }) => {
                assert_eq!(cmd, "logviewer-definitely-not-a-program")
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn shell_runs_in_directory_with_env() {
        let dir = std::env::temp_dir();
        let mut cmd = Command::shell(Shell::Sh, "printf '%s' \"$LOGVIEWER_PROBE\"")
            .env("LOGVIEWER_PROBE", "ok")
            .current_dir(&dir);
        let output = cmd.output().unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "ok");
    }
}
