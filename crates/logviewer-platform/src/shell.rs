//! Shells used to run launch scripts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Sh,
    Bash,
    Cmd,
    Powershell,
}

impl Shell {
    pub fn executable(self) -> &'static str {
        match self {
            Self::Sh => "sh",
            Self::Bash => "bash",
            Self::Cmd => "cmd",
            Self::Powershell => "powershell",
        }
    }

    /// Flag that makes the shell run the next argument as a script.
    pub fn script_flag(self) -> &'static str {
        match self {
            Self::Sh | Self::Bash => "-c",
            Self::Cmd => "/C",
            Self::Powershell => "-Command",
        }
    }

    /// Script that replaces the shell with `program`, so the spawned PID is
    /// the program's own where the shell allows it.
    pub fn exec_script(self, program: &str) -> String {
        match self {
            Self::Sh | Self::Bash => format!("exec {program}"),
            Self::Cmd => program.to_string(),
            Self::Powershell => format!("& {program}"),
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable())
    }
}

impl FromStr for Shell {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sh" => Ok(Self::Sh),
            "bash" => Ok(Self::Bash),
            "cmd" | "cmd.exe" => Ok(Self::Cmd),
            "powershell" | "pwsh" => Ok(Self::Powershell),
            other => Err(Error::UnknownShell(other.to_string())),
        }
    }
}
