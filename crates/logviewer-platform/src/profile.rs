//! The per-platform provisioning table.
//!
//! Every OS-specific decision lives here: artifact names, how each component
//! is installed, how processes are launched, what the environment needs and
//! how a browser is opened. Callers resolve a [`PlatformProfile`] once and
//! never branch on the OS themselves.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use logviewer_archive::ArchiveFormat;
use serde::Serialize;

use crate::command::Command;
use crate::error::Result;
use crate::os::PlatformId;
use crate::shell::Shell;

pub const STACK_VERSION: &str = "7.17.20";
pub const RUNTIME_VERSION: &str = "17.0.11";
pub const DEFAULT_DASHBOARD_URL: &str = "http://localhost:5601";
pub const SEARCH_ENGINE_PORT: u16 = 9200;

const WINDOWS_JAVA_PATH: &str = r"C:\Program Files\Common Files\Oracle\Java\javapath";

/// Stack members, in provisioning order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    Runtime,
    SearchEngine,
    Dashboard,
}

impl Component {
    pub const ORDER: [Component; 3] = [Self::Runtime, Self::SearchEngine, Self::Dashboard];

    pub fn key(self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::SearchEngine => "search",
            Self::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Runtime => "runtime",
            Self::SearchEngine => "search engine",
            Self::Dashboard => "dashboard",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InstallMethod {
    /// Unpack into the install root.
    Archive {
        #[serde(serialize_with = "display")]
        format: ArchiveFormat,
    },
    /// Hand the artifact to the OS installer and wait for it to finish.
    /// `{installer}` in `args` is replaced with the artifact path.
    NativeInstaller { program: String, args: Vec<String> },
}

impl InstallMethod {
    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Archive { .. })
    }

    /// Blocking invocation for [`InstallMethod::NativeInstaller`].
    pub fn installer_command(&self, installer: &Path) -> Option<Command> {
        match self {
            Self::Archive { .. } => None,
            Self::NativeInstaller { program, args } => {
                let installer = installer.to_string_lossy();
                Some(
                    Command::new(program.clone())
                        .args(args.iter().map(|a| a.replace("{installer}", &installer))),
                )
            }
        }
    }
}

/// How to start a long-running component from its install directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchTemplate {
    pub shell: Shell,
    /// Program path relative to the component directory.
    pub program: String,
}

impl LaunchTemplate {
    pub fn command(&self, working_dir: &Path) -> Command {
        Command::shell(self.shell, self.shell.exec_script(&self.program))
            .current_dir(working_dir)
            .detached()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReadinessTarget {
    /// Ready once a TCP connection is accepted.
    Tcp { host: String, port: u16 },
    /// Ready once the URL answers with a status below 500.
    Http { url: String },
}

impl fmt::Display for ReadinessTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Http { url } => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessSpec {
    pub target: ReadinessTarget,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentStrategy {
    pub component: Component,
    /// Artifact file name looked up in the source directory.
    pub artifact: String,
    pub install: InstallMethod,
    /// Directory the artifact unpacks to, relative to the install root.
    pub home: Option<PathBuf>,
    pub launch: Option<LaunchTemplate>,
    pub readiness: Option<ReadinessSpec>,
}

/// Entry added to the child PATH.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "kebab-case")]
pub enum PathEntry {
    /// Used verbatim.
    Fixed(PathBuf),
    /// Joined onto the install root.
    UnderInstall(PathBuf),
}

impl PathEntry {
    pub fn resolve(&self, install_root: &Path) -> PathBuf {
        match self {
            Self::Fixed(path) => path.clone(),
            Self::UnderInstall(path) => install_root.join(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeHome {
    pub var: String,
    /// Relative to the install root.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvSpec {
    pub runtime_home: Option<RuntimeHome>,
    pub path_additions: Vec<PathEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserOpener {
    pub program: String,
    /// `{url}` is replaced with the dashboard URL.
    pub args: Vec<String>,
}

impl BrowserOpener {
    pub fn command(&self, url: &str) -> Command {
        Command::new(self.program.clone())
            .args(self.args.iter().map(|a| a.replace("{url}", url)))
            .detached()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    pub platform: PlatformId,
    pub components: Vec<ComponentStrategy>,
    pub env: EnvSpec,
    pub browser: BrowserOpener,
    pub dashboard_url: String,
}

impl PlatformProfile {
    /// Look up the profile for a platform identifier such as `"linux"`.
    ///
    /// Unknown identifiers fail with [`Error::UnsupportedPlatform`](crate::Error::UnsupportedPlatform).
    pub fn resolve(platform: &str) -> Result<Self> {
        Ok(Self::for_platform(platform.parse()?))
    }

    /// Profile of the running host.
    pub fn detect() -> Result<Self> {
        Ok(Self::for_platform(PlatformId::detect()?))
    }

    pub fn for_platform(platform: PlatformId) -> Self {
        match platform {
            PlatformId::Macos => Self::macos(),
            PlatformId::Linux => Self::linux(),
            PlatformId::Windows => Self::windows(),
        }
    }

    pub fn component(&self, component: Component) -> Option<&ComponentStrategy> {
        self.components.iter().find(|c| c.component == component)
    }

    pub fn component_mut(&mut self, component: Component) -> Option<&mut ComponentStrategy> {
        self.components.iter_mut().find(|c| c.component == component)
    }

    fn macos() -> Self {
        let platform = PlatformId::Macos;
        Self {
            platform,
            components: vec![
                ComponentStrategy {
                    component: Component::Runtime,
                    artifact: "jdk-17_macos-x64_bin.tar.gz".into(),
                    install: InstallMethod::Archive {
                        format: ArchiveFormat::TAR_GZ,
                    },
                    home: Some(PathBuf::from(format!("jdk-{RUNTIME_VERSION}.jdk"))),
                    launch: None,
                    readiness: None,
                },
                search_engine(platform, ArchiveFormat::TAR_GZ, Shell::Bash),
                dashboard(platform, ArchiveFormat::TAR_GZ, Shell::Bash, 90),
            ],
            env: EnvSpec {
                runtime_home: Some(RuntimeHome {
                    var: "JAVA_HOME".into(),
                    path: PathBuf::from(format!("jdk-{RUNTIME_VERSION}.jdk"))
                        .join("Contents")
                        .join("Home"),
                }),
                path_additions: Vec::new(),
            },
            browser: BrowserOpener {
                program: "open".into(),
                args: vec!["{url}".into()],
            },
            dashboard_url: DEFAULT_DASHBOARD_URL.into(),
        }
    }

    fn linux() -> Self {
        let platform = PlatformId::Linux;
        Self {
            platform,
            // The Linux engine distribution bundles its own JDK.
            components: vec![
                search_engine(platform, ArchiveFormat::TAR_GZ, Shell::Sh),
                dashboard(platform, ArchiveFormat::TAR_GZ, Shell::Sh, 90),
            ],
            env: EnvSpec::default(),
            browser: BrowserOpener {
                program: "xdg-open".into(),
                args: vec!["{url}".into()],
            },
            dashboard_url: DEFAULT_DASHBOARD_URL.into(),
        }
    }

    fn windows() -> Self {
        let platform = PlatformId::Windows;
        Self {
            platform,
            components: vec![
                ComponentStrategy {
                    component: Component::Runtime,
                    artifact: "jdk-17_windows-x64_bin.msi".into(),
                    install: InstallMethod::NativeInstaller {
                        program: "cmd".into(),
                        args: ["/C", "start", "/wait", "", "{installer}"]
                            .map(String::from)
                            .to_vec(),
                    },
                    home: None,
                    launch: None,
                    readiness: None,
                },
                search_engine(platform, ArchiveFormat::Zip, Shell::Cmd),
                dashboard(platform, ArchiveFormat::Zip, Shell::Cmd, 240),
            ],
            env: EnvSpec {
                runtime_home: None,
                path_additions: vec![PathEntry::Fixed(PathBuf::from(WINDOWS_JAVA_PATH))],
            },
            browser: BrowserOpener {
                program: "cmd".into(),
                args: ["/C", "start", "", "{url}"].map(String::from).to_vec(),
            },
            dashboard_url: DEFAULT_DASHBOARD_URL.into(),
        }
    }
}

fn artifact_name(product: &str, platform: PlatformId, format: ArchiveFormat) -> String {
    format!(
        "{product}-{STACK_VERSION}-{}-x86_64.{}",
        platform.artifact_tag(),
        format.extension()
    )
}

fn launcher(product: &str, shell: Shell) -> String {
    match shell {
        Shell::Cmd | Shell::Powershell => format!(r".\bin\{product}.bat"),
        Shell::Sh | Shell::Bash => format!("./bin/{product}"),
    }
}

fn search_engine(platform: PlatformId, format: ArchiveFormat, shell: Shell) -> ComponentStrategy {
    ComponentStrategy {
        component: Component::SearchEngine,
        artifact: artifact_name("elasticsearch", platform, format),
        install: InstallMethod::Archive { format },
        home: Some(PathBuf::from(format!("elasticsearch-{STACK_VERSION}"))),
        launch: Some(LaunchTemplate {
            shell,
            program: launcher("elasticsearch", shell),
        }),
        readiness: Some(ReadinessSpec {
            target: ReadinessTarget::Tcp {
                host: "127.0.0.1".into(),
                port: SEARCH_ENGINE_PORT,
            },
            timeout: Duration::from_secs(60),
        }),
    }
}

fn dashboard(
    platform: PlatformId,
    format: ArchiveFormat,
    shell: Shell,
    timeout_secs: u64,
) -> ComponentStrategy {
    ComponentStrategy {
        component: Component::Dashboard,
        artifact: artifact_name("kibana", platform, format),
        install: InstallMethod::Archive { format },
        home: Some(PathBuf::from(format!(
            "kibana-{STACK_VERSION}-{}-x86_64",
            platform.artifact_tag()
        ))),
        launch: Some(LaunchTemplate {
            shell,
            program: launcher("kibana", shell),
        }),
        readiness: Some(ReadinessSpec {
            target: ReadinessTarget::Http {
                url: DEFAULT_DASHBOARD_URL.into(),
            },
            timeout: Duration::from_secs(timeout_secs),
        }),
    }
}

fn display<T: fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
