//! CLI argument parsing with clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use logviewer_archive::{ArchiveFormat, PermissionStrategy};
use logviewer_provision::{ProvisionConfig, ReadinessMode};

/// Provision and launch a local Elasticsearch and Kibana stack
#[derive(Parser, Debug)]
#[command(name = "logviewer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a logviewer.toml config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install, launch and open the stack
    Run(RunArgs),

    /// Show what `run` would do without touching anything
    Plan(PlanArgs),

    /// Unpack a single archive
    Extract(ExtractArgs),
}

/// Flags that decide where things come from and go to.
#[derive(Args, Debug, Default, Clone)]
pub struct ResolveArgs {
    /// Install root [default: ~/LogViewer]
    #[arg(long, value_name = "DIR")]
    pub install_dir: Option<PathBuf>,

    /// Directory holding the artifacts [default: next to this executable]
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Provision for this platform instead of the detected one
    #[arg(long, value_name = "ID")]
    pub platform: Option<String>,
}

impl ResolveArgs {
    pub fn apply(&self, config: &mut ProvisionConfig) {
        if let Some(dir) = &self.install_dir {
            config.install_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.source_dir {
            config.source_dir = Some(dir.clone());
        }
        if let Some(platform) = &self.platform {
            config.platform = Some(platform.clone());
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub resolve: ResolveArgs,

    /// Do not open the dashboard in a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Leave a failed run's partial install and processes in place
    #[arg(long)]
    pub no_rollback: bool,

    /// Wait fixed delays instead of probing the services
    #[arg(long)]
    pub fixed_wait: bool,
}

impl RunArgs {
    pub fn apply(&self, config: &mut ProvisionConfig) {
        self.resolve.apply(config);
        if self.no_browser {
            config.open_browser = false;
        }
        if self.no_rollback {
            config.rollback = false;
        }
        if self.fixed_wait {
            config.readiness.mode = ReadinessMode::Delay;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub resolve: ResolveArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Archive to unpack
    pub archive: PathBuf,

    /// Destination directory, created if missing
    pub destination: PathBuf,

    /// Archive format (zip, tar.gz, tar); detected from content when omitted
    #[arg(long)]
    pub format: Option<ArchiveFormat>,

    /// How stored permission bits are applied
    #[arg(long, value_enum, default_value_t = Permissions::Preserve)]
    pub permissions: Permissions,

    /// Also write `__MACOSX/` metadata entries
    #[arg(long)]
    pub keep_macos_metadata: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    /// Keep the archive's bits
    Preserve,
    /// Archive bits plus owner read/write
    Standard,
    /// 0755 for executables and directories, 0644 otherwise
    Owned,
}

impl From<Permissions> for PermissionStrategy {
    fn from(p: Permissions) -> Self {
        match p {
            Permissions::Preserve => Self::Preserve,
            Permissions::Standard => Self::Standard,
            Permissions::Owned => Self::Owned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_has_no_subcommand() {
        let cli = Cli::try_parse_from(["logviewer"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn run_flags_override_config() {
        let cli = Cli::try_parse_from([
            "logviewer",
            "run",
            "--install-dir",
            "/opt/lv",
            "--platform",
            "linux",
            "--no-browser",
            "--fixed-wait",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };

        let mut config = ProvisionConfig::default();
        args.apply(&mut config);
        assert_eq!(config.install_dir, Some(PathBuf::from("/opt/lv")));
        assert_eq!(config.platform.as_deref(), Some("linux"));
        assert!(!config.open_browser);
        assert!(config.rollback);
        assert_eq!(config.readiness.mode, ReadinessMode::Delay);
    }

    #[test]
    fn extract_parses_format() {
        let cli = Cli::try_parse_from([
            "logviewer",
            "extract",
            "kibana.tgz",
            "out",
            "--format",
            "tar.gz",
            "--permissions",
            "owned",
        ])
        .unwrap();
        let Some(Commands::Extract(args)) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.format, Some(ArchiveFormat::TAR_GZ));
        assert_eq!(args.permissions, Permissions::Owned);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["logviewer", "-q", "-v", "plan"]).is_err());
    }
}
