//! logviewer: provision and launch a local Elasticsearch and Kibana stack.

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use logviewer_provision::ProvisionError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, RunArgs};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => commands::run::run(args, config),
        Commands::Plan(args) => commands::plan::run(args, config),
        Commands::Extract(args) => commands::extract::run(args),
    }
}

/// Exit status for a failed command; 1 when the cause is not classified.
fn exit_code(error: &anyhow::Error) -> u8 {
    if let Some(e) = error.downcast_ref::<ProvisionError>() {
        return e.exit_code();
    }
    if error.downcast_ref::<logviewer_archive::Error>().is_some() {
        return 5;
    }
    1
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // RUST_LOG only applies when no -v flag was given
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_errors_keep_their_exit_code() {
        let err = anyhow::Error::new(ProvisionError::EnvironmentConfig("no JAVA_HOME".into()));
        assert_eq!(exit_code(&err), 6);

        let wrapped = err.context("provisioning");
        assert_eq!(exit_code(&wrapped), 6);
    }

    #[test]
    fn archive_errors_map_to_extraction() {
        let err = anyhow::Error::new(logviewer_archive::Error::UnsupportedFormat);
        assert_eq!(exit_code(&err), 5);
    }

    #[test]
    fn unknown_errors_are_generic() {
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
    }
}
