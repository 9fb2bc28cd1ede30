use std::path::Path;

use anyhow::Result;
use logviewer_platform::HostInfo;
use logviewer_provision::{Provisioner, RunReport};
use tracing::info;

use crate::cli::RunArgs;

pub fn run(args: RunArgs, config: Option<&Path>) -> Result<()> {
    let mut config = super::load_config(config)?;
    args.apply(&mut config);
    info!(host = %HostInfo::get(), "starting");

    let report = Provisioner::new(config).run()?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Installed into {} ({})", report.install_dir.display(), report.platform);
    for installed in &report.components {
        let mut line = format!("  {:<14}", installed.component.to_string());
        if let Some(pid) = installed.pid {
            line.push_str(&format!(" pid {pid:<7}"));
        }
        if let Some(elapsed) = installed.ready_after {
            line.push_str(&format!(" ready after {:.1}s", elapsed.as_secs_f64()));
        }
        if let Some(path) = &installed.path {
            line.push_str(&format!("  {}", path.display()));
        }
        println!("{}", line.trim_end());
    }
    if report.browser_opened {
        println!("Dashboard opened at {}", report.dashboard_url);
    } else {
        println!("Dashboard available at {}", report.dashboard_url);
    }
}
