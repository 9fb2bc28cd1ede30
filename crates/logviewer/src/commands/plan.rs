use std::path::Path;

use anyhow::{Context, Result};
use logviewer_platform::{HostInfo, InstallMethod};
use logviewer_provision::{Plan, Provisioner};

use crate::cli::PlanArgs;

pub fn run(args: PlanArgs, config: Option<&Path>) -> Result<()> {
    let mut config = super::load_config(config)?;
    args.resolve.apply(&mut config);
    let plan = Provisioner::new(config.clone()).plan()?;

    if args.json {
        let json = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
        println!("{json}");
        return Ok(());
    }

    print_plan(&plan);
    let effective = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!();
    println!("Effective configuration:");
    for line in effective.lines() {
        println!("  {line}");
    }
    Ok(())
}

fn print_plan(plan: &Plan) {
    println!("Host:        {}", HostInfo::get());
    println!("Platform:    {}", plan.platform);
    println!("Install dir: {}", plan.install_dir.display());
    println!();

    let mut step = 0;
    let mut next = || {
        step += 1;
        step
    };
    for planned in &plan.components {
        let checksum = planned
            .checksum
            .map(|c| format!(" (sha256 {c})"))
            .unwrap_or_default();
        println!("{:>2}. acquire {} from {}{checksum}", next(), planned.component(), planned.source);
    }
    for planned in &plan.components {
        match &planned.strategy.install {
            InstallMethod::Archive { format } => println!(
                "{:>2}. extract {} ({format}) into {}",
                next(),
                planned.component(),
                plan.install_dir.display()
            ),
            InstallMethod::NativeInstaller { program, args } => println!(
                "{:>2}. install {} with `{program} {}`",
                next(),
                planned.component(),
                args.join(" ")
            ),
        }
    }
    if let Some(home) = &plan.env.runtime_home {
        println!("{:>2}. set {}={}", next(), home.var, plan.install_dir.join(&home.path).display());
    }
    for entry in &plan.env.path_additions {
        println!("{:>2}. add {} to PATH", next(), entry.resolve(&plan.install_dir).display());
    }
    for planned in &plan.components {
        let Some(template) = &planned.strategy.launch else {
            continue;
        };
        let dir = planned
            .install_path(&plan.install_dir)
            .unwrap_or_else(|| plan.install_dir.clone());
        println!(
            "{:>2}. launch {}: `{}` in {}",
            next(),
            planned.component(),
            template.command(&dir).describe(),
            dir.display()
        );
        if let Some(readiness) = &planned.strategy.readiness {
            println!(
                "{:>2}. wait up to {}s for {}",
                next(),
                readiness.timeout.as_secs(),
                readiness.target
            );
        }
    }
    if plan.open_browser {
        println!("{:>2}. open {} with {}", next(), plan.dashboard_url, plan.browser.program);
    }
    if !plan.rollback {
        println!();
        println!("Rollback is disabled: a failed run leaves its partial install behind.");
    }
}
