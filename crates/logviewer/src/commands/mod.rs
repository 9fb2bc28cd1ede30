use std::path::Path;

use anyhow::Result;
use logviewer_provision::ProvisionConfig;

pub mod extract;
pub mod plan;
pub mod run;

/// Config file, then `LOGVIEWER_*` variables. Flags are applied by each command.
fn load_config(path: Option<&Path>) -> Result<ProvisionConfig> {
    Ok(ProvisionConfig::load(path)?)
}
