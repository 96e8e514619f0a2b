//! Configuration command implementations

use anyhow::{Result, bail};

use crate::cli::{ConfigCommands, Output};
use crate::config::ShardrunConfig;

pub async fn execute(cmd: ConfigCommands, config_path: Option<&str>, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show { format } => show(&format, config_path, output),
    }
}

fn show(format: &str, config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = ShardrunConfig::load(config_path)?;
    // Validate before printing so a bad value is reported, not echoed
    let settings = config.settings()?;

    let rendered = match format {
        "json" => serde_json::to_string_pretty(&config.get_full_config()?)?,
        "toml" => toml::to_string_pretty(&config.get_full_config()?)?,
        other => bail!("Unsupported format: {other} (expected json or toml)"),
    };

    println!("{rendered}");
    output.verbose(&format!(
        "Effective max workers: {}",
        settings.parallel.effective_max_workers()
    ));
    Ok(())
}
