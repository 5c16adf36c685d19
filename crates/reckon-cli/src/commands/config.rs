//! Config command

use anyhow::Result;
use reckon_core::{config::default_config_path, EngineConfig};

pub fn cmd_config(config: &EngineConfig) -> Result<()> {
    if let Some(path) = default_config_path() {
        let state = if path.exists() { "active" } else { "not present" };
        println!("# Data-dir override: {} ({})", path.display(), state);
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
