//! Config Command
//!
//! Show, locate, and initialize configuration.

use crate::config::ConfigLoader;
use crate::types::{ProbeError, Result};

/// Print the effective merged configuration.
pub fn show(as_json: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!(
            "{}",
            toml::to_string_pretty(&config).map_err(|e| ProbeError::Config(e.to_string()))?
        );
    }
    Ok(())
}

/// Print config file locations and whether they exist.
pub fn path() -> Result<()> {
    println!("Configuration paths:");
    println!();

    if let Some(global) = ConfigLoader::global_config_path() {
        let exists = if global.exists() { "✓" } else { "✗" };
        println!("  Global:  {} {}", exists, global.display());
    } else {
        println!("  Global:  (not available)");
    }

    let project = ConfigLoader::project_config_path();
    let exists = if project.exists() { "✓" } else { "✗" };
    println!("  Project: {} {}", exists, project.display());

    Ok(())
}

/// Create `.repoprobe/config.toml` with commented defaults.
pub fn init() -> Result<()> {
    let dir = ConfigLoader::init_project()?;
    println!("Initialized project config in {}", dir.display());
    Ok(())
}
