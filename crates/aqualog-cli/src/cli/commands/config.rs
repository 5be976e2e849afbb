//! Config commands.

use anyhow::Result;
use aqualog_core::config::{Config, paths};

/// Prints the path to the config file.
pub fn path() -> Result<()> {
    println!("{}", paths::config_path().display());
    Ok(())
}

/// Creates a default config file if none exists.
pub fn init() -> Result<()> {
    let path = paths::config_path();
    Config::init(&path)?;
    println!("Created {}", path.display());
    Ok(())
}
