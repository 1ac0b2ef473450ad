//! Write a default configuration file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Run the init command.
///
/// Writes `path`, creating its parent directory. Returns the path of the
/// written file.
pub fn run(
    path: &Path,
    force: bool,
    username: Option<&str>,
    display_name: Option<&str>,
) -> Result<PathBuf> {
    let path = path.to_path_buf();

    // Check if already initialized
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let mut config = Config::default();
    if let Some(username) = username {
        config.identity.username = username.to_string();
    }
    if let Some(display_name) = display_name {
        config.identity.display_name = display_name.to_string();
    }
    config
        .save(&path)
        .context("Failed to write configuration")?;

    println!("Configuration written!");
    println!();
    println!("  File:     {}", path.display());
    println!("  Username: {}", config.identity.username);
    println!("  Display:  {}", config.identity.display_name);
    println!();
    println!("Next steps:");
    println!("  lanchat replay <script.json>");

    Ok(path)
}
