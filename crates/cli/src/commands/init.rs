//! `quill init`: write a default configuration file.

use super::CommandResult;
use quill_config::AppConfig;
use std::path::PathBuf;

pub fn run(config: Option<PathBuf>, force: bool) -> CommandResult {
    let config_path = config.unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    if config_path.exists() && !force {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.");
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created config at: {}", config_path.display());
    println!("\nNext steps:");
    println!("   1. Set QUILL_API_KEY (or api_key in the file) for hosted providers");
    println!("   2. quill ingest ~/Documents/w2.txt");
    println!("   3. quill query \"What is my employer's address?\"");

    Ok(())
}
