pub mod ingest;
pub mod init;
pub mod profile;
pub mod query;
pub mod serve;

use quill_config::AppConfig;
use quill_service::{ServiceContext, Status};
use serde::Serialize;
use std::path::PathBuf;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Load the config from `path` or the default location.
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(&path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// Start a context for a single command.
pub fn start(path: Option<PathBuf>) -> Result<ServiceContext, Box<dyn std::error::Error>> {
    Ok(ServiceContext::start(load_config(path)?)?)
}

/// Print an outcome as pretty JSON and fail the command on `error`.
pub fn emit<T: Serialize>(status: Status, outcome: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    if status == Status::Error {
        return Err("command failed".into());
    }
    Ok(())
}
