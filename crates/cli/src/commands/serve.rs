//! `quill serve`: start the HTTP API server.

use super::{CommandResult, load_config};
use std::path::PathBuf;

pub async fn run(config: Option<PathBuf>, port_override: Option<u16>) -> CommandResult {
    let mut config = load_config(config)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Quill gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.default_provider, config.default_model);
    println!("   Profile:   {}", config.profile.path.display());

    quill_gateway::start(config).await?;

    Ok(())
}
