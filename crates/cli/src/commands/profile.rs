//! `quill profile`: print the stored profile without starting any pools.

use super::{CommandResult, load_config};
use quill_profile::ProfileStore;
use std::path::PathBuf;

pub async fn run(config: Option<PathBuf>) -> CommandResult {
    let config = load_config(config)?;
    let store = ProfileStore::open(&config.profile.path)?;
    let profile = store.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&profile.to_json())?);
    Ok(())
}
