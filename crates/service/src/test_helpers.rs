//! Shared fixtures for service tests.

use crate::context::ServiceContext;
use quill_config::AppConfig;
use quill_core::provider::Provider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A config rooted in `dir`, with small pools and chunks.
pub fn config_in(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.profile.path = dir.join("uploads").join("user_info.json");
    config.index.dir = dir.join("vector_db");
    config.runtime.cpu_workers = 2;
    config.runtime.io_workers = 4;
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 50;
    config
}

pub fn context(dir: &TempDir, provider: Arc<dyn Provider>) -> ServiceContext {
    ServiceContext::start_with(config_in(dir.path()), provider).unwrap()
}

pub fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}
