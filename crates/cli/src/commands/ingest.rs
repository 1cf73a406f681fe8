//! `quill ingest` and `quill update`.

use super::{CommandResult, emit, start};
use std::io::Read;
use std::path::PathBuf;

pub async fn run(config: Option<PathBuf>, path: PathBuf) -> CommandResult {
    let ctx = start(config)?;
    let outcome = ctx.ingest(&path).await;
    ctx.shutdown().await;
    emit(outcome.status, &outcome)
}

pub async fn update(config: Option<PathBuf>, text: Option<String>) -> CommandResult {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let ctx = start(config)?;
    let outcome = ctx.update(&text).await;
    ctx.shutdown().await;
    emit(outcome.status, &outcome)
}
