//! `quill query`

use super::{CommandResult, emit, start};
use quill_service::QueryRequest;
use std::path::PathBuf;

pub async fn run(
    config: Option<PathBuf>,
    question: String,
    history: String,
    form: Option<PathBuf>,
) -> CommandResult {
    let ctx = start(config)?;

    let mut request = QueryRequest::new(question).with_history(history);
    if let Some(form) = form {
        request = request.with_form(form);
    }

    let outcome = ctx.query(&request).await;
    ctx.shutdown().await;
    emit(outcome.status, &outcome)
}
