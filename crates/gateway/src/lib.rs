//! HTTP gateway for Quill.
//!
//! Exposes the service boundary over REST:
//! - `GET  /health`
//! - `POST /v1/ingest`  `{document_path}`
//! - `POST /v1/update`  `{conversation}`
//! - `POST /v1/query`   `{question, chat_history?, form_document?}`
//! - `GET  /v1/profile`
//! - `GET  /v1/indexes`
//!
//! Built on Axum. One [`ServiceContext`] lives for the whole server run.

use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use quill_config::AppConfig;
use quill_core::error::Error;
use quill_core::profile::pointer_collection;
use quill_service::{ErrorPayload, QueryRequest, ServiceContext, Status};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

pub type SharedContext = Arc<ServiceContext>;

/// Build the router over an already started context.
pub fn build_router(ctx: SharedContext) -> Router {
    let body_limit = ctx.config().gateway.body_limit_bytes;

    let v1 = Router::new()
        .route("/ingest", post(ingest_handler))
        .route("/update", post(update_handler))
        .route("/query", post(query_handler))
        .route("/profile", get(profile_handler))
        .route("/indexes", get(indexes_handler));

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:3000"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", v1)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Start the service context and serve until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let ctx = Arc::new(ServiceContext::start(config)?);
    let app = build_router(ctx.clone());

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    ctx.shutdown().await;
    Ok(())
}

/// HTTP status for a service outcome.
fn status_code(status: Status, error: Option<&ErrorPayload>) -> StatusCode {
    match (status, error) {
        (Status::Error, Some(e)) if e.kind == "parse_error" || e.kind == "invalid_request" => {
            StatusCode::BAD_REQUEST
        }
        (Status::Error, _) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

fn respond<T: Serialize>(status: Status, error: Option<&ErrorPayload>, body: &T) -> Response {
    (status_code(status, error), Json(body)).into_response()
}

#[derive(Serialize)]
struct RejectedBody {
    status: Status,
    error: ErrorPayload,
}

/// A body axum could not decode, reported like any other failed call.
fn rejected(rejection: JsonRejection) -> Response {
    warn!(error = %rejection.body_text(), "Rejected request body");
    let body = RejectedBody {
        status: Status::Error,
        error: ErrorPayload::from(&Error::InvalidRequest(rejection.body_text())),
    };
    respond(body.status, Some(&body.error), &body)
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct IngestRequest {
    document_path: PathBuf,
}

async fn ingest_handler(
    State(ctx): State<SharedContext>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected(rejection),
    };
    info!(path = %request.document_path.display(), "Ingest requested");
    let outcome = ctx.ingest(&request.document_path).await;
    respond(outcome.status, outcome.error.as_ref(), &outcome)
}

#[derive(Deserialize)]
struct UpdateRequest {
    conversation: String,
}

async fn update_handler(
    State(ctx): State<SharedContext>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected(rejection),
    };
    let outcome = ctx.update(&request.conversation).await;
    respond(outcome.status, outcome.error.as_ref(), &outcome)
}

async fn query_handler(
    State(ctx): State<SharedContext>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected(rejection),
    };
    let outcome = ctx.query(&request).await;
    respond(outcome.status, outcome.error.as_ref(), &outcome)
}

async fn profile_handler(State(ctx): State<SharedContext>) -> Json<serde_json::Value> {
    Json(ctx.profile().snapshot().await.to_json())
}

#[derive(Serialize)]
struct IndexEntry {
    field: String,
    collection: String,
    location: String,
}

async fn indexes_handler(State(ctx): State<SharedContext>) -> Json<Vec<IndexEntry>> {
    let profile = ctx.profile().snapshot().await;
    let entries = profile
        .pointers()
        .filter_map(|(field, value)| {
            let location = value.to_string();
            let collection = pointer_collection(&location)?.to_string();
            Some(IndexEntry {
                field: field.clone(),
                collection,
                location,
            })
        })
        .collect();
    Json(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use quill_providers::ScriptedProvider;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_context(dir: &TempDir, provider: ScriptedProvider) -> SharedContext {
        let mut config = AppConfig::default();
        config.profile.path = dir.path().join("user_info.json");
        config.index.dir = dir.path().join("vector_db");
        config.runtime.cpu_workers = 1;
        config.runtime.io_workers = 2;
        Arc::new(ServiceContext::start_with(config, Arc::new(provider)).unwrap())
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_context(&dir, ScriptedProvider::new("")));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn empty_profile_and_indexes() {
        let dir = TempDir::new().unwrap();
        let ctx = test_context(&dir, ScriptedProvider::new(""));

        let req = Request::builder().uri("/v1/profile").body(Body::empty()).unwrap();
        let response = build_router(ctx.clone()).oneshot(req).await.unwrap();
        assert_eq!(body_json(response).await, serde_json::json!({}));

        let req = Request::builder().uri("/v1/indexes").body(Body::empty()).unwrap();
        let response = build_router(ctx).oneshot(req).await.unwrap();
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn ingest_then_list_indexes() {
        let dir = TempDir::new().unwrap();
        let ctx = test_context(
            &dir,
            ScriptedProvider::new("{}").on("DOCUMENT CONTENT", r#"{"email": "jane@example.com"}"#),
        );
        let doc = dir.path().join("contact card.txt");
        std::fs::write(&doc, "Email: jane@example.com").unwrap();

        let response = build_router(ctx.clone())
            .oneshot(post_json(
                "/v1/ingest",
                serde_json::json!({"document_path": doc}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["extracted_facts"]["email"], "jane@example.com");
        assert_eq!(json["index"]["collection"], "contact_card");

        let req = Request::builder().uri("/v1/indexes").body(Body::empty()).unwrap();
        let json = body_json(build_router(ctx).oneshot(req).await.unwrap()).await;
        assert_eq!(json[0]["collection"], "contact_card");
        assert_eq!(json[0]["location"], "vector_db/contact_card");
    }

    #[tokio::test]
    async fn missing_document_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_context(&dir, ScriptedProvider::new("{}")));

        let response = app
            .oneshot(post_json(
                "/v1/ingest",
                serde_json::json!({"document_path": "/definitely/not/here.pdf"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "parse_error");
    }

    #[tokio::test]
    async fn query_and_update_round_trip() {
        let dir = TempDir::new().unwrap();
        let ctx = test_context(
            &dir,
            ScriptedProvider::new("I don't know.")
                .on("CONVERSATION TEXT", r#"{"favoriteColor": "blue"}"#)
                .on("QUESTION: What is my favorite color?", "Blue."),
        );

        let response = build_router(ctx.clone())
            .oneshot(post_json(
                "/v1/update",
                serde_json::json!({"conversation": "My favorite color is blue."}),
            ))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["profile"]["favoriteColor"], "blue");

        let response = build_router(ctx)
            .oneshot(post_json(
                "/v1/query",
                serde_json::json!({"question": "What is my favorite color?", "chat_history": ""}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["response"], "Blue.");
        assert_eq!(json["cached"], false);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_context(&dir, ScriptedProvider::new("")));
        let req = Request::builder()
            .method("POST")
            .uri("/v1/query")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "invalid_request");
        assert!(json["error"]["message"].as_str().unwrap().starts_with("Invalid request"));

        // Well-formed JSON missing a required field
        let response = app
            .oneshot(post_json("/v1/ingest", serde_json::json!({"path": "w2.txt"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["kind"], "invalid_request");
    }
}
