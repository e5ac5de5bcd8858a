//! HTTP routes. Mounted at the root and again under `/api/v1`.
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use minirag_core::config::MAX_K;
use minirag_core::types::{AnswerMode, ChunkMetadata, SearchHit};
use minirag_core::Error;
use minirag_rag::AppContext;

pub type SharedContext = Arc<AppContext>;

pub fn router(ctx: SharedContext) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .route("/ask", post(ask));

    Router::new().route("/", get(root)).merge(api.clone()).nest("/api/v1", api).with_state(ctx)
}

/// Maps pipeline errors to status codes and a `{error, detail}` body.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            debug!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        (status, Json(json!({ "error": self.0.kind(), "detail": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ContextItem {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Squared L2 distance to the query; lower is closer.
    pub score: f32,
}

impl From<SearchHit> for ContextItem {
    fn from(hit: SearchHit) -> Self {
        Self { content: hit.chunk.content, metadata: hit.chunk.metadata, score: hit.distance }
    }
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub contexts: Vec<ContextItem>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: Option<String>,
    pub contexts: Vec<ContextItem>,
    pub mode: AnswerMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub vectorstore_loaded: bool,
    pub llm_available: bool,
    pub embedder_loaded: bool,
    pub embedding_model: Option<String>,
    pub indexed_chunks: usize,
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Mini-RAG API", "health": "/api/v1/health" }))
}

async fn health(State(ctx): State<SharedContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        vectorstore_loaded: ctx.index.is_some(),
        llm_available: ctx.generator.is_some(),
        embedder_loaded: ctx.embedder.is_some(),
        embedding_model: ctx.embedder.as_ref().map(|e| e.model_id().to_string()),
        indexed_chunks: ctx.indexed_chunks(),
    })
}

async fn query(
    State(ctx): State<SharedContext>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(req) = body?;
    let k = validate_k(req.k, ctx.settings.retrieval.default_k)?;
    let hits = ctx.query(&req.query, k).await?;
    let contexts: Vec<ContextItem> = hits.into_iter().map(ContextItem::from).collect();
    Ok(Json(QueryResponse { query: req.query, count: contexts.len(), contexts }))
}

async fn ask(
    State(ctx): State<SharedContext>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(req) = body?;
    let k = validate_k(req.k, ctx.settings.retrieval.default_k)?;
    let answer = ctx.ask(&req.question, k).await?;
    Ok(Json(AskResponse {
        question: answer.question,
        answer: answer.answer,
        contexts: answer.contexts.into_iter().map(ContextItem::from).collect(),
        mode: answer.mode,
    }))
}

/// Blank queries are rejected by the pipeline itself.
fn validate_k(k: Option<usize>, default_k: usize) -> Result<usize, ApiError> {
    let k = k.unwrap_or(default_k);
    if !(1..=MAX_K).contains(&k) {
        return Err(Error::Validation(format!("k must be between 1 and {MAX_K}, got {k}")).into());
    }
    Ok(k)
}
