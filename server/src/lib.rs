use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use nutrition_assistant::{AnswerData, Assistant};
use nutrition_core::{FoodRecord, RecordId};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub score: f64,
    #[serde(flatten)]
    pub record: FoodRecord,
}

#[derive(Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct QuestionResponse {
    pub question: String,
    #[serde(flatten)]
    pub data: AnswerData,
}

#[derive(Clone)]
pub struct AppState {
    pub assistant: Assistant,
    pub default_model: String,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

pub fn build_app(assistant: Assistant, default_model: impl Into<String>) -> Router {
    let state = AppState { assistant, default_model: default_model.into() };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/question", post(question_handler))
        .route("/search", get(search_handler))
        .route("/record/:id", get(record_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn question_handler(
    State(state): State<AppState>,
    Json(req): Json<QuestionRequest>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "question must not be empty"));
    }
    let model = req.model.as_deref().unwrap_or(&state.default_model);
    match state.assistant.answer(question, model).await {
        Ok(data) => Ok(Json(QuestionResponse { question: question.to_string(), data })),
        Err(e) => {
            tracing::error!(error = %e, "answer pipeline failed");
            Err(api_error(StatusCode::BAD_GATEWAY, format!("could not answer: {e}")))
        }
    }
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, 100);
    let query = state.assistant.settings().query(&params.q).with_limit(k);
    let results = state
        .assistant
        .index()
        .search_scored(&query)
        .into_iter()
        .map(|hit| SearchHit { score: hit.score, record: hit.record.clone() })
        .collect();
    Json(SearchResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), results })
}

pub async fn record_handler(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> Result<Json<FoodRecord>, ApiError> {
    state
        .assistant
        .index()
        .get(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "not found"))
}
