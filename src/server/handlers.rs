use super::types::{
    ErrorResponse, QueryRequest, QueryResponse, StatusResponse, status_code,
};
use crate::bridge::{FailureKind, InferenceResult, Question, QueryBridge};
use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub const QUERY_PATH: &str = "/api/agente-consultar";

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<QueryBridge>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(bridge: QueryBridge) -> Self {
        Self {
            bridge: Arc::new(bridge),
            started_at: Utc::now(),
        }
    }
}

type ErrorReply = (StatusCode, Json<ErrorResponse>);

fn reject(kind: FailureKind, detail: impl Into<String>) -> ErrorReply {
    (
        status_code(kind),
        Json(ErrorResponse::new(kind, Some(detail.into()))),
    )
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "API Conservatório PE - Online".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        transport: state.bridge.transport_name().to_string(),
        started_at: state.started_at,
        endpoints: vec![format!("POST {}", QUERY_PATH)],
    })
}

pub async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ErrorReply> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected malformed query body: {}", rejection.body_text());
        reject(FailureKind::Validation, rejection.body_text())
    })?;

    let raw = request.question.unwrap_or_default();
    let question = Question::parse(&raw).map_err(|e| {
        warn!("Rejected invalid question: {}", e);
        reject(FailureKind::Validation, e.to_string())
    })?;

    for turn in &request.history {
        turn.validate().map_err(|e| {
            warn!("Rejected invalid history: {}", e);
            reject(FailureKind::Validation, e.to_string())
        })?;
    }

    info!("New question: {}", question);

    match state.bridge.query(question, request.history).await {
        InferenceResult::Success { text, token_usage } => Ok(Json(QueryResponse {
            success: true,
            text,
            token_usage: token_usage.map(|usage| usage.total_tokens),
        })),
        InferenceResult::Failure { kind, detail } => Err((
            status_code(kind),
            Json(ErrorResponse::new(kind, detail)),
        )),
    }
}
