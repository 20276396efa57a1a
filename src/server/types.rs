use crate::bridge::{ConversationTurn, FailureKind};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/agente-consultar`. Field aliases accept the names the
/// existing frontend sends.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default, alias = "pergunta")]
    pub question: Option<String>,
    #[serde(default, alias = "historico")]
    pub history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error_kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn new(error_kind: FailureKind, detail: Option<String>) -> Self {
        Self {
            success: false,
            error_kind,
            detail,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub message: String,
    pub version: String,
    pub transport: String,
    pub started_at: DateTime<Utc>,
    pub endpoints: Vec<String>,
}

pub fn status_code(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Validation => StatusCode::BAD_REQUEST,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
