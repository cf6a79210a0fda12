//! Handlers for `/api/query` and `/health`

use super::error::{ApiError, ApiResult};
use super::models::{HealthResponse, QueryBody, QueryResponse};
use crate::executor::Dispatcher;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

/// Handler for POST /api/query
pub async fn query(
    State(dispatcher): State<Arc<Dispatcher>>,
    body: Result<Json<QueryBody>, JsonRejection>,
) -> ApiResult<Json<QueryResponse>> {
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let request = body
        .into_request()
        .ok_or_else(|| ApiError::BadRequest("either 'text' or 'message' is required".to_string()))?;

    let reply = dispatcher.handle(request).await?;
    Ok(Json(reply.into()))
}

/// Handler for GET /health
pub async fn health(State(dispatcher): State<Arc<Dispatcher>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        domains: dispatcher
            .registry()
            .enabled_domains()
            .into_iter()
            .map(|domain| domain.as_str())
            .collect(),
        sessions: dispatcher.sessions().len(),
    })
}
