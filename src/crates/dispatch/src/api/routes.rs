//! API route definitions

use super::handlers;
use crate::executor::Dispatcher;
use crate::{DispatchError, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the router over a shared dispatcher.
///
/// `allowed_origin` restricts CORS to one origin; `None` allows any.
pub fn create_router(dispatcher: Arc<Dispatcher>, allowed_origin: Option<&str>) -> Result<Router> {
    Ok(Router::new()
        .route("/health", get(handlers::health))
        .route("/api/query", post(handlers::query))
        .layer(cors_layer(allowed_origin)?)
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher))
}

/// CORS layer for the query endpoint
pub fn cors_layer(allowed_origin: Option<&str>) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match allowed_origin {
        Some(origin) => {
            let origin = HeaderValue::from_str(origin.trim()).map_err(|e| {
                DispatchError::Config(format!("Invalid allowed origin '{}': {}", origin, e))
            })?;
            Ok(layer.allow_origin(origin))
        }
        None => Ok(layer.allow_origin(tower_http::cors::Any)),
    }
}
