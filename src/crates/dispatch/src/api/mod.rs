//! HTTP adapter
//!
//! - `POST /api/query` runs one prompt through the [`Dispatcher`]
//! - `GET /health` reports the enabled domains and open sessions
//!
//! [`Dispatcher`]: crate::executor::Dispatcher

pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use models::{HealthResponse, QueryBody, QueryResponse};
pub use routes::{cors_layer, create_router};
