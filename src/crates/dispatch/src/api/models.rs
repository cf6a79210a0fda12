//! Request and response bodies for the HTTP adapter

use crate::action::ActionResult;
use crate::executor::{QueryReply, QueryRequest};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/query`.
///
/// `text` is canonical. `message` is the older order-flow field and is
/// accepted as an alias; when both are present `text` wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBody {
    pub session_id: Option<String>,
    pub text: Option<String>,
    pub message: Option<String>,
    pub calendar_id: Option<String>,
}

impl QueryBody {
    /// Canonical request, or `None` when neither text field carries anything.
    pub fn into_request(self) -> Option<QueryRequest> {
        let text = [self.text, self.message]
            .into_iter()
            .flatten()
            .find(|t| !t.trim().is_empty())?;

        Some(QueryRequest {
            session_id: self.session_id,
            text,
            calendar_id: self.calendar_id,
        })
    }
}

/// Successful `POST /api/query` reply
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub session_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ActionResult>,
}

impl From<QueryReply> for QueryResponse {
    fn from(reply: QueryReply) -> Self {
        Self {
            session_id: reply.session_id,
            message: reply.message,
            data: reply.data,
        }
    }
}

/// `GET /health` reply
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub domains: Vec<&'static str>,
    pub sessions: usize,
}
