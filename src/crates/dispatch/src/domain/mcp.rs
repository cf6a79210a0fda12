//! Calendar provider speaking MCP `tools/call` over JSON-RPC 2.0 / HTTP.

use super::calendar::{CalendarProvider, CalendarTool};
use crate::{Collaborator, DispatchError, ProviderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// JSON-RPC 2.0 request structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallResult {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    structured_content: Option<Value>,
    #[serde(default)]
    is_error: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl ToolCallResult {
    fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
    }
}

/// Calendar backend reached through an MCP server's HTTP endpoint
pub struct McpCalendarProvider {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl McpCalendarProvider {
    /// Create a provider posting to `endpoint` with a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Config(format!("Failed to build calendar client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                collaborator: Collaborator::Calendar,
                after: self.timeout,
            }
        } else if err.is_connect() {
            ProviderError::Unavailable {
                collaborator: Collaborator::Calendar,
                message: format!("{} not reachable: {}", self.endpoint, err),
            }
        } else {
            ProviderError::Failed {
                collaborator: Collaborator::Calendar,
                message: err.to_string(),
            }
        }
    }
}

fn invalid(message: impl Into<String>) -> ProviderError {
    ProviderError::InvalidResponse {
        collaborator: Collaborator::Calendar,
        message: message.into(),
    }
}

fn failed(message: impl Into<String>) -> ProviderError {
    ProviderError::Failed {
        collaborator: Collaborator::Calendar,
        message: message.into(),
    }
}

#[async_trait]
impl CalendarProvider for McpCalendarProvider {
    async fn invoke_tool(
        &self,
        tool: CalendarTool,
        arguments: Value,
    ) -> std::result::Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(
            id,
            "tools/call",
            json!({ "name": tool.as_str(), "arguments": arguments }),
        );

        tracing::debug!(tool = %tool, id, endpoint = %self.endpoint, "Calling calendar tool");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("HTTP {}: {}", status, body);
            return Err(if status.is_server_error() {
                ProviderError::Unavailable {
                    collaborator: Collaborator::Calendar,
                    message,
                }
            } else {
                failed(message)
            });
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| invalid(format!("not a JSON-RPC response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(failed(format!("{} (code {})", error.message, error.code)));
        }

        let result = body.result.ok_or_else(|| invalid("JSON-RPC response has no result"))?;
        let result: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| invalid(format!("unexpected tools/call result: {}", e)))?;

        if result.is_error.unwrap_or(false) {
            let message = result.first_text().unwrap_or("tool reported an error");
            return Err(failed(message));
        }

        if let Some(data) = result.structured_content {
            return Ok(data);
        }

        match result.first_text() {
            Some(text) => Ok(serde_json::from_str(text)
                .unwrap_or_else(|_| Value::String(text.to_string()))),
            None => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = JsonRpcRequest::new(
            7,
            "tools/call",
            json!({"name": "list_events", "arguments": {"calendarId": "primary"}}),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["params"]["name"], "list_events");
    }

    #[test]
    fn test_tool_result_text_block() {
        let result: ToolCallResult = serde_json::from_value(json!({
            "content": [{"type": "image", "data": "..."}, {"type": "text", "text": "{\"id\": \"e1\"}"}]
        }))
        .unwrap();
        assert_eq!(result.first_text(), Some("{\"id\": \"e1\"}"));
        assert!(result.structured_content.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let provider =
            McpCalendarProvider::new("http://127.0.0.1:9/mcp", Duration::from_secs(2)).unwrap();
        let err = provider
            .invoke_tool(CalendarTool::ListEvents, json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.collaborator(), Collaborator::Calendar);
        assert!(matches!(
            err,
            ProviderError::Unavailable { .. } | ProviderError::Timeout { .. }
        ));
    }
}
