//! The chat-model boundary.
//!
//! Everything the dispatch layer knows about a language model goes through
//! [`ChatModel`]: an ordered list of [`Message`]s goes in, one assistant text
//! comes out. Providers translate to and from their own wire formats.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions that frame the whole conversation.
    System,
    /// Text typed by the end user.
    User,
    /// Text produced by the model.
    Assistant,
}

impl MessageRole {
    /// Wire name shared by OpenAI-compatible APIs and Ollama.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a message with an explicit role.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Message text.
    pub fn text(&self) -> &str {
        &self.content
    }
}

/// Shape the model is asked to reply in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free text; the caller extracts any structure itself.
    #[default]
    Text,
    /// Provider-enforced JSON object output.
    JsonObject,
}

/// Generation parameters for a single request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Sampling temperature; providers use their default when unset.
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<usize>,
    /// Requested output shape.
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// A request to a chat model.
///
/// ```rust,ignore
/// let request = ChatRequest::new(vec![
///     Message::system("Reply with JSON only"),
///     Message::user("查订单 123 状态"),
/// ])
/// .with_temperature(0.3)
/// .with_response_format(ResponseFormat::JsonObject);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub config: ChatConfig,
}

impl ChatRequest {
    /// Create a request with default generation parameters.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: ChatConfig::default(),
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    /// Set the requested response format.
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.config.response_format = format;
        self
    }

    /// Shorthand for toggling [`ResponseFormat::JsonObject`].
    pub fn with_json_mode(self, json_mode: bool) -> Self {
        let format = if json_mode {
            ResponseFormat::JsonObject
        } else {
            ResponseFormat::Text
        };
        self.with_response_format(format)
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl UsageMetadata {
    /// Build usage from prompt and completion counts.
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// A complete (non-streamed) model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    /// The assistant message, verbatim as the provider returned it.
    pub message: Message,
    pub usage: Option<UsageMetadata>,
    /// Provider-specific extras such as the resolved model name.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChatResponse {
    /// Wrap assistant text with no usage or metadata.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(text),
            usage: None,
            metadata: HashMap::new(),
        }
    }

    /// Assistant text.
    pub fn text(&self) -> &str {
        self.message.text()
    }
}

/// Core trait for chat-based language models.
///
/// Implementations must be `Send + Sync`; the dispatcher shares one model
/// across all in-flight requests behind an `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete reply for the given conversation.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Check whether the provider is reachable.
    async fn is_available(&self) -> Result<bool> {
        Ok(true)
    }

    /// Short provider label used in logs.
    fn name(&self) -> &str;
}

/// Send `history` to `model` and return the assistant text.
///
/// This is the `complete(history, jsonMode) -> text` collaborator contract.
pub async fn complete(
    model: &dyn ChatModel,
    history: Vec<Message>,
    json_mode: bool,
    temperature: Option<f32>,
) -> Result<String> {
    let mut request = ChatRequest::new(history).with_json_mode(json_mode);
    request.config.temperature = temperature;
    let response = model.chat(request).await?;
    Ok(response.message.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoModel {
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            self.seen.lock().unwrap().push(request);
            Ok(ChatResponse::from_text(format!("echo: {}", last)))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("a").role, MessageRole::System);
        assert_eq!(Message::user("b").role, MessageRole::User);
        assert_eq!(Message::assistant("c").text(), "c");
        assert_eq!(MessageRole::User.to_string(), "user");
    }

    #[test]
    fn test_json_mode_toggle() {
        let request = ChatRequest::new(vec![]).with_json_mode(true);
        assert_eq!(request.config.response_format, ResponseFormat::JsonObject);

        let request = request.with_json_mode(false);
        assert_eq!(request.config.response_format, ResponseFormat::Text);
    }

    #[test]
    fn test_usage_totals() {
        let usage = UsageMetadata::new(12, 30);
        assert_eq!(usage.total_tokens, 42);
    }

    #[tokio::test]
    async fn test_complete_passes_history_and_mode() {
        let model = EchoModel {
            seen: Mutex::new(Vec::new()),
        };
        let history = vec![Message::system("rules"), Message::user("hello")];

        let text = complete(&model, history, true, Some(0.3)).await.unwrap();
        assert_eq!(text, "echo: hello");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages.len(), 2);
        assert_eq!(seen[0].config.response_format, ResponseFormat::JsonObject);
        assert_eq!(seen[0].config.temperature, Some(0.3));
    }
}
