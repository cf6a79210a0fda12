//! Deepseek client (OpenAI-compatible chat completions).
//!
//! ```rust,ignore
//! use llm::remote::DeepseekClient;
//! use llm::config::RemoteLlmConfig;
//!
//! let config = RemoteLlmConfig::from_env(
//!     "DEEPSEEK_API_KEY",
//!     "https://api.deepseek.com",
//!     "deepseek-chat",
//! )?;
//! let client = DeepseekClient::new(config)?;
//! let reply = llm::complete(&client, history, true, Some(0.3)).await?;
//! ```

use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use crate::model::{ChatModel, ChatRequest, ChatResponse, Message, ResponseFormat, UsageMetadata};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deepseek API client.
#[derive(Clone)]
pub struct DeepseekClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl DeepseekClient {
    /// Create a new client; fails only if the HTTP client cannot be built.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Model this client talks to.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request(&self, request: &ChatRequest) -> DeepseekRequest {
        DeepseekRequest {
            model: self.config.model.clone(),
            messages: request.messages.iter().map(DeepseekMessage::from).collect(),
            temperature: request.config.temperature,
            max_tokens: request.config.max_tokens,
            response_format: match request.config.response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(DeepseekResponseFormat {
                    kind: "json_object".to_string(),
                }),
            },
            stream: false,
        }
    }

    fn convert_response(&self, deepseek_resp: DeepseekResponse) -> Result<ChatResponse> {
        let choice = deepseek_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("Deepseek returned no choices".to_string()))?;

        let usage = deepseek_resp
            .usage
            .map(|u| UsageMetadata::new(u.prompt_tokens, u.completion_tokens));

        let mut metadata = HashMap::new();
        metadata.insert(
            "model".to_string(),
            serde_json::Value::String(deepseek_resp.model),
        );
        if let Some(reason) = choice.finish_reason {
            metadata.insert("finish_reason".to_string(), serde_json::Value::String(reason));
        }

        Ok(ChatResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage,
            metadata,
        })
    }
}

#[async_trait]
impl ChatModel for DeepseekClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let req_body = self.build_request(&request);

        tracing::debug!(
            model = %self.config.model,
            messages = req_body.messages.len(),
            json_mode = req_body.response_format.is_some(),
            "Sending Deepseek chat completion"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&req_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("Deepseek", status, error_text));
        }

        let deepseek_resp: DeepseekResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        self.convert_response(deepseek_resp)
    }

    fn name(&self) -> &str {
        "deepseek"
    }
}

#[derive(Debug, Serialize)]
struct DeepseekRequest {
    model: String,
    messages: Vec<DeepseekMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<DeepseekResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct DeepseekResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct DeepseekMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for DeepseekMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeepseekResponse {
    model: String,
    choices: Vec<DeepseekChoice>,
    usage: Option<DeepseekUsage>,
}

#[derive(Debug, Deserialize)]
struct DeepseekChoice {
    message: DeepseekReplyMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeepseekReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeepseekUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}
