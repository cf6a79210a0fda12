//! Chat-model collaborator for the intent dispatch layer.
//!
//! The dispatcher only ever needs one thing from a language model: send an
//! ordered conversation, get text back. This crate defines that boundary
//! ([`ChatModel`], [`complete`]) and ships two providers.
//!
//! # Local Providers
//!
//! - **Ollama** - `POST /api/chat`, JSON mode via `format: "json"`
//!
//! # Remote Providers
//!
//! - **Deepseek** - `POST /chat/completions`, JSON mode via
//!   `response_format: {"type": "json_object"}`
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::{complete, Message};
//! use llm::remote::DeepseekClient;
//! use llm::config::RemoteLlmConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RemoteLlmConfig::from_env(
//!         "DEEPSEEK_API_KEY",
//!         "https://api.deepseek.com",
//!         "deepseek-chat",
//!     )?;
//!     let client = DeepseekClient::new(config)?;
//!
//!     let history = vec![
//!         Message::system("Reply with a JSON function_call only"),
//!         Message::user("查订单 123 状态"),
//!     ];
//!     let reply = complete(&client, history, false, Some(0.3)).await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod model;

#[cfg(feature = "local")]
pub mod local;

#[cfg(feature = "remote")]
pub mod remote;

pub use config::{LocalLlmConfig, RemoteLlmConfig};
pub use error::{LlmError, Result};
pub use model::{
    complete, ChatConfig, ChatModel, ChatRequest, ChatResponse, Message, MessageRole,
    ResponseFormat, UsageMetadata,
};
