//! Hosted, API-key authenticated providers.
//!
//! - **Deepseek** - OpenAI-compatible chat completions with JSON output mode

pub mod deepseek;

pub use deepseek::DeepseekClient;
