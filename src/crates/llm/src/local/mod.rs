//! Providers running on localhost or the local network.
//!
//! - **Ollama** - local runner, commonly hosting `deepseek-r1` thinking models

pub mod ollama;

pub use ollama::OllamaClient;
