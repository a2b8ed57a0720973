//! Chat-completion module.
//!
//! This module provides:
//! * [`ChatBackend`]: async trait for one chat-completion call.
//! * [`OllamaClient`]: Ollama over HTTP (chat completions + model catalog).
//! * [`ChatMessage`] / [`Role`]: wire-format chat turns.
//! * [`compose_messages`], [`system_prompt`], [`with_system_message`]:
//!   multi-model context built from the history buffer.
//! * [`LlmError`]: error variants for chat operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use roverseer::config::AppConfig;
//! use roverseer::llm::{compose_messages, system_prompt, with_system_message, ChatBackend, OllamaClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client = OllamaClient::from_config(&config.llm);
//!
//!     let model = client.models_or_default().await.remove(0);
//!     let messages = with_system_message(
//!         compose_messages(&[], &model, "What is a rover?"),
//!         Some(&system_prompt(&model)),
//!     );
//!     let reply = client.complete(&model, &messages).await.unwrap();
//!     println!("{reply}");
//! }
//! ```

pub mod chat;
pub mod context;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use chat::{ChatBackend, ChatMessage, LlmError, OllamaClient, Role};
pub use context::{compose_messages, display_name, system_prompt, with_system_message};

#[cfg(test)]
pub use chat::MockChat;
