//! Text-completion provider abstraction for instrument-watch
//!
//! This crate keeps the narrative generator independent of any particular
//! model vendor. It includes:
//!
//! - Message types for a chat-style conversation
//! - Completion request/response types with a builder
//! - The [`LLMProvider`] trait
//! - An OpenAI-compatible provider (also usable with local servers and
//!   vendors exposing the same chat-completions API)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
