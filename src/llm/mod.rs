//! LLM integration
//!
//! A completion is a plain request/response call against an
//! OpenAI-compatible local endpoint. The client trait is the seam: the
//! worker drives whatever implementation it is given, and tests substitute
//! scripted clients.

mod client;
mod prompt;
mod worker;

pub use client::{ChatMessage, CompletionOptions, HttpLlmClient, LlmClient};
pub use prompt::build_messages;
pub use worker::{CompletionRequest, LlmWorker};
