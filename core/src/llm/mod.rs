//! LLM module: provider clients and the primary/fallback chain
//!
//! This module provides:
//! - `CompletionProvider`, the seam every provider client implements
//! - `OpenRouterClient`, the primary OpenAI-compatible chat-completion client
//! - `GeminiClient`, the fallback generative-content client
//! - `ProviderChain`, which tries the primary and falls back on any failure

mod chain;
mod gemini;
mod openrouter;
mod provider;

pub use chain::ProviderChain;
pub use gemini::{GeminiClient, GeminiConfig};
pub use openrouter::{OpenRouterClient, OpenRouterConfig};
pub use provider::{CompletionProvider, ProviderError, ProviderReply};
