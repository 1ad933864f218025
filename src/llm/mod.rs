//! Provider-agnostic access to chat completions and embeddings.
//!
//! Every caller talks to an [`LlmProvider`]. Two providers exist:
//!
//! | Provider | Module | Chat | Embeddings | Cost tracking |
//! |----------|--------|------|------------|---------------|
//! | OpenAI | [`openai`] | yes | yes | yes |
//! | Ollama | [`ollama`] | yes (JSON mode) | not implemented | no |
//!
//! [`LlmClient`] is the single place where the configured provider is
//! chosen. Decorators such as [`retry::Retry`] wrap any provider, and the
//! chunking logic in [`embeddings`] sits above the provider boundary so it
//! behaves the same for all of them.

pub mod embeddings;
pub mod ollama;
pub mod openai;
pub mod retry;
pub mod usage;

use crate::config::{LlmClientKind, LlmConfig};
use crate::error::Result;
use std::future::Future;
use tracing::{info, instrument};

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// One chat-completion request.
#[derive(Debug, Clone, Copy)]
pub struct ChatPrompt<'a> {
    pub model: &'a str,
    /// Omitted from the request when empty.
    pub system: &'a str,
    /// Omitted from the request when empty.
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider to constrain output to JSON, where supported.
    pub require_json: bool,
}

/// Capability set shared by every LLM backend.
///
/// The returned futures are `Send` so a provider can be driven from any
/// tokio task.
pub trait LlmProvider: Send + Sync {
    /// Run a chat completion and return the assistant message text.
    fn chat_completion(
        &self,
        prompt: ChatPrompt<'_>,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Embed each text. The result has exactly one vector per input, in
    /// input order.
    fn create_embeddings(
        &self,
        model: &str,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;

    /// Approximate spend in USD since the provider was created.
    fn total_cost(&self) -> f64 {
        0.0
    }
}

/// The configured provider.
#[derive(Debug)]
pub enum LlmClient {
    OpenAi(OpenAiClient),
    Ollama(OllamaClient),
}

impl LlmClient {
    /// Build the provider named by `llm.client`.
    ///
    /// For OpenAI this only checks that the API key is present. For Ollama
    /// every chat model from the config is loaded up front, and a model
    /// that fails to load aborts startup.
    #[instrument(level = "info", skip_all, fields(client = ?config.client))]
    pub async fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = match config.client {
            LlmClientKind::OpenAi => LlmClient::OpenAi(OpenAiClient::from_env()?),
            LlmClientKind::Ollama => {
                LlmClient::Ollama(OllamaClient::from_env(&config.chat_models()).await?)
            }
        };
        info!("LLM client ready");
        Ok(client)
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlmClient::OpenAi(_) => "OpenAI",
            LlmClient::Ollama(_) => "Ollama",
        }
    }
}

impl LlmProvider for LlmClient {
    async fn chat_completion(&self, prompt: ChatPrompt<'_>) -> Result<String> {
        match self {
            LlmClient::OpenAi(c) => c.chat_completion(prompt).await,
            LlmClient::Ollama(c) => c.chat_completion(prompt).await,
        }
    }

    async fn create_embeddings(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            LlmClient::OpenAi(c) => c.create_embeddings(model, texts).await,
            LlmClient::Ollama(c) => c.create_embeddings(model, texts).await,
        }
    }

    fn total_cost(&self) -> f64 {
        match self {
            LlmClient::OpenAi(c) => c.total_cost(),
            LlmClient::Ollama(c) => c.total_cost(),
        }
    }
}
