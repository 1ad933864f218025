//! OpenAI REST client for chat completions and embeddings.

use super::usage::{TokenUsage, UsageTracker};
use super::{ChatPrompt, LlmProvider};
use crate::config::ENV_OPENAI_API_KEY;
use crate::error::{Error, Result};
use crate::utils::truncate_for_log;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const CHAT_PATH: &str = "/v1/chat/completions";
const EMBEDDINGS_PATH: &str = "/v1/embeddings";
const PROVIDER: &str = "OpenAI";

/// Inference can take far longer than a feed fetch.
pub(crate) const LLM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

fn build_messages<'a>(prompt: &ChatPrompt<'a>) -> Vec<Message<'a>> {
    let mut messages = Vec::with_capacity(2);
    if !prompt.system.is_empty() {
        messages.push(Message { role: "system", content: prompt.system });
    }
    if !prompt.user.is_empty() {
        messages.push(Message { role: "user", content: prompt.user });
    }
    messages
}

/// Vectors in input order, checked against the number of inputs.
fn ordered_embeddings(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(Error::Embedding(format!(
            "number of embeddings returned ({}) does not match number of texts ({expected})",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    usage: UsageTracker,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiClient {
    /// Build a client from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(ENV_OPENAI_API_KEY)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::MissingEnv(ENV_OPENAI_API_KEY))?;
        Self::new(api_key, DEFAULT_BASE_URL)
    }

    pub fn new(api_key: String, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(LLM_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            usage: UsageTracker::new(),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl LlmProvider for OpenAiClient {
    // JSON mode is left off: `json_object` forces a top-level object while
    // the classification prompt asks for an array.
    #[instrument(level = "debug", skip_all, fields(model = prompt.model))]
    async fn chat_completion(&self, prompt: ChatPrompt<'_>) -> Result<String> {
        let t0 = Instant::now();
        let req = ChatRequest {
            model: prompt.model,
            messages: build_messages(&prompt),
            temperature: prompt.temperature,
            max_completion_tokens: prompt.max_tokens,
        };
        let resp: ChatResponse = self.post(CHAT_PATH, &req).await?;

        self.usage.record(
            prompt.model,
            TokenUsage {
                prompt: resp.usage.prompt_tokens,
                completion: resp.usage.completion_tokens,
            },
        );
        debug!(
            model = %resp.model,
            tokens = resp.usage.total_tokens,
            total_cost = self.usage.total_cost(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "OpenAI chat completion"
        );

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Provider("OpenAI returned no choices".into()))
    }

    #[instrument(level = "debug", skip_all, fields(model = %model, inputs = texts.len()))]
    async fn create_embeddings(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let req = EmbeddingRequest { model, input: texts };
        let resp: EmbeddingResponse = self.post(EMBEDDINGS_PATH, &req).await?;

        self.usage.record(
            model,
            TokenUsage {
                prompt: resp.usage.prompt_tokens,
                completion: resp.usage.completion_tokens,
            },
        );
        debug!(
            tokens = resp.usage.total_tokens,
            total_cost = self.usage.total_cost(),
            "OpenAI embeddings"
        );

        ordered_embeddings(resp.data, texts.len())
    }

    fn total_cost(&self) -> f64 {
        self.usage.total_cost()
    }
}
