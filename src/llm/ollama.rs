//! Client for a local Ollama server.
//!
//! Only chat completions are supported. Models are loaded into memory when
//! the client is built so the first article does not pay the load time.

use super::openai::LLM_TIMEOUT;
use super::{ChatPrompt, LlmProvider};
use crate::config::ENV_OLLAMA_BASE_URL;
use crate::error::{Error, Result};
use crate::utils::truncate_for_log;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, instrument};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const CHAT_PATH: &str = "/api/chat";
const KEEP_ALIVE: &str = "5m";
const PROVIDER: &str = "Ollama";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Options>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    keep_alive: &'static str,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl<'a> ChatRequest<'a> {
    /// A request without messages, which only loads the model.
    fn load(model: &'a str) -> Self {
        Self {
            model,
            messages: Vec::new(),
            options: None,
            stream: false,
            format: None,
            keep_alive: KEEP_ALIVE,
        }
    }

    fn from_prompt(prompt: &ChatPrompt<'a>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(Message { role: "system", content: prompt.system });
        }
        if !prompt.user.is_empty() {
            messages.push(Message { role: "user", content: prompt.user });
        }
        Self {
            model: prompt.model,
            messages,
            options: Some(Options {
                temperature: prompt.temperature,
                num_predict: prompt.max_tokens,
            }),
            stream: false,
            // Plain JSON enforcement; schema-constrained output is unreliable
            // with local models.
            format: prompt.require_json.then_some("json"),
            keep_alive: KEEP_ALIVE,
        }
    }
}

fn check_loaded(model: &str, resp: &ChatResponse) -> Result<()> {
    match resp.done_reason.as_deref() {
        Some("load") => Ok(()),
        other => Err(Error::ModelLoad {
            model: model.to_string(),
            reason: format!("unexpected done reason {:?}", other.unwrap_or("")),
        }),
    }
}

#[derive(Debug)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    /// Connect to `OLLAMA_BASE_URL` (or the local default) and load
    /// every model in `models`.
    pub async fn from_env(models: &[String]) -> Result<Self> {
        let base_url = std::env::var(ENV_OLLAMA_BASE_URL)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = Self::new(&base_url)?;
        for model in models {
            client.load_model(model).await?;
        }
        Ok(client)
    }

    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(LLM_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, req: &ChatRequest<'_>) -> Result<ChatResponse> {
        let resp = self
            .http
            .post(format!("{}{CHAT_PATH}", self.base_url))
            .json(req)
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

    #[instrument(level = "info", skip(self))]
    async fn load_model(&self, model: &str) -> Result<()> {
        let t0 = Instant::now();
        let resp = self.send(&ChatRequest::load(model)).await.map_err(|e| Error::ModelLoad {
            model: model.to_string(),
            reason: e.to_string(),
        })?;
        check_loaded(model, &resp)?;
        info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Model loaded");
        Ok(())
    }
}

impl LlmProvider for OllamaClient {
    #[instrument(level = "debug", skip_all, fields(model = prompt.model))]
    async fn chat_completion(&self, prompt: ChatPrompt<'_>) -> Result<String> {
        let t0 = Instant::now();
        let resp = self.send(&ChatRequest::from_prompt(&prompt)).await?;
        debug!(
            model = %resp.model,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Ollama chat completion"
        );
        resp.message
            .map(|m| m.content)
            .ok_or_else(|| Error::Provider("Ollama response has no message".into()))
    }

    async fn create_embeddings(&self, _model: &str, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::NotImplemented {
            provider: PROVIDER,
            operation: "create_embeddings",
        })
    }
}
