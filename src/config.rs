//! YAML configuration.
//!
//! The file is read once at startup and never reloaded. Optional keys fall
//! back to the defaults documented on each field.
//!
//! ```yaml
//! init_pull: 1
//! categories:
//!   - name: Ransomware
//!     description: Ransomware attacks, groups and negotiations
//! llm:
//!   client: openai
//!   classification:
//!     engine: llm
//!     model: gpt-4o-mini
//!     threshold: 8
//!   summary:
//!     model: gpt-4o
//! rss_feed:
//!   - name: The Hacker News
//!     url: https://feeds.feedburner.com/TheHackersNews
//! reporting:
//!   slack: false
//!   stdout: true
//! ```

use crate::error::{Error, Result};
use itertools::Itertools;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, instrument};

/// Environment variable holding the OpenAI API key.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable holding the Slack incoming-webhook URL.
pub const ENV_SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
/// Environment variable holding the base URL served by Ollama.
pub const ENV_OLLAMA_BASE_URL: &str = "OLLAMA_BASE_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Days of history to accept on the first poll of every feed.
    pub init_pull: u32,
    /// Minutes between two polls of the feed list.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u64,
    /// How many enriched articles may wait for the consumer before polling blocks.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    pub categories: Vec<Category>,
    pub llm: LlmConfig,
    pub rss_feed: Vec<RssFeed>,
    #[serde(default)]
    pub reporting: Reporting,
    #[serde(default)]
    pub enrichment: Enrichment,
}

/// A topic the user wants to hear about.
///
/// `description` is used verbatim in the classification prompt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RssFeed {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmClientKind {
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationEngineKind {
    Llm,
    Embeddings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub client: LlmClientKind,
    /// Extra attempts for transient provider failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    pub classification: ClassificationConfig,
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationConfig {
    pub engine: ClassificationEngineKind,
    pub model: String,
    pub threshold: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    pub model: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reporting {
    #[serde(default)]
    pub slack: bool,
    #[serde(default)]
    pub stdout: bool,
    /// Append lengths and per-category explanations to every report.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Enrichment {
    /// Fetch the article page even when the feed content looks usable.
    #[serde(default)]
    pub always_fetch: bool,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_channel_capacity() -> usize {
    8
}

fn default_max_retries() -> usize {
    2
}

impl LlmConfig {
    /// Models that must be resident before the pipeline starts.
    ///
    /// The classification model is only needed by the LLM engine; the
    /// embeddings engine talks to the embeddings endpoint instead.
    pub fn chat_models(&self) -> Vec<String> {
        let mut models = Vec::new();
        if self.classification.engine == ClassificationEngineKind::Llm {
            models.push(self.classification.model.clone());
        }
        if !models.contains(&self.summary.model) {
            models.push(self.summary.model.clone());
        }
        models
    }
}

impl Config {
    /// Read and validate the configuration file at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml(&data)?;
        info!(
            feeds = config.rss_feed.len(),
            categories = config.categories.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate a configuration document.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(Error::Config("at least one category is required".into()));
        }
        if let Some(c) = self.categories.iter().find(|c| c.name.trim().is_empty()) {
            return Err(Error::Config(format!(
                "category with description {:?} has no name",
                c.description
            )));
        }
        if let Some(name) = self.categories.iter().map(|c| c.name.trim()).duplicates().next() {
            return Err(Error::Config(format!("category {name:?} is defined more than once")));
        }
        if self.rss_feed.is_empty() {
            return Err(Error::Config("at least one rss_feed is required".into()));
        }
        if !self.llm.classification.threshold.is_finite() {
            return Err(Error::Config("classification threshold must be a number".into()));
        }
        if self.llm.classification.model.trim().is_empty()
            || self.llm.summary.model.trim().is_empty()
        {
            return Err(Error::Config("model names must not be empty".into()));
        }
        if self.poll_interval_minutes == 0 {
            return Err(Error::Config("poll_interval_minutes must be positive".into()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be positive".into()));
        }
        Ok(())
    }
}
