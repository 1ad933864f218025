//! # secfeed
//!
//! Polls security news feeds, scores every new article against a list of
//! user-defined categories with an LLM (or with embeddings), and reports
//! the relevant ones with a short summary to stdout and/or Slack.
//!
//! ## Architecture
//!
//! 1. **Polling** ([`feed`]): every source is fetched on an interval; only
//!    entries newer than the source's watermark go further
//! 2. **Enrichment** ([`enrich`]): thin entries are upgraded with the
//!    readable text of the article page
//! 3. **Classification** ([`classification`]): relevance 0–10 per category,
//!    filtered by the configured threshold
//! 4. **Summary and reporting** ([`summary`], [`outputs`]): matched
//!    articles only
//!
//! Polling runs in its own task and hands articles to the consumer
//! ([`pipeline`]) over a bounded channel.

pub mod classification;
pub mod cli;
pub mod config;
pub mod enrich;
pub mod error;
pub mod feed;
pub mod llm;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod signal;
pub mod summary;
pub mod utils;

pub use error::{Error, Result};
