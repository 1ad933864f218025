//! Slack incoming-webhook delivery.

use crate::config::ENV_SLACK_WEBHOOK_URL;
use crate::error::{Error, Result};
use crate::models::Article;
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::time::Duration;
use tracing::{debug, instrument};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct Payload<'a> {
    blocks: [Block<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Block<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: Text<'a>,
}

#[derive(Debug, Serialize)]
struct Text<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

fn payload(text: &str) -> Payload<'_> {
    Payload {
        blocks: [Block {
            kind: "section",
            text: Text { kind: "mrkdwn", text },
        }],
    }
}

/// Render a matched article in Slack `mrkdwn`.
///
/// Markdown bullets and bold markers in the summary are converted to their
/// Slack equivalents.
pub fn render_mrkdwn(article: &Article, debug: bool) -> String {
    let summary = article.summary.replace("- ", "• ").replace("**", "*");
    let mut out = format!(
        "*{}*\n\n{}\n\nRead more <{}|here>",
        article.title, summary, article.link
    );

    if debug {
        out.push_str("\n---\n*Debug info:*\n");
        let _ = writeln!(out, "*len(Description):* {}", article.description.len());
        let _ = writeln!(out, "*len(Content):* {}", article.content.len());
        for cr in &article.category_relevance {
            let _ = write!(
                out,
                "*Category:* {}\n*Relevance:* {:.1}\n*Explanation*: {}\n\n",
                cr.category,
                cr.relevance,
                cr.explanation.as_deref().unwrap_or("")
            );
        }
        out.push_str("\n---\n");
    }
    out
}

pub struct SlackWebhook {
    http: reqwest::Client,
    endpoint: String,
}

impl fmt::Debug for SlackWebhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackWebhook")
            .field("endpoint", &"<redacted>")
            .finish()
    }
}

impl SlackWebhook {
    /// Build a sender from `SLACK_WEBHOOK_URL`.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var(ENV_SLACK_WEBHOOK_URL)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .ok_or(Error::MissingEnv(ENV_SLACK_WEBHOOK_URL))?;
        Self::new(endpoint)
    }

    pub fn new(endpoint: String) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self { http, endpoint })
    }

    #[instrument(level = "debug", skip_all)]
    pub async fn send(&self, text: &str) -> Result<()> {
        debug!("Sending webhook to Slack");
        let resp = self.http.post(&self.endpoint).json(&payload(text)).send().await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Status {
                url: "slack webhook".into(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
