//! Reporting of matched articles.
//!
//! # Submodules
//!
//! - [`markdown`]: Markdown rendering printed to stdout
//! - [`slack`]: Slack `mrkdwn` rendering and webhook delivery
//!
//! Which sinks are active comes from the `reporting` section of the
//! config. A failing sink is logged and never stops the pipeline.

pub mod markdown;
pub mod slack;

use crate::config::Reporting;
use crate::error::Result;
use crate::models::Article;
use tracing::{error, info};

pub use slack::SlackWebhook;

#[derive(Debug)]
pub struct Reporter {
    stdout: bool,
    debug: bool,
    slack: Option<SlackWebhook>,
}

impl Reporter {
    /// Slack reporting requires `SLACK_WEBHOOK_URL`.
    pub fn from_config(reporting: &Reporting) -> Result<Self> {
        let slack = if reporting.slack {
            Some(SlackWebhook::from_env()?)
        } else {
            None
        };
        if !reporting.stdout && slack.is_none() {
            info!("No reporting sink is enabled; matches will only be logged");
        }
        Ok(Self {
            stdout: reporting.stdout,
            debug: reporting.debug,
            slack,
        })
    }

    pub async fn report(&self, article: &Article) {
        if self.stdout {
            println!("{}\n", markdown::render(article, self.debug));
        }
        if let Some(slack) = &self.slack {
            let text = slack::render_mrkdwn(article, self.debug);
            if let Err(e) = slack.send(&text).await {
                error!(
                    title = %article.title,
                    link = %article.link,
                    error = %e,
                    "Failed to send Slack webhook"
                );
            }
        }
    }
}
