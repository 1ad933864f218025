//! Periodic feed polling with per-source watermarks.
//!
//! Each source has a watermark: the newest publish time already handed
//! downstream. A poll keeps only entries strictly newer than it, enriches
//! them, and moves the watermark to the newest one kept. A source that
//! fails to download or parse is skipped until the next cycle without
//! affecting the others.
//!
//! Entries published with a timestamp older than the watermark (back-dated
//! or late-indexed posts) are never delivered.

pub mod parser;

use crate::config::RssFeed;
use crate::enrich::fetcher::FETCH_TIMEOUT;
use crate::enrich::{Enricher, PageFetcher};
use crate::error::{Error, Result};
use crate::models::Article;
use crate::signal::Shutdown;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

pub use parser::{FeedEntry, parse_feed};

/// Downloads and parses one feed document.
pub trait FeedReader: Send + Sync {
    fn read_feed(&self, url: &str) -> impl Future<Output = Result<Vec<FeedEntry>>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpFeedReader {
    http: reqwest::Client,
}

impl HttpFeedReader {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self { http })
    }
}

impl FeedReader for HttpFeedReader {
    async fn read_feed(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await?;
        parse_feed(&body)
    }
}

pub struct FeedFetcher<R, F> {
    reader: R,
    enricher: Enricher<F>,
    feeds: Vec<RssFeed>,
    watermarks: HashMap<String, DateTime<Utc>>,
    poll_interval: Duration,
}

impl<R: FeedReader, F: PageFetcher> FeedFetcher<R, F> {
    /// Every source starts with `init_from` as its watermark.
    pub fn new(
        reader: R,
        enricher: Enricher<F>,
        feeds: Vec<RssFeed>,
        init_from: DateTime<Utc>,
        poll_interval: Duration,
    ) -> Self {
        let watermarks = feeds.iter().map(|f| (f.url.clone(), init_from)).collect();
        Self {
            reader,
            enricher,
            feeds,
            watermarks,
            poll_interval,
        }
    }

    pub fn watermark(&self, url: &str) -> Option<DateTime<Utc>> {
        self.watermarks.get(url).copied()
    }

    /// New, enriched articles of one source, in document order.
    #[instrument(level = "debug", skip_all, fields(name = %feed.name, url = %feed.url))]
    async fn poll_source(&self, feed: &RssFeed, since: DateTime<Utc>) -> Result<Vec<Article>> {
        debug!(%since, "Fetching feed");
        let entries = self.reader.read_feed(&feed.url).await?;
        debug!(count = entries.len(), "Fetched feed items");

        let mut articles = Vec::new();
        for entry in entries {
            let Some(published) = entry.published else {
                warn!(
                    title = %entry.title,
                    link = %entry.link,
                    "Published date is missing or unparseable"
                );
                continue;
            };
            if published <= since {
                continue;
            }
            let mut article = Article::new(
                entry.title,
                entry.description,
                entry.link,
                entry.content,
                published,
            );
            article.categories = entry.categories;
            articles.push(self.enricher.enrich(article).await);
        }
        Ok(articles)
    }

    /// Poll every source once and advance the watermarks.
    #[instrument(level = "info", skip_all)]
    pub async fn collect(&mut self) -> Vec<Article> {
        let mut collected = Vec::new();
        for feed in &self.feeds {
            let since = self.watermarks.get(&feed.url).copied().unwrap_or(DateTime::<Utc>::MIN_UTC);
            let articles = match self.poll_source(feed, since).await {
                Ok(a) => a,
                Err(e) => {
                    warn!(name = %feed.name, url = %feed.url, error = %e, "Failed to collect feed");
                    continue;
                }
            };

            match articles.iter().map(|a| a.published).max() {
                Some(newest) => {
                    self.watermarks.insert(feed.url.clone(), newest);
                    debug!(
                        name = %feed.name,
                        count = articles.len(),
                        watermark = %newest,
                        "Found new articles"
                    );
                }
                None => debug!(name = %feed.name, "No new articles"),
            }
            collected.extend(articles);
        }
        info!(count = collected.len(), "Collected articles");
        collected
    }

    /// Poll immediately and then every `poll_interval`, forwarding articles
    /// to `tx` until shutdown or until the receiver is dropped.
    pub async fn run(mut self, tx: mpsc::Sender<Article>, mut shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'poll: loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {}
            }

            let articles = tokio::select! {
                _ = shutdown.wait() => break,
                articles = self.collect() => articles,
            };

            for article in articles {
                let sent = tokio::select! {
                    _ = shutdown.wait() => break 'poll,
                    sent = tx.send(article) => sent,
                };
                if sent.is_err() {
                    info!("Article consumer is gone");
                    break 'poll;
                }
            }
            debug!(interval = ?self.poll_interval, "Sleeping until next poll");
        }
        info!("Feed polling stopped");
    }
}
