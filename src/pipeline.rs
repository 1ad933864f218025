//! The consumer side: classify, summarize and report each article.
//!
//! Articles are handled one at a time. A failure or a panic while handling
//! one article is logged and the loop moves on to the next. Shutdown
//! abandons the article in flight instead of waiting for its LLM calls.

use crate::classification::ClassificationEngine;
use crate::error::Result;
use crate::llm::LlmProvider;
use crate::models::Article;
use crate::outputs::Reporter;
use crate::signal::Shutdown;
use crate::summary::Summarizer;
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tracing::{error, info, instrument};

/// Counters for one run of the consumer loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: usize,
    pub matched: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct Pipeline<P> {
    provider: P,
    engine: ClassificationEngine,
    summarizer: Summarizer,
    reporter: Reporter,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl<P: LlmProvider> Pipeline<P> {
    pub fn new(
        provider: P,
        engine: ClassificationEngine,
        summarizer: Summarizer,
        reporter: Reporter,
    ) -> Self {
        Self {
            provider,
            engine,
            summarizer,
            reporter,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Handle one article. Returns the reported article, or `None` when no
    /// category matched.
    #[instrument(level = "info", skip_all, fields(title = %article.title, link = %article.link))]
    pub async fn process(&self, mut article: Article) -> Result<Option<Article>> {
        info!("Received article. Analyzing...");
        let matches = self.engine.classify(&self.provider, &article).await?;
        for m in &matches {
            info!(
                category = %m.category,
                relevance = format_args!("{:.1}", m.relevance),
                explanation = m.explanation.as_deref().unwrap_or(""),
                "Category matched"
            );
        }
        if matches.is_empty() {
            return Ok(None);
        }
        article.category_relevance = matches;

        article.summary = self.summarizer.summarize(&self.provider, &article).await?;
        self.reporter.report(&article).await;
        Ok(Some(article))
    }

    /// Consume articles until shutdown or until the producer is gone.
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<Article>,
        mut shutdown: Shutdown,
    ) -> PipelineStats {
        let mut stats = PipelineStats::default();
        loop {
            let article = tokio::select! {
                _ = shutdown.wait() => break,
                next = rx.recv() => match next {
                    Some(a) => a,
                    None => break,
                },
            };
            stats.received += 1;
            let (title, link) = (article.title.clone(), article.link.clone());

            let outcome = tokio::select! {
                _ = shutdown.wait() => {
                    info!(%title, %link, "Shutdown requested; abandoning article in flight");
                    break;
                }
                outcome = AssertUnwindSafe(self.process(article)).catch_unwind() => outcome,
            };
            match outcome {
                Ok(Ok(Some(_))) => stats.matched += 1,
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    stats.failed += 1;
                    error!(%title, %link, error = %e, "Failed to process article");
                }
                Err(panic) => {
                    stats.failed += 1;
                    error!(
                        %title,
                        %link,
                        panic = panic_message(panic.as_ref()),
                        backtrace = %Backtrace::force_capture(),
                        "Panic while processing article"
                    );
                }
            }
        }
        info!(
            received = stats.received,
            matched = stats.matched,
            failed = stats.failed,
            "Article consumer stopped"
        );
        stats
    }
}
